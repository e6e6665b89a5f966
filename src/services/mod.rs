pub mod assistant;
pub mod availability;
pub mod booking;
pub mod catalog;
pub mod ownership;
pub mod slots;
