pub mod assistant;
pub mod health;
pub mod owner;
pub mod public;
