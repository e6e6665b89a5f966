pub mod assistant;
pub mod booking;
pub mod business;
pub mod owner;
pub mod service;

pub use assistant::{AssistantReply, ChatMessage, Proposal, ProposalStatus, ToolCall};
pub use booking::{Booking, BookingStatus};
pub use business::{Business, DayHours, WeekSchedule};
pub use owner::Owner;
pub use service::Service;
