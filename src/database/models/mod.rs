pub mod availability;
pub mod chat;
pub mod experience;
pub(crate) mod macros;
pub mod message;
pub mod notification;
pub mod schedule;
pub mod user;

// Re-export all models for easy importing
pub use availability::*;
pub use chat::*;
pub use experience::*;
pub use message::*;
pub use notification::*;
pub use schedule::*;
pub use user::*;
