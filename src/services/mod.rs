pub mod cascade;
pub mod chat;
pub mod reconciliation;

pub use cascade::CascadeDeleteService;
pub use chat::ChatRoomService;
pub use reconciliation::ReconciliationService;
