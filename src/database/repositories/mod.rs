pub mod availability;
pub mod chat_room;
pub mod experience;
pub mod message;
pub mod notification;
pub mod schedule;
pub mod user;

// Re-export all repositories for easy importing
pub use availability::AvailabilityRepository;
pub use chat_room::ChatRoomRepository;
pub use experience::ExperienceRepository;
pub use message::MessageRepository;
pub use notification::NotificationRepository;
pub use schedule::ScheduleRepository;
pub use user::UserRepository;
