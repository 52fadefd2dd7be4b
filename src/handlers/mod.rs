pub mod admin;
pub mod auth;
pub mod availability;
pub mod chat;
pub mod experiences;
pub mod notifications;
pub mod schedule;
pub mod shared;
