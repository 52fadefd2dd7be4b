use std::collections::HashMap;

use crate::database::models::{
    ChatMessageView, ChatRoomView, Notification, NotificationKind, Schedule,
};
use crate::database::repositories::{
    ChatRoomRepository, NotificationRepository, ScheduleRepository,
};
use crate::error::AppError;
use crate::realtime::{RealtimeHub, ServerEvent};

/// Derives chat rooms from schedule membership and keeps per-user read
/// cursors.
///
/// A room's participant set is a snapshot of the schedule's assignees taken
/// when the room is first materialized. Volunteers added to the roster
/// later are not retroactively made participants of an existing room; this
/// mirrors the product decision documented in DESIGN.md.
#[derive(Clone)]
pub struct ChatRoomService {
    chat_repository: ChatRoomRepository,
    schedule_repository: ScheduleRepository,
    notification_repository: NotificationRepository,
    hub: RealtimeHub,
}

impl ChatRoomService {
    pub fn new(
        chat_repository: ChatRoomRepository,
        schedule_repository: ScheduleRepository,
        notification_repository: NotificationRepository,
        hub: RealtimeHub,
    ) -> Self {
        Self {
            chat_repository,
            schedule_repository,
            notification_repository,
            hub,
        }
    }

    /// Load the schedule and check chat access for a requester. Admins may
    /// read; everyone else must be on the roster.
    async fn authorize(
        &self,
        schedule_id: &str,
        requester_id: &str,
        requester_is_admin: bool,
    ) -> Result<Schedule, AppError> {
        let schedule = self
            .schedule_repository
            .find_by_id(schedule_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Schedule not found".to_string()))?;

        if requester_is_admin {
            return Ok(schedule);
        }

        let assignees = self.schedule_repository.assignees(schedule_id).await?;
        if !assignees.iter().any(|a| a.user_id == requester_id) {
            return Err(AppError::Forbidden(
                "You are not assigned to this shift".to_string(),
            ));
        }

        Ok(schedule)
    }

    /// Find the room for a schedule, materializing it on first access with
    /// the current assignees as the participant snapshot.
    pub async fn get_or_create(
        &self,
        schedule_id: &str,
        requester_id: &str,
        requester_is_admin: bool,
    ) -> Result<ChatRoomView, AppError> {
        self.authorize(schedule_id, requester_id, requester_is_admin)
            .await?;

        let assignees = self.schedule_repository.assignees(schedule_id).await?;
        let participant_ids: Vec<String> =
            assignees.iter().map(|a| a.user_id.clone()).collect();

        let room = self
            .chat_repository
            .find_or_create(schedule_id, &participant_ids)
            .await?;

        let participants = self.chat_repository.participants(&room.id).await?;
        let messages = self.chat_repository.messages(&room.id).await?;

        Ok(ChatRoomView {
            id: room.id,
            schedule_id: room.schedule_id,
            participants,
            messages,
        })
    }

    /// Append a message, creating the room on first write. Authorship
    /// requires roster membership; the admin read exemption does not apply.
    ///
    /// Every other participant gets a durable chat notification; a live
    /// real-time nudge is delivered on top when they have a session.
    pub async fn post_message(
        &self,
        schedule_id: &str,
        author_id: &str,
        text: &str,
    ) -> Result<ChatMessageView, AppError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::BadRequest("Message cannot be empty".to_string()));
        }

        let schedule = self.authorize(schedule_id, author_id, false).await?;

        let assignees = self.schedule_repository.assignees(schedule_id).await?;
        let participant_ids: Vec<String> =
            assignees.iter().map(|a| a.user_id.clone()).collect();
        let room = self
            .chat_repository
            .find_or_create(schedule_id, &participant_ids)
            .await?;

        let message = self
            .chat_repository
            .append_message(&room.id, author_id, text)
            .await?;
        let view = self
            .chat_repository
            .message_view(message.id)
            .await?
            .ok_or_else(|| {
                AppError::internal_server_error_message("appended message not found")
            })?;

        self.fan_out_message(&schedule, &room.id, author_id).await;

        Ok(view)
    }

    async fn fan_out_message(&self, schedule: &Schedule, room_id: &str, author_id: &str) {
        let participants = match self.chat_repository.participants(room_id).await {
            Ok(participants) => participants,
            Err(e) => {
                log::warn!("failed to load participants of room {}: {}", room_id, e);
                return;
            }
        };

        let text = format!(
            "New message in the chat for the {} shift at {}",
            schedule.date, schedule.location
        );

        for participant_id in participants {
            if participant_id == author_id {
                continue;
            }

            let notification = Notification::for_schedule(
                &participant_id,
                text.clone(),
                NotificationKind::Chat,
                &schedule.id,
            );
            match self.notification_repository.create(&notification).await {
                Ok(created) => {
                    self.hub
                        .send_to_user(&participant_id, &ServerEvent::Notification(created));
                }
                Err(e) => log::warn!("failed to persist chat notification: {}", e),
            }

            self.hub.send_to_user(
                &participant_id,
                &ServerEvent::ScheduleMessageNotification {
                    schedule_id: schedule.id.clone(),
                    sender_id: author_id.to_string(),
                },
            );
        }
    }

    /// Unread counts over every schedule the user is currently assigned to.
    /// Schedules whose room was never materialized simply have no unread
    /// messages.
    pub async fn unread_counts(&self, user_id: &str) -> Result<HashMap<String, i64>, AppError> {
        let schedules = self.schedule_repository.schedules_for_user(user_id).await?;

        let mut counts = HashMap::new();
        for schedule in schedules {
            let Some(room) = self.chat_repository.find_by_schedule(&schedule.id).await? else {
                continue;
            };
            let unread = self.chat_repository.unread_count(&room.id, user_id).await?;
            counts.insert(schedule.id, unread);
        }

        Ok(counts)
    }

    /// Advance the user's read cursor to the room's last message. Cursors
    /// only exist for roster members, so the admin read exemption does not
    /// apply here either. A room with no messages leaves the cursor
    /// untouched.
    pub async fn mark_read(&self, schedule_id: &str, user_id: &str) -> Result<(), AppError> {
        self.authorize(schedule_id, user_id, false).await?;

        let room = self
            .chat_repository
            .find_by_schedule(schedule_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Chat room not found".to_string()))?;

        if let Some(last_id) = self.chat_repository.last_message_id(&room.id).await? {
            self.chat_repository
                .set_read_cursor(&room.id, user_id, last_id)
                .await?;
        }

        Ok(())
    }
}
