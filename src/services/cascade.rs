use crate::database::repositories::{
    AvailabilityRepository, ChatRoomRepository, ExperienceRepository, MessageRepository,
    NotificationRepository, UserRepository,
};
use crate::error::AppError;
use crate::services::ReconciliationService;

/// The ordered plan for erasing a user's footprint. Each step is
/// best-effort: a failure is logged and the remaining steps still run, so
/// that a partial failure leaves as little orphaned data as possible.
/// Only the final user-row delete propagates its error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CascadeStep {
    Availabilities,
    Notifications,
    ScheduleAssignments,
    ChatFootprint,
    AuthoredContent,
}

const CASCADE_PLAN: [CascadeStep; 5] = [
    CascadeStep::Availabilities,
    CascadeStep::Notifications,
    CascadeStep::ScheduleAssignments,
    CascadeStep::ChatFootprint,
    CascadeStep::AuthoredContent,
];

#[derive(Clone)]
pub struct CascadeDeleteService {
    user_repository: UserRepository,
    availability_repository: AvailabilityRepository,
    notification_repository: NotificationRepository,
    chat_repository: ChatRoomRepository,
    message_repository: MessageRepository,
    experience_repository: ExperienceRepository,
    reconciliation: ReconciliationService,
}

impl CascadeDeleteService {
    pub fn new(
        user_repository: UserRepository,
        availability_repository: AvailabilityRepository,
        notification_repository: NotificationRepository,
        chat_repository: ChatRoomRepository,
        message_repository: MessageRepository,
        experience_repository: ExperienceRepository,
        reconciliation: ReconciliationService,
    ) -> Self {
        Self {
            user_repository,
            availability_repository,
            notification_repository,
            chat_repository,
            message_repository,
            experience_repository,
            reconciliation,
        }
    }

    /// Delete a user account and everything hanging off it. The schedule
    /// step goes through the reconciliation engine so that affected
    /// aggregates are recomputed (or deleted when emptied) under the same
    /// slot locks as any concurrent confirmation.
    pub async fn delete_user(&self, target_id: &str, acting_admin_id: &str) -> Result<(), AppError> {
        if target_id == acting_admin_id {
            return Err(AppError::BadRequest(
                "Administrators cannot delete their own account".to_string(),
            ));
        }

        let user = self
            .user_repository
            .find_by_id(target_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        log::info!(
            "cascade delete of user {} ({}) requested by admin {}",
            user.id,
            user.email,
            acting_admin_id
        );

        for step in CASCADE_PLAN {
            if let Err(e) = self.run_step(step, target_id).await {
                log::error!(
                    "cascade step {:?} failed for user {}: {}",
                    step,
                    target_id,
                    e
                );
            }
        }

        self.user_repository.delete_user(target_id).await?;
        Ok(())
    }

    async fn run_step(&self, step: CascadeStep, user_id: &str) -> Result<(), AppError> {
        match step {
            CascadeStep::Availabilities => {
                self.availability_repository.delete_for_user(user_id).await?;
            }
            CascadeStep::Notifications => {
                self.notification_repository.delete_for_user(user_id).await?;
            }
            CascadeStep::ScheduleAssignments => {
                self.unwind_schedules(user_id).await?;
            }
            CascadeStep::ChatFootprint => {
                self.chat_repository.remove_user_footprint(user_id).await?;
            }
            CascadeStep::AuthoredContent => {
                self.message_repository.delete_for_user(user_id).await?;
                self.experience_repository.delete_for_user(user_id).await?;
            }
        }
        Ok(())
    }

    /// Pull the user off every schedule they are assigned to, one slot at a
    /// time, letting the engine recompute each aggregate's staffing state.
    async fn unwind_schedules(&self, user_id: &str) -> Result<(), AppError> {
        let schedules = self
            .reconciliation
            .schedule_repository()
            .schedules_for_user(user_id)
            .await?;

        for schedule in schedules {
            if let Err(e) = self
                .reconciliation
                .remove_user_from_schedule(&schedule, user_id)
                .await
            {
                log::error!(
                    "failed to unwind schedule {} for user {}: {}",
                    schedule.id,
                    user_id,
                    e
                );
            }
        }

        Ok(())
    }
}
