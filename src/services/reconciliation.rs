use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;

use crate::database::models::{
    Assignee, Availability, CreateScheduleRequest, Gender, Notification, NotificationKind,
    Schedule, ScheduleWithAssignees, User,
};
use crate::database::repositories::{NotificationRepository, ScheduleRepository, UserRepository};
use crate::domain::{catalog, CalendarDay, ShiftTemplate};
use crate::error::AppError;
use crate::realtime::{RealtimeHub, ServerEvent};

/// Whether an assignee set satisfies the staffing composition rule:
/// at least one brother, and one or two sisters.
pub fn staffing_rule_met(males: usize, females: usize) -> bool {
    males >= 1 && (1..=2).contains(&females)
}

fn roster_counts(genders: impl Iterator<Item = Gender>) -> (usize, usize) {
    let mut males = 0;
    let mut females = 0;
    for gender in genders {
        match gender {
            Gender::Male => males += 1,
            Gender::Female => females += 1,
        }
    }
    (males, females)
}

/// Identity of one schedule slot: the normalized calendar day plus the full
/// shift-template tuple. All aggregate mutations for the same key are
/// serialized; different keys reconcile independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SlotKey {
    date: CalendarDay,
    template: ShiftTemplate,
}

impl SlotKey {
    fn of(template: &ShiftTemplate, date: CalendarDay) -> Self {
        SlotKey {
            date,
            template: template.clone(),
        }
    }
}

#[derive(Clone, Default)]
struct SlotLocks {
    inner: Arc<StdMutex<HashMap<SlotKey, Arc<Mutex<()>>>>>,
}

impl SlotLocks {
    fn lock_for(&self, key: &SlotKey) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().unwrap();
        // A strong count of 1 means the map holds the only reference, so
        // nobody is waiting on that slot; drop it instead of accumulating
        // one entry per slot ever touched.
        map.retain(|_, lock| Arc::strong_count(lock) > 1);
        map.entry(key.clone()).or_default().clone()
    }
}

const MAX_RECONCILE_ATTEMPTS: u32 = 3;

/// Folds availability confirmations and retractions into their schedule
/// aggregates and recomputes the derived confirmation flag.
///
/// This service is the only code allowed to write `is_confirmed`. Writes
/// for one slot are linearized by a per-key mutex; the versioned UPDATE and
/// the unique slot index are the store-level backstop for deployments where
/// another process touches the same database.
#[derive(Clone)]
pub struct ReconciliationService {
    schedule_repository: ScheduleRepository,
    user_repository: UserRepository,
    notification_repository: NotificationRepository,
    hub: RealtimeHub,
    locks: SlotLocks,
}

impl ReconciliationService {
    pub fn new(
        schedule_repository: ScheduleRepository,
        user_repository: UserRepository,
        notification_repository: NotificationRepository,
        hub: RealtimeHub,
    ) -> Self {
        Self {
            schedule_repository,
            user_repository,
            notification_repository,
            hub,
            locks: SlotLocks::default(),
        }
    }

    pub fn schedule_repository(&self) -> &ScheduleRepository {
        &self.schedule_repository
    }

    /// Fold a confirmed availability entry into its slot's aggregate.
    ///
    /// Idempotent: re-confirming an entry whose owner is already assigned
    /// changes nothing and re-notifies no one.
    pub async fn reconcile_confirm(&self, entry: &Availability) -> Result<(), AppError> {
        let owner = self
            .user_repository
            .find_by_id(&entry.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Availability owner not found".to_string()))?;

        let template = entry.shift_template();
        let key = SlotKey::of(&template, entry.date);
        let lock = self.locks.lock_for(&key);
        let _guard = lock.lock().await;

        let schedule = self
            .schedule_repository
            .find_or_create(&template, entry.date)
            .await?;

        let added = self
            .schedule_repository
            .add_assignee(&schedule.id, &owner.id, owner.gender)
            .await?;
        if !added {
            log::debug!(
                "user {} already assigned to schedule {}, confirm is a no-op",
                owner.id,
                schedule.id
            );
            return Ok(());
        }

        self.recompute(&schedule.id, true).await?;
        self.hub.broadcast_schedule_updated();
        Ok(())
    }

    /// Unwind a previously confirmed entry (owner deleted it, or admin
    /// removed it). Missing aggregates are tolerated: the entry may never
    /// have been confirmed, or the aggregate already emptied out.
    pub async fn reconcile_retract(&self, entry: &Availability) -> Result<(), AppError> {
        let template = entry.shift_template();
        let key = SlotKey::of(&template, entry.date);
        let lock = self.locks.lock_for(&key);
        let _guard = lock.lock().await;

        match self
            .schedule_repository
            .find_by_slot(&template, entry.date)
            .await?
        {
            Some(schedule) => {
                self.remove_and_recompute_locked(&schedule, &entry.user_id)
                    .await?;
            }
            None => {
                log::info!(
                    "no schedule aggregate for retracted availability {} ({} {}), nothing to unwind",
                    entry.id,
                    entry.date,
                    template
                );
            }
        }

        // Clients may be displaying the now-stale aggregate either way
        self.hub.broadcast_schedule_updated();
        Ok(())
    }

    /// Remove one user from one aggregate (cascade-delete path). Shares the
    /// retraction logic and takes the slot lock itself.
    pub async fn remove_user_from_schedule(
        &self,
        schedule: &Schedule,
        user_id: &str,
    ) -> Result<(), AppError> {
        let key = SlotKey::of(&schedule.shift_template(), schedule.date);
        let lock = self.locks.lock_for(&key);
        let _guard = lock.lock().await;

        self.remove_and_recompute_locked(schedule, user_id).await?;
        self.hub.broadcast_schedule_updated();
        Ok(())
    }

    /// Admin direct creation. Unlike the availability-driven path, the
    /// staffing rule is validated eagerly: a roster that does not already
    /// satisfy it is rejected rather than stored as a partial aggregate.
    pub async fn create_schedule(
        &self,
        request: CreateScheduleRequest,
    ) -> Result<ScheduleWithAssignees, AppError> {
        if !catalog::is_known_template(&request.shift) {
            return Err(AppError::BadRequest(format!(
                "Unknown shift slot: {}",
                request.shift
            )));
        }

        let user_ids: Vec<String> = request
            .assigned_users
            .iter()
            .map(|r| r.user_id.clone())
            .collect();
        let roster = self.resolve_roster(&user_ids).await?;
        validate_roster(&roster)?;

        let key = SlotKey::of(&request.shift, request.date);
        let lock = self.locks.lock_for(&key);
        let _guard = lock.lock().await;

        let mut schedule = Schedule::new(&request.shift, request.date);
        schedule.is_confirmed = true;
        self.schedule_repository
            .insert(&schedule)
            .await
            .map_err(|e| {
                if AppError::is_unique_violation(&e) {
                    AppError::Conflict(
                        "A schedule for this date and shift already exists".to_string(),
                    )
                } else {
                    AppError::DatabaseError(e)
                }
            })?;

        for user in &roster {
            self.schedule_repository
                .add_assignee(&schedule.id, &user.id, user.gender)
                .await?;
        }

        for user in &roster {
            self.notify(Notification::for_schedule(
                &user.id,
                format!(
                    "You have been assigned to the {} shift at {}",
                    schedule.date, schedule.location
                ),
                NotificationKind::Schedule,
                &schedule.id,
            ))
            .await;
        }
        self.hub.broadcast_schedule_updated();

        let assigned_users = self.schedule_repository.assignees(&schedule.id).await?;
        Ok(ScheduleWithAssignees {
            schedule,
            assigned_users,
        })
    }

    /// Admin roster replacement, with the same eager validation as direct
    /// creation.
    pub async fn update_schedule(
        &self,
        schedule_id: &str,
        assigned_users: &[String],
    ) -> Result<ScheduleWithAssignees, AppError> {
        let schedule = self
            .schedule_repository
            .find_by_id(schedule_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Schedule not found".to_string()))?;

        let roster = self.resolve_roster(assigned_users).await?;
        validate_roster(&roster)?;

        let key = SlotKey::of(&schedule.shift_template(), schedule.date);
        let lock = self.locks.lock_for(&key);
        let _guard = lock.lock().await;

        let rows: Vec<(String, Gender)> =
            roster.iter().map(|u| (u.id.clone(), u.gender)).collect();
        self.schedule_repository
            .replace_assignees(schedule_id, &rows)
            .await?;
        self.recompute(schedule_id, false).await?;

        for user in &roster {
            self.notify(Notification::for_schedule(
                &user.id,
                format!(
                    "The roster for the {} shift at {} was updated",
                    schedule.date, schedule.location
                ),
                NotificationKind::Schedule,
                schedule_id,
            ))
            .await;
        }
        self.hub.broadcast_schedule_updated();

        let schedule = self
            .schedule_repository
            .find_by_id(schedule_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Schedule not found".to_string()))?;
        let assigned_users = self.schedule_repository.assignees(schedule_id).await?;
        Ok(ScheduleWithAssignees {
            schedule,
            assigned_users,
        })
    }

    /// Assumes the slot lock is held. Removes the user, deletes the
    /// aggregate if it emptied out, else recomputes the flag silently
    /// (a degradation is not an event worth positive messaging).
    async fn remove_and_recompute_locked(
        &self,
        schedule: &Schedule,
        user_id: &str,
    ) -> Result<(), AppError> {
        self.schedule_repository
            .remove_assignee(&schedule.id, user_id)
            .await?;

        let assignees = self.schedule_repository.assignees(&schedule.id).await?;
        if assignees.is_empty() {
            self.schedule_repository.delete(&schedule.id).await?;
            log::info!("schedule {} emptied by retraction, deleted", schedule.id);
            return Ok(());
        }

        self.recompute(&schedule.id, false).await
    }

    /// Re-derive `is_confirmed` from the current assignee set and persist
    /// it with an optimistic version check, retrying a bounded number of
    /// times. A lost update is surfaced as Conflict, never dropped.
    async fn recompute(&self, schedule_id: &str, notify_on_confirm: bool) -> Result<(), AppError> {
        for attempt in 1..=MAX_RECONCILE_ATTEMPTS {
            let Some(fresh) = self.schedule_repository.find_by_id(schedule_id).await? else {
                // Deleted underneath us; nothing left to recompute
                log::warn!("schedule {} disappeared during recompute", schedule_id);
                return Ok(());
            };

            let assignees = self.schedule_repository.assignees(schedule_id).await?;
            let (males, females) = roster_counts(assignees.iter().map(|a| a.gender));
            let confirmed = staffing_rule_met(males, females);

            if self
                .schedule_repository
                .set_confirmed_versioned(schedule_id, confirmed, fresh.version)
                .await?
            {
                if notify_on_confirm && confirmed && !fresh.is_confirmed {
                    self.notify_schedule_confirmed(&fresh, &assignees).await;
                }
                return Ok(());
            }

            log::warn!(
                "version conflict recomputing schedule {}, attempt {}/{}",
                schedule_id,
                attempt,
                MAX_RECONCILE_ATTEMPTS
            );
        }

        Err(AppError::Conflict(format!(
            "Could not update schedule {} after {} attempts",
            schedule_id, MAX_RECONCILE_ATTEMPTS
        )))
    }

    /// The false→true fan-out: every current assignee is told, not just the
    /// newly added one.
    async fn notify_schedule_confirmed(&self, schedule: &Schedule, assignees: &[Assignee]) {
        for assignee in assignees {
            self.notify(Notification::for_schedule(
                &assignee.user_id,
                format!(
                    "The schedule for {} at {} has been confirmed!",
                    schedule.date, schedule.location
                ),
                NotificationKind::Schedule,
                &schedule.id,
            ))
            .await;
        }
    }

    async fn resolve_roster(&self, user_ids: &[String]) -> Result<Vec<User>, AppError> {
        let mut seen = HashSet::new();
        let mut roster = Vec::new();
        for user_id in user_ids {
            if !seen.insert(user_id.clone()) {
                continue;
            }
            let user = self
                .user_repository
                .find_by_id(user_id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("Assigned user not found: {}", user_id))
                })?;
            roster.push(user);
        }
        Ok(roster)
    }

    /// Persist a notification and push it to any live session. Failures are
    /// logged and swallowed: side effects never roll back the aggregate
    /// mutation they follow.
    pub(crate) async fn notify(&self, notification: Notification) {
        match self.notification_repository.create(&notification).await {
            Ok(created) => {
                let user_id = created.user_id.clone();
                self.hub
                    .send_to_user(&user_id, &ServerEvent::Notification(created));
            }
            Err(e) => log::warn!("failed to persist notification: {}", e),
        }
    }
}

fn validate_roster(roster: &[User]) -> Result<(), AppError> {
    let (males, females) = roster_counts(roster.iter().map(|u| u.gender));

    if males < 1 {
        return Err(AppError::BadRequest(
            "At least one brother must be assigned to the shift".to_string(),
        ));
    }
    if !(1..=2).contains(&females) {
        return Err(AppError::BadRequest(
            "Between one and two sisters must be assigned to the shift".to_string(),
        ));
    }
    Ok(())
}
