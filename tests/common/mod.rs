#![allow(dead_code)]

use anyhow::Result;
use sqlx::SqlitePool;
use tempfile::TempDir;

use outreach_scheduler::database::init_database;
use outreach_scheduler::database::models::{Gender, User, UserRole};
use outreach_scheduler::database::repositories::{
    AvailabilityRepository, ChatRoomRepository, ExperienceRepository, MessageRepository,
    NotificationRepository, ScheduleRepository, UserRepository,
};
use outreach_scheduler::domain::{shift_catalog, CalendarDay, ShiftTemplate};
use outreach_scheduler::services::{CascadeDeleteService, ChatRoomService, ReconciliationService};
use outreach_scheduler::RealtimeHub;

pub struct TestDb {
    pub pool: SqlitePool,
    _temp_dir: TempDir,
}

impl TestDb {
    pub async fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let database_url = format!("sqlite:{}/test.db", temp_dir.path().display());
        let pool = init_database(&database_url).await?;

        Ok(TestDb {
            pool,
            _temp_dir: temp_dir,
        })
    }
}

/// Every repository and service wired against one test database, plus the
/// hub so tests can observe broadcast behavior if they need to.
pub struct TestServices {
    pub db: TestDb,
    pub hub: RealtimeHub,
    pub users: UserRepository,
    pub availabilities: AvailabilityRepository,
    pub schedules: ScheduleRepository,
    pub notifications: NotificationRepository,
    pub chat_rooms: ChatRoomRepository,
    pub messages: MessageRepository,
    pub experiences: ExperienceRepository,
    pub reconciliation: ReconciliationService,
    pub chat: ChatRoomService,
    pub cascade: CascadeDeleteService,
}

impl TestServices {
    pub async fn new() -> Result<Self> {
        let db = TestDb::new().await?;
        let pool = db.pool.clone();

        let users = UserRepository::new(pool.clone());
        let availabilities = AvailabilityRepository::new(pool.clone());
        let schedules = ScheduleRepository::new(pool.clone());
        let notifications = NotificationRepository::new(pool.clone());
        let chat_rooms = ChatRoomRepository::new(pool.clone());
        let messages = MessageRepository::new(pool.clone());
        let experiences = ExperienceRepository::new(pool.clone());

        let hub = RealtimeHub::new();
        let reconciliation = ReconciliationService::new(
            schedules.clone(),
            users.clone(),
            notifications.clone(),
            hub.clone(),
        );
        let chat = ChatRoomService::new(
            chat_rooms.clone(),
            schedules.clone(),
            notifications.clone(),
            hub.clone(),
        );
        let cascade = CascadeDeleteService::new(
            users.clone(),
            availabilities.clone(),
            notifications.clone(),
            chat_rooms.clone(),
            messages.clone(),
            experiences.clone(),
            reconciliation.clone(),
        );

        Ok(TestServices {
            db,
            hub,
            users,
            availabilities,
            schedules,
            notifications,
            chat_rooms,
            messages,
            experiences,
            reconciliation,
            chat,
            cascade,
        })
    }

    pub async fn create_user(&self, first_name: &str, gender: Gender) -> User {
        let user = User::new(
            format!("{}@example.com", first_name.to_lowercase()),
            // Not a real hash; these tests never go through login
            "hash".to_string(),
            first_name.to_string(),
            "Rossi".to_string(),
            gender,
        );
        self.users
            .create_user(&user)
            .await
            .expect("failed to create test user")
    }

    pub async fn create_admin(&self, first_name: &str, gender: Gender) -> User {
        let user = self.create_user(first_name, gender).await;
        self.users
            .set_role(&user.id, UserRole::Admin)
            .await
            .expect("failed to promote test user");
        User {
            role: UserRole::Admin,
            ..user
        }
    }
}

pub fn test_config() -> outreach_scheduler::Config {
    outreach_scheduler::Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test-jwt-secret-key-that-is-long-enough".to_string(),
        jwt_expiration_days: 1,
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "test".to_string(),
        client_base_url: "http://localhost:5173".to_string(),
    }
}

/// First catalog slot; tests that only need "some valid slot" use this.
pub fn any_template() -> ShiftTemplate {
    shift_catalog()[0].clone()
}

/// The two Saturday slots at the same location, for same-day isolation tests.
pub fn saturday_templates() -> (ShiftTemplate, ShiftTemplate) {
    let morning = shift_catalog()
        .iter()
        .find(|t| t.start_time == "09:00" && t.location == "Piazza Dalmazia")
        .expect("missing Saturday morning slot")
        .clone();
    let midday = shift_catalog()
        .iter()
        .find(|t| t.start_time == "11:00" && t.location == "Piazza Dalmazia")
        .expect("missing Saturday midday slot")
        .clone();
    (morning, midday)
}

pub fn day(input: &str) -> CalendarDay {
    CalendarDay::normalize(input).expect("invalid test date")
}
