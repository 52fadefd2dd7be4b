use actix_cors::Cors;
use actix_web::{get, middleware::Logger, web, App, HttpResponse, HttpServer, Responder};
use anyhow::Result;

use outreach_scheduler::database::{
    init_database,
    repositories::{
        AvailabilityRepository, ChatRoomRepository, ExperienceRepository, MessageRepository,
        NotificationRepository, ScheduleRepository, UserRepository,
    },
};
use outreach_scheduler::handlers::{
    admin, auth, availability, chat, experiences, notifications, schedule,
};
use outreach_scheduler::realtime::session;
use outreach_scheduler::services::{CascadeDeleteService, ChatRoomService, ReconciliationService};
use outreach_scheduler::{AuthService, Config, RealtimeHub};

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now()
    }))
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = Config::from_env()?;
    log::info!("configuration loaded (environment: {})", config.environment);

    let pool = init_database(&config.database_url).await?;
    log::info!("database initialized");

    let user_repository = UserRepository::new(pool.clone());
    let availability_repository = AvailabilityRepository::new(pool.clone());
    let schedule_repository = ScheduleRepository::new(pool.clone());
    let notification_repository = NotificationRepository::new(pool.clone());
    let chat_repository = ChatRoomRepository::new(pool.clone());
    let message_repository = MessageRepository::new(pool.clone());
    let experience_repository = ExperienceRepository::new(pool.clone());

    let hub = RealtimeHub::new();
    let auth_service = AuthService::new(user_repository.clone(), config.clone());
    let reconciliation = ReconciliationService::new(
        schedule_repository.clone(),
        user_repository.clone(),
        notification_repository.clone(),
        hub.clone(),
    );
    let chat_service = ChatRoomService::new(
        chat_repository.clone(),
        schedule_repository.clone(),
        notification_repository.clone(),
        hub.clone(),
    );
    let cascade = CascadeDeleteService::new(
        user_repository.clone(),
        availability_repository.clone(),
        notification_repository.clone(),
        chat_repository.clone(),
        message_repository.clone(),
        experience_repository.clone(),
        reconciliation.clone(),
    );

    let user_repo_data = web::Data::new(user_repository);
    let availability_repo_data = web::Data::new(availability_repository);
    let schedule_repo_data = web::Data::new(schedule_repository);
    let notification_repo_data = web::Data::new(notification_repository);
    let experience_repo_data = web::Data::new(experience_repository);
    let message_repo_data = web::Data::new(message_repository);
    let hub_data = web::Data::new(hub);
    let auth_service_data = web::Data::new(auth_service);
    let reconciliation_data = web::Data::new(reconciliation);
    let chat_service_data = web::Data::new(chat_service);
    let cascade_data = web::Data::new(cascade);
    let config_data = web::Data::new(config.clone());

    let client_base_url = config.client_base_url.clone();
    let server_address = config.server_address();
    log::info!("server starting on http://{}", server_address);

    HttpServer::new(move || {
        App::new()
            .app_data(user_repo_data.clone())
            .app_data(availability_repo_data.clone())
            .app_data(schedule_repo_data.clone())
            .app_data(notification_repo_data.clone())
            .app_data(experience_repo_data.clone())
            .app_data(message_repo_data.clone())
            .app_data(hub_data.clone())
            .app_data(auth_service_data.clone())
            .app_data(reconciliation_data.clone())
            .app_data(chat_service_data.clone())
            .app_data(cascade_data.clone())
            .app_data(config_data.clone())
            .wrap(
                Cors::default()
                    .allowed_origin(&client_base_url)
                    .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
                    .allowed_headers(vec!["Authorization", "Content-Type", "Accept"])
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .service(health)
            .route("/ws", web::get().to(session::websocket))
            .service(
                web::scope("/api")
                    .service(
                        web::scope("/auth")
                            .route("/register", web::post().to(auth::register))
                            .route("/login", web::post().to(auth::login))
                            .route("/me", web::get().to(auth::me)),
                    )
                    .service(
                        web::scope("/availability")
                            .route("", web::post().to(availability::submit))
                            .route("/my", web::get().to(availability::my))
                            .route("/all", web::get().to(availability::all))
                            .route("/{id}/status", web::patch().to(availability::set_status))
                            .route("/{id}", web::delete().to(availability::remove)),
                    )
                    .service(
                        web::scope("/schedule")
                            .route("/monthly", web::get().to(schedule::monthly))
                            .route("", web::post().to(schedule::create))
                            .route("/{id}", web::get().to(schedule::by_id))
                            .route("/{id}", web::put().to(schedule::update))
                            .route("/{id}", web::delete().to(schedule::remove)),
                    )
                    .service(
                        web::scope("/chat-room")
                            // registered before the catch-all {schedule_id} route
                            .route("/unread-counts", web::get().to(chat::unread_counts))
                            .route("/{schedule_id}", web::get().to(chat::room))
                            .route("/{schedule_id}/message", web::post().to(chat::post_message))
                            .route("/{schedule_id}/mark-read", web::post().to(chat::mark_read)),
                    )
                    .service(
                        web::scope("/notifications")
                            .route("", web::get().to(notifications::list))
                            .route("/read-all", web::patch().to(notifications::mark_all_read))
                            .route("/{id}/read", web::patch().to(notifications::mark_read))
                            .route("/{id}", web::delete().to(notifications::remove)),
                    )
                    .service(
                        web::scope("/experiences")
                            .route("", web::get().to(experiences::list))
                            .route("", web::post().to(experiences::create))
                            .route("/{id}", web::delete().to(experiences::remove)),
                    )
                    .service(
                        web::scope("/admin")
                            .route("/users", web::get().to(admin::list_users))
                            .route("/users/{id}", web::delete().to(admin::delete_user)),
                    ),
            )
    })
    .bind(&server_address)?
    .run()
    .await
    .map_err(|e| anyhow::anyhow!("Server error: {}", e))
}
