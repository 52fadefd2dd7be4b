use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::StreamExt;
use tokio::sync::mpsc;

use crate::auth::{bearer_token, decode_claims, Claims};
use crate::config::Config;
use crate::database::repositories::MessageRepository;
use crate::realtime::{ClientEvent, RealtimeHub, ServerEvent};
use crate::services::ChatRoomService;

const CHAT_HISTORY_LIMIT: i64 = 50;

/// WebSocket entry point. The JWT is checked before the upgrade; an
/// unauthenticated socket never reaches the hub.
pub async fn websocket(
    req: HttpRequest,
    stream: web::Payload,
    config: web::Data<Config>,
    hub: web::Data<RealtimeHub>,
    chat_service: web::Data<ChatRoomService>,
    message_repository: web::Data<MessageRepository>,
) -> actix_web::Result<HttpResponse> {
    let Some(token) = session_token(&req) else {
        return Ok(HttpResponse::Unauthorized().finish());
    };
    let claims = match decode_claims(&token, &config.jwt_secret) {
        Ok(claims) => claims,
        Err(_) => return Ok(HttpResponse::Unauthorized().finish()),
    };

    let (response, session, msg_stream) = actix_ws::handle(&req, stream)?;

    let (tx, rx) = mpsc::unbounded_channel();
    let conn_id = hub.connect(tx);
    hub.bind_user(&conn_id, claims.user_id());
    log::info!("session {} opened for user {}", conn_id, claims.sub);

    actix_web::rt::spawn(write_loop(session.clone(), rx));
    actix_web::rt::spawn(read_loop(
        session,
        msg_stream,
        claims,
        conn_id,
        hub.into_inner().as_ref().clone(),
        chat_service.into_inner().as_ref().clone(),
        message_repository.into_inner().as_ref().clone(),
    ));

    Ok(response)
}

/// Browsers cannot set headers on a WebSocket upgrade, so the token is
/// accepted from the query string as well.
fn session_token(req: &HttpRequest) -> Option<String> {
    for pair in req.query_string().split('&') {
        if let Some(value) = pair.strip_prefix("token=") {
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    bearer_token(req)
}

/// Drains the hub-side queue into the socket. Ends when the queue closes
/// (disconnect) or the peer stops accepting writes.
async fn write_loop(mut session: actix_ws::Session, mut rx: mpsc::UnboundedReceiver<ServerEvent>) {
    while let Some(event) = rx.recv().await {
        let payload = match serde_json::to_string(&event) {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("failed to serialize server event: {}", e);
                continue;
            }
        };
        if session.text(payload).await.is_err() {
            break;
        }
    }
    let _ = session.close(None).await;
}

async fn read_loop(
    mut session: actix_ws::Session,
    msg_stream: actix_ws::MessageStream,
    claims: Claims,
    conn_id: String,
    hub: RealtimeHub,
    chat_service: ChatRoomService,
    message_repository: MessageRepository,
) {
    let mut msg_stream = msg_stream.aggregate_continuations();

    while let Some(msg) = msg_stream.next().await {
        match msg {
            Ok(actix_ws::AggregatedMessage::Text(text)) => {
                let event = match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => event,
                    Err(e) => {
                        log::debug!("session {} sent unparseable event: {}", conn_id, e);
                        continue;
                    }
                };
                handle_client_event(event, &claims, &conn_id, &hub, &chat_service, &message_repository)
                    .await;
            }
            Ok(actix_ws::AggregatedMessage::Ping(bytes)) => {
                if session.pong(&bytes).await.is_err() {
                    break;
                }
            }
            Ok(actix_ws::AggregatedMessage::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    let online = hub.disconnect(&conn_id);
    hub.broadcast(&ServerEvent::OnlineUsers(online));
    log::info!("session {} closed for user {}", conn_id, claims.sub);
}

/// The user id a client claims inside an event must match the token the
/// session was opened with; a mismatch is dropped, not answered.
fn verify_identity(claims: &Claims, claimed: &str, event: &str) -> bool {
    if claims.user_id() == claimed {
        return true;
    }
    log::warn!(
        "user {} sent {} claiming to be {}, dropping",
        claims.sub,
        event,
        claimed
    );
    false
}

async fn handle_client_event(
    event: ClientEvent,
    claims: &Claims,
    conn_id: &str,
    hub: &RealtimeHub,
    chat_service: &ChatRoomService,
    message_repository: &MessageRepository,
) {
    match event {
        ClientEvent::Authenticate { user_id } => {
            if verify_identity(claims, &user_id, "authenticate") {
                hub.bind_user(conn_id, &user_id);
            }
        }
        ClientEvent::JoinChat { user_id } => {
            if !verify_identity(claims, &user_id, "join-chat") {
                return;
            }
            hub.bind_user(conn_id, &user_id);
            let online = hub.join_chat(conn_id);
            hub.broadcast(&ServerEvent::OnlineUsers(online));

            match message_repository.recent(CHAT_HISTORY_LIMIT).await {
                Ok(history) => {
                    hub.send_to_user(&user_id, &ServerEvent::ChatHistory(history));
                }
                Err(e) => log::error!("failed to load chat history: {}", e),
            }
        }
        ClientEvent::SendMessage { message, user_id } => {
            if !verify_identity(claims, &user_id, "send-message") {
                return;
            }
            let message = message.trim();
            if message.is_empty() {
                return;
            }
            match message_repository.create(&user_id, message).await {
                Ok(created) => hub.broadcast(&ServerEvent::ChatMessage(created)),
                Err(e) => log::error!("failed to persist chat message: {}", e),
            }
        }
        ClientEvent::JoinScheduleChat { schedule_id, user_id } => {
            if !verify_identity(claims, &user_id, "join-schedule-chat") {
                return;
            }
            let room = match chat_service
                .get_or_create(&schedule_id, &user_id, claims.is_admin())
                .await
            {
                Ok(room) => room,
                Err(e) => {
                    log::debug!(
                        "user {} denied schedule chat {}: {}",
                        user_id,
                        schedule_id,
                        e
                    );
                    return;
                }
            };

            hub.join_room(&schedule_id, conn_id);
            hub.send_to_user(&user_id, &ServerEvent::ScheduleChatHistory(room.messages));
            hub.send_to_room(
                &schedule_id,
                &ServerEvent::UserJoinedScheduleChat { user_id },
                Some(conn_id),
            );
        }
        ClientEvent::LeaveScheduleChat { schedule_id, user_id } => {
            if !verify_identity(claims, &user_id, "leave-schedule-chat") {
                return;
            }
            hub.leave_room(&schedule_id, conn_id);
            hub.send_to_room(
                &schedule_id,
                &ServerEvent::UserLeftScheduleChat { user_id },
                Some(conn_id),
            );
        }
        ClientEvent::SendScheduleMessage {
            schedule_id,
            message,
            user_id,
        } => {
            if !verify_identity(claims, &user_id, "send-schedule-message") {
                return;
            }
            match chat_service.post_message(&schedule_id, &user_id, &message).await {
                Ok(view) => {
                    hub.send_to_room(&schedule_id, &ServerEvent::ScheduleChatMessage(view), None);
                }
                Err(e) => {
                    log::debug!(
                        "user {} could not post to schedule chat {}: {}",
                        user_id,
                        schedule_id,
                        e
                    );
                }
            }
        }
    }
}
