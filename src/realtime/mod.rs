pub mod session;

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::database::models::{ChatMessageView, GlobalMessage, Notification};

/// Events pushed from the server to connected clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
#[serde(rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Point-to-point delivery of a freshly persisted notification.
    Notification(Notification),
    /// Coarse-grained invalidation: clients refetch the monthly schedule.
    /// Deliberately carries no payload; partial patches would reintroduce
    /// the lost-update races the refetch model avoids.
    ScheduleUpdated,
    ChatMessage(GlobalMessage),
    ChatHistory(Vec<GlobalMessage>),
    OnlineUsers(usize),
    ScheduleChatMessage(ChatMessageView),
    ScheduleChatHistory(Vec<ChatMessageView>),
    ScheduleMessageNotification {
        schedule_id: String,
        sender_id: String,
    },
    UserJoinedScheduleChat {
        user_id: String,
    },
    UserLeftScheduleChat {
        user_id: String,
    },
}

/// Events a client may send over its real-time session.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
#[serde(rename_all_fields = "camelCase")]
pub enum ClientEvent {
    Authenticate {
        user_id: String,
    },
    JoinChat {
        user_id: String,
    },
    SendMessage {
        message: String,
        user_id: String,
    },
    JoinScheduleChat {
        schedule_id: String,
        user_id: String,
    },
    LeaveScheduleChat {
        schedule_id: String,
        user_id: String,
    },
    SendScheduleMessage {
        schedule_id: String,
        message: String,
        user_id: String,
    },
}

struct SessionEntry {
    user_id: Option<String>,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

#[derive(Default)]
struct HubState {
    sessions: HashMap<String, SessionEntry>,
    // user id -> live connection ids; process-local, rebuilt from nothing
    // on restart, so a reconnecting client must re-authenticate
    users: HashMap<String, HashSet<String>>,
    // schedule id -> connection ids currently in that schedule's chat
    rooms: HashMap<String, HashSet<String>>,
    // connections currently in the global chat
    chat_conns: HashSet<String>,
}

/// Process-local registry of live real-time sessions plus the fan-out paths
/// built on it: point-to-point notification delivery, per-schedule chat
/// rooms and the global schedule-invalidation broadcast.
///
/// Connection handles are queue senders only; a session that went away is
/// detected by its closed queue and dropped on the next cleanup.
#[derive(Clone, Default)]
pub struct RealtimeHub {
    state: Arc<Mutex<HubState>>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection; the returned id keys all later calls.
    pub fn connect(&self, tx: mpsc::UnboundedSender<ServerEvent>) -> String {
        let conn_id = Uuid::new_v4().to_string();
        let mut state = self.state.lock().unwrap();
        state.sessions.insert(
            conn_id.clone(),
            SessionEntry { user_id: None, tx },
        );
        conn_id
    }

    /// Drop a connection and every index entry pointing at it. Returns the
    /// new global-chat occupancy so callers can publish the updated count.
    pub fn disconnect(&self, conn_id: &str) -> usize {
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.sessions.remove(conn_id) {
            if let Some(user_id) = entry.user_id {
                if let Some(conns) = state.users.get_mut(&user_id) {
                    conns.remove(conn_id);
                    if conns.is_empty() {
                        state.users.remove(&user_id);
                    }
                }
            }
        }
        for conns in state.rooms.values_mut() {
            conns.remove(conn_id);
        }
        state.rooms.retain(|_, conns| !conns.is_empty());
        state.chat_conns.remove(conn_id);
        state.chat_conns.len()
    }

    /// Associate a connection with an authenticated user id. The caller has
    /// already verified the id against the session's own token identity.
    pub fn bind_user(&self, conn_id: &str, user_id: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.sessions.get_mut(conn_id) {
            entry.user_id = Some(user_id.to_string());
        } else {
            return;
        }
        state
            .users
            .entry(user_id.to_string())
            .or_default()
            .insert(conn_id.to_string());
    }

    /// Best-effort point-to-point delivery to every live session of a user.
    /// Without a live session the persisted notification record is the
    /// delivery; nothing to do here.
    pub fn send_to_user(&self, user_id: &str, event: &ServerEvent) {
        let state = self.state.lock().unwrap();
        let Some(conns) = state.users.get(user_id) else {
            log::debug!("user {} has no live session, skipping push", user_id);
            return;
        };
        for conn_id in conns {
            if let Some(entry) = state.sessions.get(conn_id) {
                let _ = entry.tx.send(event.clone());
            }
        }
    }

    /// Send to every connected client, authenticated or not.
    pub fn broadcast(&self, event: &ServerEvent) {
        let state = self.state.lock().unwrap();
        for entry in state.sessions.values() {
            let _ = entry.tx.send(event.clone());
        }
    }

    /// The schedule-invalidation signal: every connected client refetches.
    pub fn broadcast_schedule_updated(&self) {
        log::debug!("broadcasting schedule-updated to all clients");
        self.broadcast(&ServerEvent::ScheduleUpdated);
    }

    pub fn join_room(&self, schedule_id: &str, conn_id: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .rooms
            .entry(schedule_id.to_string())
            .or_default()
            .insert(conn_id.to_string());
    }

    pub fn leave_room(&self, schedule_id: &str, conn_id: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(conns) = state.rooms.get_mut(schedule_id) {
            conns.remove(conn_id);
            if conns.is_empty() {
                state.rooms.remove(schedule_id);
            }
        }
    }

    pub fn send_to_room(&self, schedule_id: &str, event: &ServerEvent, except: Option<&str>) {
        let state = self.state.lock().unwrap();
        let Some(conns) = state.rooms.get(schedule_id) else {
            return;
        };
        for conn_id in conns {
            if Some(conn_id.as_str()) == except {
                continue;
            }
            if let Some(entry) = state.sessions.get(conn_id) {
                let _ = entry.tx.send(event.clone());
            }
        }
    }

    /// Enter the global chat; returns the new occupancy.
    pub fn join_chat(&self, conn_id: &str) -> usize {
        let mut state = self.state.lock().unwrap();
        state.chat_conns.insert(conn_id.to_string());
        state.chat_conns.len()
    }

    pub fn online_chat_users(&self) -> usize {
        self.state.lock().unwrap().chat_conns.len()
    }

    #[cfg(test)]
    pub fn connected_sessions(&self) -> usize {
        self.state.lock().unwrap().sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_session(hub: &RealtimeHub) -> (String, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (hub.connect(tx), rx)
    }

    #[test]
    fn point_to_point_reaches_only_the_bound_user() {
        let hub = RealtimeHub::new();
        let (conn_a, mut rx_a) = open_session(&hub);
        let (_conn_b, mut rx_b) = open_session(&hub);
        hub.bind_user(&conn_a, "user-a");

        hub.send_to_user("user-a", &ServerEvent::ScheduleUpdated);

        assert!(matches!(rx_a.try_recv(), Ok(ServerEvent::ScheduleUpdated)));
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn broadcast_reaches_everyone_including_unauthenticated() {
        let hub = RealtimeHub::new();
        let (_conn_a, mut rx_a) = open_session(&hub);
        let (_conn_b, mut rx_b) = open_session(&hub);

        hub.broadcast_schedule_updated();

        assert!(matches!(rx_a.try_recv(), Ok(ServerEvent::ScheduleUpdated)));
        assert!(matches!(rx_b.try_recv(), Ok(ServerEvent::ScheduleUpdated)));
    }

    #[test]
    fn room_send_skips_the_excluded_connection() {
        let hub = RealtimeHub::new();
        let (conn_a, mut rx_a) = open_session(&hub);
        let (conn_b, mut rx_b) = open_session(&hub);
        hub.join_room("sched-1", &conn_a);
        hub.join_room("sched-1", &conn_b);

        hub.send_to_room(
            "sched-1",
            &ServerEvent::UserJoinedScheduleChat {
                user_id: "someone".to_string(),
            },
            Some(&conn_a),
        );

        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn disconnect_cleans_every_index() {
        let hub = RealtimeHub::new();
        let (conn, mut rx) = open_session(&hub);
        hub.bind_user(&conn, "user-a");
        hub.join_room("sched-1", &conn);
        let occupancy = hub.join_chat(&conn);
        assert_eq!(occupancy, 1);

        assert_eq!(hub.disconnect(&conn), 0);
        assert_eq!(hub.connected_sessions(), 0);

        hub.send_to_user("user-a", &ServerEvent::ScheduleUpdated);
        hub.send_to_room("sched-1", &ServerEvent::ScheduleUpdated, None);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn events_serialize_with_kebab_case_names() {
        let json = serde_json::to_string(&ServerEvent::ScheduleUpdated).unwrap();
        assert_eq!(json, r#"{"event":"schedule-updated"}"#);

        let json = serde_json::to_string(&ServerEvent::ScheduleMessageNotification {
            schedule_id: "s1".to_string(),
            sender_id: "u1".to_string(),
        })
        .unwrap();
        assert!(json.contains("schedule-message-notification"));
        assert!(json.contains("scheduleId"));
    }

    #[test]
    fn client_events_deserialize() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"event":"send-schedule-message","data":{"scheduleId":"s1","message":"hi","userId":"u1"}}"#,
        )
        .unwrap();
        assert!(matches!(
            event,
            ClientEvent::SendScheduleMessage { schedule_id, .. } if schedule_id == "s1"
        ));
    }
}
