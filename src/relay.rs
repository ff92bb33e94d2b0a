use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::presence::{ConnectionUser, PresenceRegistry, Profile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    File,
    System,
}

/// Frozen sender snapshot embedded in a relayed message. Taken at relay time;
/// later presence mutations never alter a delivered message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sender {
    pub id: String,
    pub nickname: String,
    pub avatar: String,
}

impl From<&ConnectionUser> for Sender {
    fn from(u: &ConnectionUser) -> Self {
        Sender {
            id: u.id.clone(),
            nickname: u.nickname.clone(),
            avatar: u.avatar.clone(),
        }
    }
}

/// A chat or system event. Transient: lives only for the broadcast.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub kind: MessageKind,
    pub content: String,
    #[serde(rename = "fileName", skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Absent iff `kind == System`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Sender>,
    pub timestamp: String,
}

/* ---------------- wire events ---------------- */

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "setUserInfo")]
    SetUserInfo {
        nickname: String,
        #[serde(default)]
        avatar: String,
    },
    #[serde(rename = "message")]
    Message {
        kind: MessageKind,
        content: String,
        #[serde(rename = "fileName", default)]
        file_name: Option<String>,
    },
    #[serde(rename = "ping")]
    Ping,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Full roster replace, never a diff.
    #[serde(rename = "userList")]
    UserList { users: Vec<ConnectionUser> },
    #[serde(rename = "message")]
    Message(ChatMessage),
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "connected")]
    Connected { id: String },
}

/// Where one outbound event goes: every live connection (self-inclusive) or
/// just the connection that triggered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    Sender,
}

#[derive(Debug, Clone)]
pub struct Outbound {
    pub scope: Scope,
    pub event: ServerEvent,
}

fn to_all(event: ServerEvent) -> Outbound {
    Outbound { scope: Scope::All, event }
}

fn to_sender(event: ServerEvent) -> Outbound {
    Outbound { scope: Scope::Sender, event }
}

/// The connection-event state machine. Each handler is a function of
/// (registry, event) → outbound events, with the clock passed in explicitly,
/// so every transition is unit-testable without a live socket. The ws layer
/// serializes calls through one lock, which makes the emission order the
/// single ordering authority for all subscribers.
#[derive(Default)]
pub struct Relay {
    registry: PresenceRegistry,
}

impl Relay {
    fn system_message(content: String, now: DateTime<Utc>) -> ServerEvent {
        ServerEvent::Message(ChatMessage {
            kind: MessageKind::System,
            content,
            file_name: None,
            user: None,
            timestamp: now.to_rfc3339(),
        })
    }

    /// `Open → Identified`. Re-identify replaces the profile in place.
    pub fn on_identify(&mut self, conn_id: &str, profile: Profile, now: DateTime<Utc>) -> Vec<Outbound> {
        let nickname = profile.nickname.clone();
        self.registry.identify(conn_id, profile, now.timestamp_millis());
        tracing::info!(%conn_id, %nickname, "identified");

        vec![
            to_all(ServerEvent::UserList { users: self.registry.snapshot_all() }),
            to_all(Self::system_message(format!("{nickname} joined the room"), now)),
            to_sender(ServerEvent::Connected { id: conn_id.to_owned() }),
        ]
    }

    /// Fan a chat/file message out to everyone, tagged with a frozen sender
    /// snapshot. Unidentified senders are dropped silently, never errored.
    pub fn on_message(
        &mut self,
        conn_id: &str,
        kind: MessageKind,
        content: String,
        file_name: Option<String>,
        now: DateTime<Utc>,
    ) -> Vec<Outbound> {
        self.registry.touch(conn_id, now.timestamp_millis());
        let Some(user) = self.registry.get(conn_id) else {
            tracing::debug!(%conn_id, "dropping message from unidentified connection");
            return Vec::new();
        };

        vec![to_all(ServerEvent::Message(ChatMessage {
            kind,
            content,
            file_name,
            user: Some(Sender::from(user)),
            timestamp: now.to_rfc3339(),
        }))]
    }

    /// Liveness is advisory only; the ack goes to the sender and nobody else.
    pub fn on_heartbeat(&mut self, conn_id: &str, now: DateTime<Utc>) -> Vec<Outbound> {
        self.registry.touch(conn_id, now.timestamp_millis());
        if self.registry.get(conn_id).is_some() {
            vec![to_sender(ServerEvent::Pong)]
        } else {
            Vec::new()
        }
    }

    /// `* → Closed`. A normal transition, never an error. The registry entry
    /// goes away synchronously, so no stale presence survives the disconnect.
    pub fn on_disconnect(&mut self, conn_id: &str, now: DateTime<Utc>) -> Vec<Outbound> {
        let nickname = self.registry.get(conn_id).map(|u| u.nickname.clone());
        if !self.registry.remove(conn_id) {
            return Vec::new();
        }
        let nickname = nickname.unwrap_or_default();
        tracing::info!(%conn_id, %nickname, "disconnected");

        vec![
            to_all(Self::system_message(format!("{nickname} left the room"), now)),
            to_all(ServerEvent::UserList { users: self.registry.snapshot_all() }),
        ]
    }

    /// Entry point for one raw inbound frame. Faults are scoped to the event:
    /// malformed payloads are logged and skipped, the session stays open.
    pub fn on_text(&mut self, conn_id: &str, raw: &str, now: DateTime<Utc>) -> Vec<Outbound> {
        match serde_json::from_str::<ClientEvent>(raw) {
            Ok(ClientEvent::SetUserInfo { nickname, avatar }) => {
                self.on_identify(conn_id, Profile { nickname, avatar }, now)
            }
            Ok(ClientEvent::Message { kind, content, file_name }) => {
                self.on_message(conn_id, kind, content, file_name, now)
            }
            Ok(ClientEvent::Ping) => self.on_heartbeat(conn_id, now),
            Err(err) => {
                tracing::warn!(%conn_id, %err, "ignoring malformed event");
                Vec::new()
            }
        }
    }

    pub fn roster(&self) -> Vec<ConnectionUser> {
        self.registry.snapshot_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap()
    }

    fn identify(relay: &mut Relay, id: &str, nick: &str) -> Vec<Outbound> {
        relay.on_identify(
            id,
            Profile { nickname: nick.into(), avatar: String::new() },
            now(),
        )
    }

    fn roster_of(out: &Outbound) -> &[ConnectionUser] {
        match &out.event {
            ServerEvent::UserList { users } => users,
            other => panic!("expected userList, got {other:?}"),
        }
    }

    fn message_of(out: &Outbound) -> &ChatMessage {
        match &out.event {
            ServerEvent::Message(m) => m,
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[test]
    fn identify_broadcasts_roster_join_notice_and_confirms_sender() {
        let mut relay = Relay::default();
        let out = identify(&mut relay, "c1", "Ann");

        assert_eq!(out.len(), 3);

        assert_eq!(out[0].scope, Scope::All);
        assert_eq!(roster_of(&out[0]).len(), 1);

        assert_eq!(out[1].scope, Scope::All);
        let join = message_of(&out[1]);
        assert_eq!(join.kind, MessageKind::System);
        assert!(join.content.contains("Ann"));
        assert!(join.user.is_none());

        assert_eq!(out[2].scope, Scope::Sender);
        assert!(matches!(&out[2].event, ServerEvent::Connected { id } if id == "c1"));
    }

    #[test]
    fn roster_always_equals_the_identified_set() {
        let mut relay = Relay::default();
        identify(&mut relay, "c1", "Ann");
        let out = identify(&mut relay, "c2", "Bo");

        let names: Vec<_> = roster_of(&out[0]).iter().map(|u| u.nickname.as_str()).collect();
        assert_eq!(names, ["Ann", "Bo"]);

        let out = relay.on_disconnect("c1", now());
        let names: Vec<_> = roster_of(&out[1]).iter().map(|u| u.nickname.as_str()).collect();
        assert_eq!(names, ["Bo"]);
    }

    #[test]
    fn message_carries_a_frozen_sender_snapshot() {
        let mut relay = Relay::default();
        identify(&mut relay, "c1", "Ann");

        let out = relay.on_message("c1", MessageKind::Text, "hi".into(), None, now());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].scope, Scope::All);

        let msg = message_of(&out[0]).clone();
        assert_eq!(msg.content, "hi");
        assert_eq!(msg.user.as_ref().unwrap().nickname, "Ann");

        // re-identify after delivery; the delivered snapshot must not move
        identify(&mut relay, "c1", "Annie");
        assert_eq!(msg.user.unwrap().nickname, "Ann");
    }

    #[test]
    fn unidentified_sender_is_dropped_silently() {
        let mut relay = Relay::default();
        let out = relay.on_message("ghost", MessageKind::Text, "hi".into(), None, now());
        assert!(out.is_empty());
    }

    #[test]
    fn heartbeat_acks_the_sender_only() {
        let mut relay = Relay::default();
        identify(&mut relay, "c1", "Ann");

        let out = relay.on_heartbeat("c1", now());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].scope, Scope::Sender);
        assert!(matches!(out[0].event, ServerEvent::Pong));

        assert!(relay.on_heartbeat("ghost", now()).is_empty());
    }

    #[test]
    fn disconnect_before_identify_emits_nothing() {
        let mut relay = Relay::default();
        assert!(relay.on_disconnect("c1", now()).is_empty());
    }

    #[test]
    fn malformed_frame_is_ignored_without_side_effects() {
        let mut relay = Relay::default();
        identify(&mut relay, "c1", "Ann");

        assert!(relay.on_text("c1", "{not json", now()).is_empty());
        assert!(relay.on_text("c1", r#"{"type":"warp"}"#, now()).is_empty());
        assert_eq!(relay.roster().len(), 1);
    }

    #[test]
    fn file_message_keeps_the_file_name() {
        let mut relay = Relay::default();
        identify(&mut relay, "c1", "Ann");

        let out = relay.on_text(
            "c1",
            r#"{"type":"message","kind":"file","content":"/files/2023/11/14/1700000000000-report.pdf","fileName":"report.pdf"}"#,
            now(),
        );
        let msg = message_of(&out[0]);
        assert_eq!(msg.kind, MessageKind::File);
        assert_eq!(msg.file_name.as_deref(), Some("report.pdf"));
    }

    #[test]
    fn two_user_session_end_to_end() {
        let mut relay = Relay::default();
        identify(&mut relay, "c1", "Ann");
        let out = identify(&mut relay, "c2", "Bo");
        assert_eq!(roster_of(&out[0]).len(), 2);

        let out = relay.on_message("c1", MessageKind::Text, "hi".into(), None, now());
        let msg = message_of(&out[0]);
        assert_eq!(msg.user.as_ref().unwrap().nickname, "Ann");
        assert_eq!(msg.content, "hi");

        let out = relay.on_disconnect("c2", now());
        let leave = message_of(&out[0]);
        assert_eq!(leave.kind, MessageKind::System);
        assert!(leave.content.contains("Bo"));
        assert_eq!(roster_of(&out[1]).len(), 1);
    }
}
