use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Profile a client announces on identify. Stored as-is; nickname rules are
/// advisory and enforced client-side only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub nickname: String,
    #[serde(default)]
    pub avatar: String,
}

/// One live connection's presence entry. Created on identify, refreshed on
/// every inbound event from that connection, removed on disconnect.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionUser {
    pub id: String,
    pub nickname: String,
    pub avatar: String,
    #[serde(rename = "lastActive")]
    pub last_active: i64,
}

/// The single source of truth for who is online. Lives exactly as long as the
/// process; a restart drops all presence. All mutation goes through the four
/// operations below.
#[derive(Default)]
pub struct PresenceRegistry {
    users: HashMap<String, ConnectionUser>,
}

impl PresenceRegistry {
    /// Inserts or replaces the entry for `id`. Re-identifying an existing
    /// connection swaps the profile in place.
    pub fn identify(&mut self, id: &str, profile: Profile, now_ms: i64) {
        self.users.insert(
            id.to_owned(),
            ConnectionUser {
                id: id.to_owned(),
                nickname: profile.nickname,
                avatar: profile.avatar,
                last_active: now_ms,
            },
        );
    }

    /// Refreshes `last_active`. Silently does nothing for connections that
    /// never identified.
    pub fn touch(&mut self, id: &str, now_ms: i64) {
        if let Some(user) = self.users.get_mut(id) {
            user.last_active = now_ms;
        }
    }

    /// Removes the entry, reporting whether one existed. Callers use the
    /// return value to decide whether a leave notice is due.
    pub fn remove(&mut self, id: &str) -> bool {
        self.users.remove(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&ConnectionUser> {
        self.users.get(id)
    }

    /// Full roster, cloned. Sorted by connection id so one read is stable.
    pub fn snapshot_all(&self) -> Vec<ConnectionUser> {
        let mut all: Vec<_> = self.users.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}
