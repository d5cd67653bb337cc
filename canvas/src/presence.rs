//! Room members and host election.
//!
//! The host is the lexicographically smallest member id currently present.
//! Rooms are capped at a handful of members, so a static sort is enough; the
//! host's only privilege is republishing the enemy snapshot.

#[cfg(test)]
#[path = "presence_test.rs"]
mod presence_test;

use serde::{Deserialize, Serialize};

/// Identity of the peer running this engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalUser {
    pub id: String,
    pub username: String,
    /// Cursor and ink color shown to other peers.
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl LocalUser {
    #[must_use]
    pub fn new(id: impl Into<String>, username: impl Into<String>, color: impl Into<String>) -> Self {
        Self { id: id.into(), username: username.into(), color: color.into(), avatar_url: None }
    }

    #[must_use]
    pub fn as_member(&self) -> Member {
        Member { id: self.id.clone(), username: self.username.clone(), avatar_url: self.avatar_url.clone() }
    }
}

/// A present room member as seen by the battle engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// The host among `ids`: the lexicographically smallest, `None` when empty.
pub fn elect_host<'a>(ids: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    ids.into_iter().min()
}

/// Member ids present in a `presence` collection value (`{uid: true}`), sorted.
#[must_use]
pub fn present_ids(presence: &serde_json::Value) -> Vec<String> {
    let Some(map) = presence.as_object() else {
        return Vec::new();
    };
    let mut ids: Vec<String> = map
        .iter()
        .filter(|(_, v)| v.as_bool().unwrap_or(false))
        .map(|(k, _)| k.clone())
        .collect();
    ids.sort();
    ids
}
