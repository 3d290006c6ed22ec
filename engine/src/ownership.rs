//! Ownership levels and per-user permission resolution.

use crate::UserId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Access level a user holds over a document. Levels are totally ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OwnershipLevel {
    #[default]
    None,
    Limited,
    Observer,
    Owner,
}

impl OwnershipLevel {
    /// Numeric wire form: 0 none, 1 limited, 2 observer, 3 owner.
    pub fn number(self) -> u64 {
        match self {
            OwnershipLevel::None => 0,
            OwnershipLevel::Limited => 1,
            OwnershipLevel::Observer => 2,
            OwnershipLevel::Owner => 3,
        }
    }

    /// Parse the numeric wire form. Out-of-range values clamp to `Owner`.
    pub fn from_number(n: u64) -> Self {
        match n {
            0 => OwnershipLevel::None,
            1 => OwnershipLevel::Limited,
            2 => OwnershipLevel::Observer,
            _ => OwnershipLevel::Owner,
        }
    }
}

impl fmt::Display for OwnershipLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OwnershipLevel::None => "none",
            OwnershipLevel::Limited => "limited",
            OwnershipLevel::Observer => "observer",
            OwnershipLevel::Owner => "owner",
        };
        write!(f, "{name}")
    }
}

/// The ownership map of a document: a default level plus per-user overrides.
///
/// Stored in the document source as an object of user id to numeric level,
/// with the `"default"` key holding the fallback.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ownership {
    pub default: OwnershipLevel,
    pub users: BTreeMap<UserId, OwnershipLevel>,
}

impl Ownership {
    /// Parse an ownership object from a document source value. Missing or
    /// malformed entries resolve to an empty map with default `None`.
    pub fn from_value(value: &Value) -> Self {
        let mut ownership = Ownership::default();
        let Some(obj) = value.as_object() else {
            return ownership;
        };
        for (key, level) in obj {
            let Some(n) = level.as_u64() else { continue };
            let level = OwnershipLevel::from_number(n);
            if key == "default" {
                ownership.default = level;
            } else {
                ownership.users.insert(key.clone(), level);
            }
        }
        ownership
    }

    pub fn to_value(&self) -> Value {
        let mut obj = serde_json::Map::new();
        obj.insert("default".to_string(), json!(self.default.number()));
        for (user, level) in &self.users {
            obj.insert(user.clone(), json!(level.number()));
        }
        Value::Object(obj)
    }

    /// The effective level for a user: their explicit entry, or the default.
    /// An explicit entry always wins, even when it is lower than the default.
    pub fn level_for(&self, user: &str) -> OwnershipLevel {
        self.users.get(user).copied().unwrap_or(self.default)
    }
}

/// Mutating and reading actions gated by ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    View,
    Create,
    Update,
    Delete,
}
