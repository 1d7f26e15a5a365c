//! Board permission maps and their evaluation.
//!
//! A map is stored as JSON where every entry is either a boolean or an object
//! `{"min": <rank>, "user": <id>}`. Entries are turned into [`PermissionRule`]
//! once when the map is loaded.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::db::Rank;

/// Permission key checked before creating an article on a board.
pub const WRITE_PERMISSION: &str = "write";

/// A single access rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawRule", into = "RawRule")]
pub enum PermissionRule {
    AlwaysAllow,
    AlwaysDeny,
    /// Rank at least `min`, and when `scoped_user` is set, only that user.
    RankThreshold {
        min: Rank,
        scoped_user: Option<String>,
    },
}

/// Stored shape of a rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawRule {
    Flag(bool),
    Object {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user: Option<String>,
    },
}

impl From<RawRule> for PermissionRule {
    fn from(raw: RawRule) -> Self {
        match raw {
            RawRule::Flag(true) => PermissionRule::AlwaysAllow,
            RawRule::Flag(false) => PermissionRule::AlwaysDeny,
            RawRule::Object {
                min: Some(min),
                user,
            } => PermissionRule::RankThreshold {
                min: Rank(min),
                scoped_user: user,
            },
            // An object without a threshold has nothing to satisfy.
            RawRule::Object { min: None, .. } => PermissionRule::AlwaysDeny,
        }
    }
}

impl From<PermissionRule> for RawRule {
    fn from(rule: PermissionRule) -> Self {
        match rule {
            PermissionRule::AlwaysAllow => RawRule::Flag(true),
            PermissionRule::AlwaysDeny => RawRule::Flag(false),
            PermissionRule::RankThreshold { min, scoped_user } => RawRule::Object {
                min: Some(min.0),
                user: scoped_user,
            },
        }
    }
}

/// Per-board table of permission key to rule. Missing keys are open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionMap(HashMap<String, PermissionRule>);

impl PermissionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, rule: PermissionRule) -> Self {
        self.0.insert(key.into(), rule);
        self
    }

    pub fn get(&self, key: &str) -> Option<&PermissionRule> {
        self.0.get(key)
    }
}

/// The subject asking for access.
#[derive(Debug, Clone, Copy)]
pub struct Requester<'a> {
    pub id: &'a str,
    pub rank: Rank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

impl From<bool> for Decision {
    fn from(allowed: bool) -> Self {
        if allowed {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allow => write!(f, "allow"),
            Decision::Deny => write!(f, "deny"),
        }
    }
}

/// Decide whether `requester` may perform `key` under `map`.
///
/// Banned ranks are denied before the map is consulted, including for keys
/// the map does not mention.
pub fn evaluate(map: &PermissionMap, key: &str, requester: &Requester<'_>) -> Decision {
    if requester.rank.is_banned() {
        return Decision::Deny;
    }

    let Some(rule) = map.get(key) else {
        return Decision::Allow;
    };

    match rule {
        PermissionRule::AlwaysAllow => Decision::Allow,
        PermissionRule::AlwaysDeny => Decision::Deny,
        PermissionRule::RankThreshold {
            min,
            scoped_user: Some(user),
        } => Decision::from(requester.id == user && requester.rank >= *min),
        PermissionRule::RankThreshold {
            min,
            scoped_user: None,
        } => Decision::from(requester.rank >= *min),
    }
}
