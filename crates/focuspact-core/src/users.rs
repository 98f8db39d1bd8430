//! User records.
//!
//! Stats are always re-derived from the session ledger; the one persisted
//! derived value is `best_daily_streak`, a monotonic high-water mark that
//! only ever increases, even when the live streak resets to zero.

use serde::{Deserialize, Serialize};

use crate::identity::UserId;

/// Visibility of a user's activity to others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Privacy {
    Public,
    FriendsOnly,
    Private,
}

impl Privacy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Privacy::Public => "public",
            Privacy::FriendsOnly => "friends_only",
            Privacy::Private => "private",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Privacy::Public),
            "friends_only" => Some(Privacy::FriendsOnly),
            "private" => Some(Privacy::Private),
            _ => None,
        }
    }
}

/// A registered user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier
    pub id: UserId,

    /// Reference into the external identity system (e.g. an email)
    pub identity_ref: String,

    /// Display name
    pub username: String,

    /// Monotonic high-water mark of the daily streak. Never decreased.
    pub best_daily_streak: u32,

    /// Activity visibility
    pub privacy: Privacy,
}

impl User {
    pub fn new(id: UserId, identity_ref: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id,
            identity_ref: identity_ref.into(),
            username: username.into(),
            best_daily_streak: 0,
            privacy: Privacy::Public,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privacy_roundtrip() {
        for p in [Privacy::Public, Privacy::FriendsOnly, Privacy::Private] {
            assert_eq!(Privacy::parse(p.as_str()), Some(p));
        }
        assert_eq!(Privacy::parse("hidden"), None);
    }

    #[test]
    fn new_user_starts_with_zero_streak() {
        let u = User::new("u1".to_string(), "u1@example.com", "alice");
        assert_eq!(u.best_daily_streak, 0);
        assert_eq!(u.privacy, Privacy::Public);
    }
}
