//! Session ledger model.
//!
//! The ledger is an append-only log of completed focus/break intervals and
//! the sole source of truth for everything derived from it: stats, streaks,
//! challenge progress, and pact daily progress. Sessions are never deleted
//! by normal flow; only the tag fields may be changed after the fact, and
//! only by the owning user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::UserId;

/// Symmetric window within which a resubmitted session is treated as a
/// duplicate of an existing one (same user, mode, and duration). Protects
/// against client double-submission during reconnects.
pub const DEDUP_WINDOW_MS: i64 = 1000;

/// Kind of completed interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// A completed focus interval (a "pomo"). Feeds all derived state.
    Focus,
    /// A completed break interval. Recorded but never affects challenges
    /// or pacts.
    Break,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Focus => "focus",
            SessionMode::Break => "break",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "focus" => Some(SessionMode::Focus),
            "break" => Some(SessionMode::Break),
            _ => None,
        }
    }
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A completed focus or break interval, immutable once written apart from
/// the tag fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier
    pub id: Uuid,

    /// Owning user
    pub user_id: UserId,

    /// Focus or break
    pub mode: SessionMode,

    /// Interval length in seconds
    pub duration_seconds: u32,

    /// Optional free-form label
    pub tag: Option<String>,

    /// Whether the tag is hidden from other users
    pub tag_private: bool,

    /// When the interval finished
    pub completed_at: DateTime<Utc>,
}

impl Session {
    /// Build a fresh session record with a new id.
    pub fn new(
        user_id: UserId,
        mode: SessionMode,
        duration_seconds: u32,
        completed_at: DateTime<Utc>,
        tag: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            mode,
            duration_seconds,
            tag,
            tag_private: false,
            completed_at,
        }
    }
}
