//! # Focuspact Core Library
//!
//! This library is the derived-state engine behind the focuspact timer:
//! it turns an append-only ledger of completed focus/break sessions into
//! statistics, challenge completions, and multi-participant accountability
//! pacts. All operations are available via a standalone CLI binary; any
//! hosted or GUI surface is a thin layer over the same core library.
//!
//! ## Architecture
//!
//! - **Ledger**: Append-only session log with a dedup ingestion guard;
//!   the sole source of truth for everything derived
//! - **Stats**: Pure recomputation of period counts, streaks, and the
//!   focus-fitness curve from ledger timestamps
//! - **Pacts**: A one-way state machine (`pending -> active ->
//!   {completed, failed}`) driven by compare-and-set transitions
//! - **Storage**: SQLite-based persistence and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`Engine`]: Facade every caller goes through
//! - [`StatsAggregator`]: Ledger-to-stats recomputation
//! - [`Database`]: Ledger and derived-table persistence
//! - [`Config`]: Application configuration management

pub mod badge;
pub mod challenge;
pub mod engine;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod pact;
pub mod stats;
pub mod storage;
pub mod tasks;
pub mod users;

pub use challenge::{ChallengeCompletion, ChallengeDefinition, ChallengeKind, ChallengeProgress};
pub use engine::{Engine, PactOverview, SweepSummary};
pub use error::{ConfigError, CoreError, DatabaseError, PactError, Result, ValidationError};
pub use identity::{Caller, IdentityProvider, StaticIdentity, UserId};
pub use ledger::{Session, SessionMode};
pub use pact::{Pact, PactDailyProgress, PactParticipant, PactRole, PactStatus};
pub use stats::{FitnessPoint, FocusStats, StatsAggregator};
pub use storage::{Config, Database};
pub use tasks::{DeferredTask, TaskQueue};
pub use users::{Privacy, User};
