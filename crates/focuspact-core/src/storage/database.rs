//! SQLite-backed persistence for the session ledger and derived tables.
//!
//! The `sessions` table is the append-only source of truth. Everything
//! else (`challenge_completions`, `pact_daily_progress`, pact status) is
//! derived state maintained by idempotent recomputation; the schema keeps
//! no counters that could drift from the ledger.
//!
//! Status changes on pacts go through compare-and-set updates keyed on the
//! current status, so concurrent evaluations of the same pact converge
//! instead of clobbering a terminal state.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use indoc::indoc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::data_dir;
use crate::challenge::{ChallengeCompletion, ChallengeDefinition, ChallengeKind};
use crate::error::DatabaseError;
use crate::identity::UserId;
use crate::ledger::{Session, SessionMode};
use crate::pact::{Pact, PactDailyProgress, PactParticipant, PactRole, PactStatus};
use crate::users::{Privacy, User};

// === Helper functions ===

/// Format a timestamp for storage. Fixed-width millisecond RFC3339 so that
/// lexicographic comparison in SQL matches chronological order.
fn fmt_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp, falling back to now on corruption.
fn parse_ts_fallback(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Format a calendar date for storage (`YYYY-MM-DD`).
fn fmt_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap_or_default()
}

/// Build a Session from a row in column order
/// `id, user_id, mode, duration_seconds, tag, tag_private, completed_at`.
fn row_to_session(row: &rusqlite::Row) -> Result<Session, rusqlite::Error> {
    let mode_str: String = row.get(2)?;
    let completed_at_str: String = row.get(6)?;
    Ok(Session {
        id: parse_uuid(&row.get::<_, String>(0)?),
        user_id: row.get(1)?,
        mode: SessionMode::parse(&mode_str).unwrap_or(SessionMode::Focus),
        duration_seconds: row.get(3)?,
        tag: row.get(4)?,
        tag_private: row.get(5)?,
        completed_at: parse_ts_fallback(&completed_at_str),
    })
}

/// Build a Pact from a row in column order
/// `id, creator_id, join_code, start_date, end_date, required_pomos_per_day,
///  status, failed_on_date, failed_by_user_id, created_at`.
fn row_to_pact(row: &rusqlite::Row) -> Result<Pact, rusqlite::Error> {
    let status_str: String = row.get(6)?;
    let start_str: String = row.get(3)?;
    let end_str: String = row.get(4)?;
    let failed_on: Option<String> = row.get(7)?;
    let created_at_str: String = row.get(9)?;
    Ok(Pact {
        id: parse_uuid(&row.get::<_, String>(0)?),
        creator_id: row.get(1)?,
        join_code: row.get(2)?,
        start_date: parse_date(&start_str).unwrap_or_default(),
        end_date: parse_date(&end_str).unwrap_or_default(),
        required_pomos_per_day: row.get(5)?,
        status: PactStatus::parse(&status_str).unwrap_or(PactStatus::Pending),
        failed_on_date: failed_on.as_deref().and_then(parse_date),
        failed_by_user_id: row.get(8)?,
        created_at: parse_ts_fallback(&created_at_str),
    })
}

fn row_to_participant(row: &rusqlite::Row) -> Result<PactParticipant, rusqlite::Error> {
    let role_str: String = row.get(2)?;
    let joined_at_str: String = row.get(3)?;
    Ok(PactParticipant {
        pact_id: parse_uuid(&row.get::<_, String>(0)?),
        user_id: row.get(1)?,
        role: PactRole::parse(&role_str).unwrap_or(PactRole::Participant),
        joined_at: parse_ts_fallback(&joined_at_str),
    })
}

fn row_to_progress(row: &rusqlite::Row) -> Result<PactDailyProgress, rusqlite::Error> {
    let date_str: String = row.get(2)?;
    Ok(PactDailyProgress {
        pact_id: parse_uuid(&row.get::<_, String>(0)?),
        user_id: row.get(1)?,
        date: parse_date(&date_str).unwrap_or_default(),
        pomos_completed: row.get(3)?,
        completed: row.get(4)?,
    })
}

fn row_to_user(row: &rusqlite::Row) -> Result<User, rusqlite::Error> {
    let privacy_str: String = row.get(4)?;
    Ok(User {
        id: row.get(0)?,
        identity_ref: row.get(1)?,
        username: row.get(2)?,
        best_daily_streak: row.get(3)?,
        privacy: Privacy::parse(&privacy_str).unwrap_or(Privacy::Public),
    })
}

fn row_to_definition(row: &rusqlite::Row) -> Result<ChallengeDefinition, rusqlite::Error> {
    let kind_json: String = row.get(1)?;
    let kind: ChallengeKind =
        serde_json::from_str(&kind_json).unwrap_or(ChallengeKind::Total);
    Ok(ChallengeDefinition {
        id: row.get(0)?,
        kind,
        target: row.get(2)?,
        active: row.get(3)?,
    })
}

fn row_to_completion(row: &rusqlite::Row) -> Result<ChallengeCompletion, rusqlite::Error> {
    let completed_at: Option<String> = row.get(3)?;
    Ok(ChallengeCompletion {
        user_id: row.get(0)?,
        challenge_id: row.get(1)?,
        completed: row.get(2)?,
        completed_at: completed_at.as_deref().map(parse_ts_fallback),
    })
}

/// SQLite database for the ledger and derived tables.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/focuspact/focuspact.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, DatabaseError> {
        let path = data_dir()
            .map_err(|e| DatabaseError::OpenFailed {
                path: std::path::PathBuf::from("~/.config/focuspact"),
                source: rusqlite::Error::InvalidPath(e.to_string().into()),
            })?
            .join("focuspact.db");
        let conn = Connection::open(&path)
            .map_err(|source| DatabaseError::OpenFailed { path, source })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::from)?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(indoc! {"
                CREATE TABLE IF NOT EXISTS users (
                    id                TEXT PRIMARY KEY,
                    identity_ref      TEXT NOT NULL,
                    username          TEXT NOT NULL,
                    best_daily_streak INTEGER NOT NULL DEFAULT 0,
                    privacy           TEXT NOT NULL DEFAULT 'public'
                );

                CREATE TABLE IF NOT EXISTS sessions (
                    id               TEXT PRIMARY KEY,
                    user_id          TEXT NOT NULL,
                    mode             TEXT NOT NULL,
                    duration_seconds INTEGER NOT NULL,
                    tag              TEXT,
                    tag_private      INTEGER NOT NULL DEFAULT 0,
                    completed_at     TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS challenge_definitions (
                    id     TEXT PRIMARY KEY,
                    kind   TEXT NOT NULL,
                    target INTEGER NOT NULL,
                    active INTEGER NOT NULL DEFAULT 1
                );

                CREATE TABLE IF NOT EXISTS challenge_completions (
                    user_id      TEXT NOT NULL,
                    challenge_id TEXT NOT NULL,
                    completed    INTEGER NOT NULL DEFAULT 0,
                    completed_at TEXT,
                    PRIMARY KEY (user_id, challenge_id)
                );

                CREATE TABLE IF NOT EXISTS pacts (
                    id                     TEXT PRIMARY KEY,
                    creator_id             TEXT NOT NULL,
                    join_code              TEXT NOT NULL UNIQUE,
                    start_date             TEXT NOT NULL,
                    end_date               TEXT NOT NULL,
                    required_pomos_per_day INTEGER NOT NULL,
                    status                 TEXT NOT NULL DEFAULT 'pending',
                    failed_on_date         TEXT,
                    failed_by_user_id      TEXT,
                    created_at             TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS pact_participants (
                    pact_id   TEXT NOT NULL,
                    user_id   TEXT NOT NULL,
                    role      TEXT NOT NULL,
                    joined_at TEXT NOT NULL,
                    PRIMARY KEY (pact_id, user_id)
                );

                CREATE TABLE IF NOT EXISTS pact_daily_progress (
                    pact_id         TEXT NOT NULL,
                    user_id         TEXT NOT NULL,
                    date            TEXT NOT NULL,
                    pomos_completed INTEGER NOT NULL,
                    completed       INTEGER NOT NULL,
                    PRIMARY KEY (pact_id, user_id, date)
                );

                CREATE INDEX IF NOT EXISTS idx_sessions_user_completed
                    ON sessions(user_id, completed_at);
                CREATE INDEX IF NOT EXISTS idx_sessions_user_mode
                    ON sessions(user_id, mode, completed_at);
                CREATE INDEX IF NOT EXISTS idx_participants_user
                    ON pact_participants(user_id);
            "})
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    // === Users ===

    /// Insert or refresh a user record. The `best_daily_streak` high-water
    /// mark is preserved on conflict.
    pub fn upsert_user(&self, user: &User) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO users (id, identity_ref, username, best_daily_streak, privacy)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 identity_ref = excluded.identity_ref,
                 username = excluded.username,
                 privacy = excluded.privacy",
            params![
                user.id,
                user.identity_ref,
                user.username,
                user.best_daily_streak,
                user.privacy.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn get_user(&self, id: &str) -> Result<Option<User>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT id, identity_ref, username, best_daily_streak, privacy
                 FROM users WHERE id = ?1",
                params![id],
                row_to_user,
            )
            .optional()
    }

    /// Raise the streak high-water mark. MAX() in SQL keeps it monotonic no
    /// matter what candidate value races in.
    pub fn raise_best_streak(&self, user_id: &str, candidate: u32) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "UPDATE users SET best_daily_streak = MAX(best_daily_streak, ?2) WHERE id = ?1",
            params![user_id, candidate],
        )?;
        Ok(())
    }

    // === Session ledger ===

    pub fn insert_session(&self, session: &Session) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO sessions (id, user_id, mode, duration_seconds, tag, tag_private, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                session.id.to_string(),
                session.user_id,
                session.mode.as_str(),
                session.duration_seconds,
                session.tag,
                session.tag_private,
                fmt_ts(session.completed_at),
            ],
        )?;
        Ok(())
    }

    /// The ingestion-guard probe: an existing session for the same user
    /// with the same mode and duration whose `completed_at` lies within
    /// the symmetric window around the candidate timestamp.
    pub fn find_duplicate_session(
        &self,
        user_id: &str,
        mode: SessionMode,
        duration_seconds: u32,
        completed_at: DateTime<Utc>,
        window_ms: i64,
    ) -> Result<Option<Uuid>, rusqlite::Error> {
        let lo = completed_at - chrono::Duration::milliseconds(window_ms);
        let hi = completed_at + chrono::Duration::milliseconds(window_ms);
        self.conn
            .query_row(
                "SELECT id FROM sessions
                 WHERE user_id = ?1 AND mode = ?2 AND duration_seconds = ?3
                   AND completed_at >= ?4 AND completed_at <= ?5
                 ORDER BY completed_at ASC
                 LIMIT 1",
                params![user_id, mode.as_str(), duration_seconds, fmt_ts(lo), fmt_ts(hi)],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map(|opt| opt.map(|s| parse_uuid(&s)))
    }

    pub fn get_session(&self, id: Uuid) -> Result<Option<Session>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT id, user_id, mode, duration_seconds, tag, tag_private, completed_at
                 FROM sessions WHERE id = ?1",
                params![id.to_string()],
                row_to_session,
            )
            .optional()
    }

    pub fn sessions_for_user(&self, user_id: &str) -> Result<Vec<Session>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, mode, duration_seconds, tag, tag_private, completed_at
             FROM sessions WHERE user_id = ?1
             ORDER BY completed_at ASC",
        )?;
        let rows = stmt.query_map(params![user_id], row_to_session)?;
        rows.collect()
    }

    /// Completion times of every focus session for a user, ascending.
    /// The stats aggregator's entire input.
    pub fn focus_times(&self, user_id: &str) -> Result<Vec<DateTime<Utc>>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT completed_at FROM sessions
             WHERE user_id = ?1 AND mode = 'focus'
             ORDER BY completed_at ASC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| row.get::<_, String>(0))?;
        let mut times = Vec::new();
        for row in rows {
            times.push(parse_ts_fallback(&row?));
        }
        Ok(times)
    }

    /// Focus sessions completed by a user within one calendar date (UTC).
    pub fn count_focus_on_date(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<u32, rusqlite::Error> {
        let start = date.and_time(chrono::NaiveTime::MIN).and_utc();
        let end = start + chrono::Duration::days(1);
        self.conn.query_row(
            "SELECT COUNT(*) FROM sessions
             WHERE user_id = ?1 AND mode = 'focus'
               AND completed_at >= ?2 AND completed_at < ?3",
            params![user_id, fmt_ts(start), fmt_ts(end)],
            |row| row.get(0),
        )
    }

    /// Patch the tag fields of a session. The only post-creation mutation
    /// the ledger allows.
    pub fn update_session_tag(
        &self,
        id: Uuid,
        tag: Option<&str>,
        tag_private: bool,
    ) -> Result<bool, rusqlite::Error> {
        let n = self.conn.execute(
            "UPDATE sessions SET tag = ?2, tag_private = ?3 WHERE id = ?1",
            params![id.to_string(), tag, tag_private],
        )?;
        Ok(n == 1)
    }

    // === Challenge catalog ===

    pub fn upsert_definition(&self, def: &ChallengeDefinition) -> Result<(), rusqlite::Error> {
        let kind_json = serde_json::to_string(&def.kind)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        self.conn.execute(
            "INSERT INTO challenge_definitions (id, kind, target, active)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                 kind = excluded.kind,
                 target = excluded.target,
                 active = excluded.active",
            params![def.id, kind_json, def.target, def.active],
        )?;
        Ok(())
    }

    /// Insert a definition only if no row with that id exists. Used for the
    /// singleton team badge.
    pub fn insert_definition_if_absent(
        &self,
        def: &ChallengeDefinition,
    ) -> Result<(), rusqlite::Error> {
        let kind_json = serde_json::to_string(&def.kind)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        self.conn.execute(
            "INSERT OR IGNORE INTO challenge_definitions (id, kind, target, active)
             VALUES (?1, ?2, ?3, ?4)",
            params![def.id, kind_json, def.target, def.active],
        )?;
        Ok(())
    }

    pub fn get_definition(
        &self,
        id: &str,
    ) -> Result<Option<ChallengeDefinition>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT id, kind, target, active FROM challenge_definitions WHERE id = ?1",
                params![id],
                row_to_definition,
            )
            .optional()
    }

    pub fn active_definitions(&self) -> Result<Vec<ChallengeDefinition>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, target, active FROM challenge_definitions
             WHERE active = 1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], row_to_definition)?;
        rows.collect()
    }

    pub fn set_definition_active(&self, id: &str, active: bool) -> Result<bool, rusqlite::Error> {
        let n = self.conn.execute(
            "UPDATE challenge_definitions SET active = ?2 WHERE id = ?1",
            params![id, active],
        )?;
        Ok(n == 1)
    }

    pub fn get_completion(
        &self,
        user_id: &str,
        challenge_id: &str,
    ) -> Result<Option<ChallengeCompletion>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT user_id, challenge_id, completed, completed_at
                 FROM challenge_completions
                 WHERE user_id = ?1 AND challenge_id = ?2",
                params![user_id, challenge_id],
                row_to_completion,
            )
            .optional()
    }

    pub fn completions_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<ChallengeCompletion>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, challenge_id, completed, completed_at
             FROM challenge_completions WHERE user_id = ?1
             ORDER BY challenge_id ASC",
        )?;
        let rows = stmt.query_map(params![user_id], row_to_completion)?;
        rows.collect()
    }

    /// Monotonic completion upsert: creates the row completed, or flips an
    /// incomplete row to completed stamping `completed_at` exactly once.
    /// Rows that are already completed are never touched, so redundant or
    /// concurrent evaluations converge on the same end state.
    pub fn complete_challenge(
        &self,
        user_id: &str,
        challenge_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO challenge_completions (user_id, challenge_id, completed, completed_at)
             VALUES (?1, ?2, 1, ?3)
             ON CONFLICT(user_id, challenge_id) DO UPDATE SET
                 completed = 1,
                 completed_at = COALESCE(challenge_completions.completed_at, excluded.completed_at)
             WHERE challenge_completions.completed = 0",
            params![user_id, challenge_id, fmt_ts(now)],
        )?;
        Ok(())
    }

    // === Pacts ===

    /// Insert a pact together with its creator membership, atomically.
    pub fn create_pact(
        &self,
        pact: &Pact,
        creator_joined_at: DateTime<Utc>,
    ) -> Result<(), rusqlite::Error> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO pacts (id, creator_id, join_code, start_date, end_date,
                                required_pomos_per_day, status, failed_on_date,
                                failed_by_user_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, NULL, ?8)",
            params![
                pact.id.to_string(),
                pact.creator_id,
                pact.join_code,
                fmt_date(pact.start_date),
                fmt_date(pact.end_date),
                pact.required_pomos_per_day,
                pact.status.as_str(),
                fmt_ts(pact.created_at),
            ],
        )?;
        tx.execute(
            "INSERT INTO pact_participants (pact_id, user_id, role, joined_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                pact.id.to_string(),
                pact.creator_id,
                PactRole::Creator.as_str(),
                fmt_ts(creator_joined_at),
            ],
        )?;
        tx.commit()
    }

    pub fn get_pact(&self, id: Uuid) -> Result<Option<Pact>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT id, creator_id, join_code, start_date, end_date,
                        required_pomos_per_day, status, failed_on_date,
                        failed_by_user_id, created_at
                 FROM pacts WHERE id = ?1",
                params![id.to_string()],
                row_to_pact,
            )
            .optional()
    }

    pub fn pact_by_join_code(&self, code: &str) -> Result<Option<Pact>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT id, creator_id, join_code, start_date, end_date,
                        required_pomos_per_day, status, failed_on_date,
                        failed_by_user_id, created_at
                 FROM pacts WHERE join_code = ?1",
                params![code],
                row_to_pact,
            )
            .optional()
    }

    pub fn join_code_exists(&self, code: &str) -> Result<bool, rusqlite::Error> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pacts WHERE join_code = ?1",
            params![code],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Rewrite the pact's terms. Only valid while pending; the engine
    /// enforces that before calling.
    pub fn update_pact_terms(
        &self,
        id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
        required_pomos_per_day: u32,
    ) -> Result<bool, rusqlite::Error> {
        let n = self.conn.execute(
            "UPDATE pacts
             SET start_date = ?2, end_date = ?3, required_pomos_per_day = ?4
             WHERE id = ?1 AND status = 'pending'",
            params![
                id.to_string(),
                fmt_date(start_date),
                fmt_date(end_date),
                required_pomos_per_day,
            ],
        )?;
        Ok(n == 1)
    }

    /// Compare-and-set status change. Returns false when the pact was not
    /// in `from` anymore, which callers treat as "someone else got there
    /// first".
    pub fn cas_pact_status(
        &self,
        id: Uuid,
        from: PactStatus,
        to: PactStatus,
    ) -> Result<bool, rusqlite::Error> {
        let n = self.conn.execute(
            "UPDATE pacts SET status = ?3 WHERE id = ?1 AND status = ?2",
            params![id.to_string(), from.as_str(), to.as_str()],
        )?;
        Ok(n == 1)
    }

    /// Compare-and-set failure, recording the first offending (date, user).
    pub fn cas_pact_failed(
        &self,
        id: Uuid,
        date: NaiveDate,
        user_id: &str,
    ) -> Result<bool, rusqlite::Error> {
        let n = self.conn.execute(
            "UPDATE pacts
             SET status = 'failed', failed_on_date = ?2, failed_by_user_id = ?3
             WHERE id = ?1 AND status = 'active'",
            params![id.to_string(), fmt_date(date), user_id],
        )?;
        Ok(n == 1)
    }

    /// Remove a pending pact entirely (creator walked away before start).
    pub fn delete_pact(&self, id: Uuid) -> Result<(), rusqlite::Error> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM pact_daily_progress WHERE pact_id = ?1",
            params![id.to_string()],
        )?;
        tx.execute(
            "DELETE FROM pact_participants WHERE pact_id = ?1",
            params![id.to_string()],
        )?;
        tx.execute("DELETE FROM pacts WHERE id = ?1", params![id.to_string()])?;
        tx.commit()
    }

    // === Pact membership ===

    pub fn add_participant(&self, p: &PactParticipant) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO pact_participants (pact_id, user_id, role, joined_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                p.pact_id.to_string(),
                p.user_id,
                p.role.as_str(),
                fmt_ts(p.joined_at),
            ],
        )?;
        Ok(())
    }

    pub fn remove_participant(&self, pact_id: Uuid, user_id: &str) -> Result<bool, rusqlite::Error> {
        let n = self.conn.execute(
            "DELETE FROM pact_participants WHERE pact_id = ?1 AND user_id = ?2",
            params![pact_id.to_string(), user_id],
        )?;
        Ok(n == 1)
    }

    /// Participants in join order. Rowid breaks ties for members joining
    /// within the same millisecond, keeping the fail-fast scan order
    /// deterministic.
    pub fn participants(&self, pact_id: Uuid) -> Result<Vec<PactParticipant>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT pact_id, user_id, role, joined_at FROM pact_participants
             WHERE pact_id = ?1
             ORDER BY joined_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map(params![pact_id.to_string()], row_to_participant)?;
        rows.collect()
    }

    pub fn is_participant(&self, pact_id: Uuid, user_id: &str) -> Result<bool, rusqlite::Error> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pact_participants WHERE pact_id = ?1 AND user_id = ?2",
            params![pact_id.to_string(), user_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// All pacts a user belongs to, newest first.
    pub fn pacts_for_user(&self, user_id: &str) -> Result<Vec<Pact>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT p.id, p.creator_id, p.join_code, p.start_date, p.end_date,
                    p.required_pomos_per_day, p.status, p.failed_on_date,
                    p.failed_by_user_id, p.created_at
             FROM pacts p
             JOIN pact_participants pp ON pp.pact_id = p.id
             WHERE pp.user_id = ?1
             ORDER BY p.created_at DESC",
        )?;
        let rows = stmt.query_map(params![user_id], row_to_pact)?;
        rows.collect()
    }

    /// Pacts still pending or active: the reconciliation sweep's worklist.
    pub fn non_terminal_pacts(&self) -> Result<Vec<Pact>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, creator_id, join_code, start_date, end_date,
                    required_pomos_per_day, status, failed_on_date,
                    failed_by_user_id, created_at
             FROM pacts WHERE status IN ('pending', 'active')
             ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map([], row_to_pact)?;
        rows.collect()
    }

    // === Pact daily progress ===

    /// Replace one (pact, user, date) cell with freshly recomputed values.
    pub fn upsert_daily_progress(&self, p: &PactDailyProgress) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO pact_daily_progress
                 (pact_id, user_id, date, pomos_completed, completed)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                p.pact_id.to_string(),
                p.user_id,
                fmt_date(p.date),
                p.pomos_completed,
                p.completed,
            ],
        )?;
        Ok(())
    }

    pub fn progress_for_pact(
        &self,
        pact_id: Uuid,
    ) -> Result<Vec<PactDailyProgress>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT pact_id, user_id, date, pomos_completed, completed
             FROM pact_daily_progress WHERE pact_id = ?1
             ORDER BY date ASC, user_id ASC",
        )?;
        let rows = stmt.query_map(params![pact_id.to_string()], row_to_progress)?;
        rows.collect()
    }
}
