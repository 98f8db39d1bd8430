//! The engine: every operation the product surface calls into.
//!
//! Mutations are synchronous and transactional; derived-state maintenance
//! (challenge evaluation, pact progress, pact transitions) runs as
//! deferred tasks enqueued after a session write, and is additionally
//! re-derived by the reconciliation sweep, so a lost task never leaves
//! state permanently stale.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::badge;
use crate::challenge::{ChallengeDefinition, ChallengeProgress};
use crate::error::{CoreError, PactError, Result, ValidationError};
use crate::identity::{Caller, UserId};
use crate::ledger::{Session, SessionMode, DEDUP_WINDOW_MS};
use crate::pact::{
    evaluate_transition, generate_join_code, Pact, PactDailyProgress, PactParticipant,
    PactRole, PactStatus, PactTransition,
};
use crate::stats::{FocusStats, StatsAggregator};
use crate::storage::{Config, Database};
use crate::tasks::{DeferredTask, TaskQueue};
use crate::users::User;

/// Everything a participant sees about one pact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PactOverview {
    pub pact: Pact,
    pub participants: Vec<PactParticipant>,
    pub progress: Vec<PactDailyProgress>,
}

/// Outcome tally of one reconciliation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSummary {
    pub examined: usize,
    pub activated: usize,
    pub failed: usize,
    pub completed: usize,
}

/// The derived-state engine over one database.
pub struct Engine {
    db: Database,
    config: Config,
    aggregator: StatsAggregator,
    queue: TaskQueue,
}

impl Engine {
    pub fn new(db: Database, config: Config) -> Self {
        let aggregator = StatsAggregator::new(config.fitness.clone());
        Self {
            db,
            config,
            aggregator,
            queue: TaskQueue::new(),
        }
    }

    /// Open the engine over the on-disk database and config.
    pub fn open() -> Result<Self> {
        let db = Database::open()?;
        let config = Config::load_or_default();
        Ok(Self::new(db, config))
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Number of deferred tasks waiting to run.
    pub fn pending_tasks(&self) -> usize {
        self.queue.len()
    }

    // === Users ===

    /// Create or refresh a user record from the identity collaborator.
    pub fn register_user(&self, user: &User) -> Result<()> {
        self.db.upsert_user(user)?;
        Ok(())
    }

    // === Session ledger ===

    /// Record a completed session.
    ///
    /// Resubmission of the same (user, mode, duration) within the 1000 ms
    /// dedup window returns the existing id without inserting or
    /// scheduling downstream work. Focus sessions enqueue the challenge
    /// evaluator and the pact progress refresh; break sessions touch
    /// nothing downstream.
    pub fn record_session(
        &mut self,
        caller: &Caller,
        mode: SessionMode,
        duration_seconds: u32,
        completed_at: DateTime<Utc>,
        tag: Option<String>,
    ) -> Result<Uuid> {
        let user_id = caller.user_id().ok_or(CoreError::Unauthenticated)?;
        self.db.get_user(user_id)?.ok_or_else(|| CoreError::NotFound {
            entity: "user",
            id: user_id.to_string(),
        })?;

        let max = self.config.limits.max_session_secs;
        if duration_seconds == 0 || duration_seconds > max {
            return Err(ValidationError::DurationOutOfRange {
                seconds: duration_seconds,
                max,
            }
            .into());
        }
        let skew = chrono::Duration::seconds(self.config.limits.clock_skew_secs as i64);
        if completed_at > Utc::now() + skew {
            return Err(ValidationError::CompletedInFuture { completed_at }.into());
        }

        if let Some(existing) = self.db.find_duplicate_session(
            user_id,
            mode,
            duration_seconds,
            completed_at,
            DEDUP_WINDOW_MS,
        )? {
            log::debug!("duplicate session submission absorbed: user={user_id} id={existing}");
            return Ok(existing);
        }

        let session = Session::new(
            user_id.to_string(),
            mode,
            duration_seconds,
            completed_at,
            tag,
        );
        self.db.insert_session(&session)?;
        log::info!(
            "session recorded: user={user_id} mode={mode} duration={duration_seconds}s id={}",
            session.id
        );

        if mode == SessionMode::Focus {
            self.queue.enqueue(DeferredTask::EvaluateChallenges {
                user_id: user_id.to_string(),
            });
            self.queue.enqueue(DeferredTask::RefreshPactProgress {
                user_id: user_id.to_string(),
                date: completed_at.date_naive(),
            });
        }
        Ok(session.id)
    }

    /// Patch the tag fields of an owned session.
    pub fn update_session_tag(
        &self,
        caller: &Caller,
        session_id: Uuid,
        tag: Option<String>,
        tag_private: bool,
    ) -> Result<()> {
        let user_id = caller.user_id().ok_or(CoreError::Unauthenticated)?;
        let session = self.db.get_session(session_id)?.ok_or_else(|| CoreError::NotFound {
            entity: "session",
            id: session_id.to_string(),
        })?;
        if session.user_id != user_id {
            return Err(CoreError::NotAuthorized);
        }
        self.db
            .update_session_tag(session_id, tag.as_deref(), tag_private)?;
        Ok(())
    }

    /// A user's own sessions, oldest first. Anonymous callers get an
    /// empty list.
    pub fn sessions(&self, caller: &Caller) -> Result<Vec<Session>> {
        match caller.user_id() {
            None => Ok(Vec::new()),
            Some(user_id) => Ok(self.db.sessions_for_user(user_id)?),
        }
    }

    // === Stats ===

    /// Compute stats as of `as_of`. Anonymous callers get a zeroed
    /// result, never an error.
    ///
    /// As a side effect the streak high-water mark is raised when the
    /// freshly computed best exceeds it.
    pub fn stats(&self, caller: &Caller, as_of: DateTime<Utc>) -> Result<FocusStats> {
        let Some(user_id) = caller.user_id() else {
            return Ok(FocusStats::default());
        };
        let stored = self
            .db
            .get_user(user_id)?
            .map(|u| u.best_daily_streak)
            .unwrap_or(0);
        let times = self.db.focus_times(user_id)?;
        let stats = self.aggregator.compute(&times, as_of, stored);
        self.db.raise_best_streak(user_id, stats.best_streak)?;
        Ok(stats)
    }

    // === Challenges ===

    /// Add or replace a catalog entry. Requires the caller's identity_ref
    /// to be on the admin allow-list.
    pub fn define_challenge(&self, caller: &Caller, def: ChallengeDefinition) -> Result<()> {
        self.require_admin(caller)?;
        if def.target == 0 {
            return Err(ValidationError::ZeroTarget.into());
        }
        self.db.upsert_definition(&def)?;
        Ok(())
    }

    /// Toggle a catalog entry. Admin only.
    pub fn set_challenge_active(&self, caller: &Caller, id: &str, active: bool) -> Result<()> {
        self.require_admin(caller)?;
        if !self.db.set_definition_active(id, active)? {
            return Err(CoreError::NotFound {
                entity: "challenge",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn require_admin(&self, caller: &Caller) -> Result<()> {
        let user_id = caller.user_id().ok_or(CoreError::Unauthenticated)?;
        let user = self.db.get_user(user_id)?.ok_or_else(|| CoreError::NotFound {
            entity: "user",
            id: user_id.to_string(),
        })?;
        if !self.config.is_admin(&user.identity_ref) {
            return Err(CoreError::NotAuthorized);
        }
        Ok(())
    }

    /// Live progress against every active challenge. Anonymous callers
    /// get an empty list.
    pub fn challenge_progress(
        &self,
        caller: &Caller,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<ChallengeProgress>> {
        let Some(user_id) = caller.user_id() else {
            return Ok(Vec::new());
        };
        let stats = self.stats(caller, as_of)?;
        let mut out = Vec::new();
        for def in self.db.active_definitions()? {
            let completion = self.db.get_completion(user_id, &def.id)?;
            out.push(ChallengeProgress {
                progress: def.kind.progress(&stats, as_of),
                completed: completion.as_ref().map(|c| c.completed).unwrap_or(false),
                completed_at: completion.and_then(|c| c.completed_at),
                definition: def,
            });
        }
        Ok(out)
    }

    /// Re-run the evaluator for one user: any active challenge whose
    /// target the live stats now meet is completed, one-way.
    ///
    /// Safe to invoke redundantly and concurrently; the completion upsert
    /// is monotonic, so the end state is the same regardless of order or
    /// repetition.
    pub fn evaluate_challenges(&self, user_id: &str, as_of: DateTime<Utc>) -> Result<()> {
        let stored = self
            .db
            .get_user(user_id)?
            .map(|u| u.best_daily_streak)
            .unwrap_or(0);
        let times = self.db.focus_times(user_id)?;
        let stats = self.aggregator.compute(&times, as_of, stored);
        self.db.raise_best_streak(user_id, stats.best_streak)?;

        for def in self.db.active_definitions()? {
            if def.satisfied_by(&stats, as_of) {
                self.db.complete_challenge(user_id, &def.id, as_of)?;
            }
        }
        Ok(())
    }

    // === Pacts ===

    /// Create a pact starting today or later. The creator is its first
    /// participant.
    pub fn create_pact(
        &self,
        caller: &Caller,
        start_date: NaiveDate,
        end_date: NaiveDate,
        required_pomos_per_day: u32,
        now: DateTime<Utc>,
    ) -> Result<Pact> {
        let user_id = caller.user_id().ok_or(CoreError::Unauthenticated)?;
        self.db.get_user(user_id)?.ok_or_else(|| CoreError::NotFound {
            entity: "user",
            id: user_id.to_string(),
        })?;
        self.validate_pact_terms(start_date, end_date, required_pomos_per_day, now)?;

        let mut rng = rand::thread_rng();
        let mut join_code = generate_join_code(&mut rng);
        while self.db.join_code_exists(&join_code)? {
            join_code = generate_join_code(&mut rng);
        }

        let pact = Pact {
            id: Uuid::new_v4(),
            creator_id: user_id.to_string(),
            join_code,
            start_date,
            end_date,
            required_pomos_per_day,
            status: PactStatus::Pending,
            failed_on_date: None,
            failed_by_user_id: None,
            created_at: now,
        };
        self.db.create_pact(&pact, now)?;
        log::info!(
            "pact created: id={} creator={user_id} {start_date}..{end_date} quota={required_pomos_per_day}",
            pact.id
        );
        Ok(pact)
    }

    fn validate_pact_terms(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
        required_pomos_per_day: u32,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let today = now.date_naive();
        if start_date < today {
            return Err(ValidationError::StartInPast {
                start: start_date,
                today,
            }
            .into());
        }
        if end_date < start_date {
            return Err(ValidationError::InvalidDateRange {
                start: start_date,
                end: end_date,
            }
            .into());
        }
        let days = (end_date - start_date).num_days() as u32 + 1;
        if days > self.config.limits.max_pact_days {
            return Err(ValidationError::PactTooLong {
                days,
                max: self.config.limits.max_pact_days,
            }
            .into());
        }
        let max_quota = self.config.limits.max_pomos_per_day;
        if required_pomos_per_day == 0 || required_pomos_per_day > max_quota {
            return Err(ValidationError::QuotaOutOfRange {
                quota: required_pomos_per_day,
                max: max_quota,
            }
            .into());
        }
        Ok(())
    }

    /// Join a pact by invite code. Only possible while the pact is still
    /// pending and its start date has not passed.
    pub fn join_pact(&self, caller: &Caller, join_code: &str, now: DateTime<Utc>) -> Result<Pact> {
        let user_id = caller.user_id().ok_or(CoreError::Unauthenticated)?;
        self.db.get_user(user_id)?.ok_or_else(|| CoreError::NotFound {
            entity: "user",
            id: user_id.to_string(),
        })?;
        let pact = self
            .db
            .pact_by_join_code(join_code)?
            .ok_or_else(|| CoreError::NotFound {
                entity: "pact",
                id: join_code.to_string(),
            })?;

        if pact.status != PactStatus::Pending {
            return Err(PactError::JoinClosed {
                status: pact.status,
            }
            .into());
        }
        if now.date_naive() > pact.start_date {
            return Err(PactError::JoinWindowPassed {
                start: pact.start_date,
            }
            .into());
        }
        if self.db.is_participant(pact.id, user_id)? {
            return Err(PactError::AlreadyJoined.into());
        }

        self.db.add_participant(&PactParticipant {
            pact_id: pact.id,
            user_id: user_id.to_string(),
            role: PactRole::Participant,
            joined_at: now,
        })?;
        log::info!("pact joined: id={} user={user_id}", pact.id);
        Ok(pact)
    }

    /// Leave a pact while it is still pending. The creator leaving
    /// dissolves the pact entirely.
    pub fn leave_pact(&self, caller: &Caller, pact_id: Uuid) -> Result<()> {
        let user_id = caller.user_id().ok_or(CoreError::Unauthenticated)?;
        let pact = self.require_pact(pact_id)?;

        if pact.status != PactStatus::Pending {
            return Err(PactError::LeaveClosed {
                status: pact.status,
            }
            .into());
        }
        if !self.db.is_participant(pact_id, user_id)? {
            return Err(PactError::NotAParticipant.into());
        }

        if pact.creator_id == user_id {
            self.db.delete_pact(pact_id)?;
            log::info!("pending pact dissolved by creator: id={pact_id}");
        } else {
            self.db.remove_participant(pact_id, user_id)?;
            log::info!("pact left: id={pact_id} user={user_id}");
        }
        Ok(())
    }

    /// Rewrite a pact's terms before it starts. Creator only.
    pub fn update_pact(
        &self,
        caller: &Caller,
        pact_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
        required_pomos_per_day: u32,
        now: DateTime<Utc>,
    ) -> Result<Pact> {
        let user_id = caller.user_id().ok_or(CoreError::Unauthenticated)?;
        let pact = self.require_pact(pact_id)?;

        if pact.creator_id != user_id {
            return Err(PactError::NotCreator.into());
        }
        if pact.status != PactStatus::Pending || now.date_naive() > pact.start_date {
            return Err(PactError::NotEditable {
                status: pact.status,
            }
            .into());
        }
        self.validate_pact_terms(start_date, end_date, required_pomos_per_day, now)?;
        // The update is itself conditioned on `pending`, so a racing
        // activation turns this into an error rather than a silent write.
        if !self
            .db
            .update_pact_terms(pact_id, start_date, end_date, required_pomos_per_day)?
        {
            return Err(PactError::NotEditable {
                status: pact.status,
            }
            .into());
        }
        self.require_pact(pact_id)
    }

    /// A participant's view of one pact, or None for anonymous callers
    /// and non-members.
    pub fn pact_overview(&self, caller: &Caller, pact_id: Uuid) -> Result<Option<PactOverview>> {
        let Some(user_id) = caller.user_id() else {
            return Ok(None);
        };
        let Some(pact) = self.db.get_pact(pact_id)? else {
            return Ok(None);
        };
        if !self.db.is_participant(pact_id, user_id)? {
            return Ok(None);
        }
        Ok(Some(PactOverview {
            pact,
            participants: self.db.participants(pact_id)?,
            progress: self.db.progress_for_pact(pact_id)?,
        }))
    }

    /// All pacts the caller belongs to, newest first.
    pub fn my_pacts(&self, caller: &Caller) -> Result<Vec<Pact>> {
        match caller.user_id() {
            None => Ok(Vec::new()),
            Some(user_id) => Ok(self.db.pacts_for_user(user_id)?),
        }
    }

    fn require_pact(&self, pact_id: Uuid) -> Result<Pact> {
        self.db.get_pact(pact_id)?.ok_or_else(|| CoreError::NotFound {
            entity: "pact",
            id: pact_id.to_string(),
        })
    }

    // === Derived-state maintenance ===

    /// Recompute the (pact, user, date) progress cells touched by a
    /// session on `date`, then re-check each affected pact's transitions.
    pub fn refresh_pact_progress(
        &self,
        user_id: &str,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<()> {
        for pact in self.db.pacts_for_user(user_id)? {
            if pact.status.is_terminal() || !pact.contains(date) {
                continue;
            }
            self.recompute_cell(&pact, user_id, date)?;
            self.check_transitions(pact.id, today)?;
        }
        Ok(())
    }

    /// Re-derive one progress cell from the ledger. Never incremented, so
    /// retried and out-of-order session writes cannot skew it.
    fn recompute_cell(&self, pact: &Pact, user_id: &str, date: NaiveDate) -> Result<()> {
        let pomos = self.db.count_focus_on_date(user_id, date)?;
        self.db.upsert_daily_progress(&PactDailyProgress {
            pact_id: pact.id,
            user_id: user_id.to_string(),
            date,
            pomos_completed: pomos,
            completed: pomos >= pact.required_pomos_per_day,
        })?;
        Ok(())
    }

    /// Drive a pact's state machine until it settles. Re-entrant: every
    /// step is a compare-and-set, so concurrent invocations converge on
    /// the same state, and terminal pacts are never touched.
    pub fn check_transitions(&self, pact_id: Uuid, today: NaiveDate) -> Result<PactStatus> {
        loop {
            let pact = self.require_pact(pact_id)?;
            if pact.status.is_terminal() {
                return Ok(pact.status);
            }
            let participants = self.db.participants(pact_id)?;
            let progress: HashMap<(UserId, NaiveDate), bool> = self
                .db
                .progress_for_pact(pact_id)?
                .into_iter()
                .map(|c| ((c.user_id, c.date), c.completed))
                .collect();

            match evaluate_transition(&pact, &participants, &progress, today) {
                None => return Ok(pact.status),
                Some(PactTransition::Activate) => {
                    if self
                        .db
                        .cas_pact_status(pact_id, PactStatus::Pending, PactStatus::Active)?
                    {
                        log::info!("pact activated: id={pact_id}");
                    }
                }
                Some(PactTransition::Fail { date, user_id }) => {
                    if self.db.cas_pact_failed(pact_id, date, &user_id)? {
                        log::warn!("pact failed: id={pact_id} on={date} by={user_id}");
                    }
                }
                Some(PactTransition::Complete) => {
                    if self
                        .db
                        .cas_pact_status(pact_id, PactStatus::Active, PactStatus::Completed)?
                    {
                        log::info!("pact completed: id={pact_id}");
                        badge::award_on_pact_completion(&self.db, pact_id, today_noon(today))?;
                    }
                }
            }
            // A transition was applied (or lost a benign race); loop to
            // re-read and settle.
        }
    }

    /// Reconciliation sweep over every non-terminal pact: re-derive all
    /// progress cells up to today, then re-check transitions. Compensates
    /// for lost deferred tasks.
    pub fn sweep(&self, today: NaiveDate) -> Result<SweepSummary> {
        let mut summary = SweepSummary::default();
        for pact in self.db.non_terminal_pacts()? {
            summary.examined += 1;
            let before = pact.status;
            for participant in self.db.participants(pact.id)? {
                for date in pact.dates().take_while(|d| *d <= today) {
                    self.recompute_cell(&pact, &participant.user_id, date)?;
                }
            }
            let after = self.check_transitions(pact.id, today)?;
            match (before, after) {
                (PactStatus::Pending, PactStatus::Active) => summary.activated += 1,
                (_, PactStatus::Failed) => summary.failed += 1,
                (_, PactStatus::Completed) => summary.completed += 1,
                _ => {}
            }
        }
        Ok(summary)
    }

    /// Run every queued deferred task, best-effort. Failures are logged
    /// and dropped; the sweep re-derives whatever they would have.
    /// Returns the number of tasks taken off the queue.
    pub fn drain_tasks(&mut self, now: DateTime<Utc>) -> usize {
        let mut ran = 0;
        while let Some(task) = self.queue.pop() {
            let result = match &task {
                DeferredTask::EvaluateChallenges { user_id } => {
                    self.evaluate_challenges(user_id, now)
                }
                DeferredTask::RefreshPactProgress { user_id, date } => {
                    self.refresh_pact_progress(user_id, *date, now.date_naive())
                }
            };
            if let Err(e) = result {
                log::warn!("deferred task dropped: {task:?}: {e}");
            }
            ran += 1;
        }
        ran
    }
}

/// Midday timestamp for a date, used when a transition needs an instant
/// but only a calendar date is in hand.
fn today_noon(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(12, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::ChallengeKind;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn engine() -> Engine {
        let mut config = Config::default();
        config.admin.allow_list.push("ops@example.com".to_string());
        let engine = Engine::new(Database::open_memory().unwrap(), config);
        for (id, identity) in [
            ("alice", "ops@example.com"),
            ("bob", "bob@example.com"),
        ] {
            engine
                .register_user(&User::new(id.to_string(), identity, id))
                .unwrap();
        }
        engine
    }

    fn alice() -> Caller {
        Caller::User("alice".to_string())
    }

    fn bob() -> Caller {
        Caller::User("bob".to_string())
    }

    #[test]
    fn duplicate_submission_returns_same_id_and_inserts_once() {
        let mut e = engine();
        let t = at(2026, 6, 1, 9, 0, 0);
        let first = e
            .record_session(&alice(), SessionMode::Focus, 1500, t, None)
            .unwrap();
        let tasks_after_first = e.pending_tasks();

        let retry = t + chrono::Duration::milliseconds(400);
        let second = e
            .record_session(&alice(), SessionMode::Focus, 1500, retry, None)
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(e.sessions(&alice()).unwrap().len(), 1);
        // The retry scheduled no additional downstream work
        assert_eq!(e.pending_tasks(), tasks_after_first);
    }

    #[test]
    fn break_sessions_schedule_no_downstream_work() {
        let mut e = engine();
        e.record_session(&alice(), SessionMode::Break, 300, at(2026, 6, 1, 9, 30, 0), None)
            .unwrap();
        assert_eq!(e.pending_tasks(), 0);

        e.record_session(&alice(), SessionMode::Focus, 1500, at(2026, 6, 1, 10, 0, 0), None)
            .unwrap();
        assert_eq!(e.pending_tasks(), 2);
    }

    #[test]
    fn unauthenticated_callers() {
        let mut e = engine();
        // Writes reject
        let err = e
            .record_session(&Caller::Anonymous, SessionMode::Focus, 1500, Utc::now(), None)
            .unwrap_err();
        assert!(matches!(err, CoreError::Unauthenticated));
        // Reads fail soft
        assert_eq!(e.stats(&Caller::Anonymous, Utc::now()).unwrap(), FocusStats::default());
        assert!(e.sessions(&Caller::Anonymous).unwrap().is_empty());
        assert!(e.challenge_progress(&Caller::Anonymous, Utc::now()).unwrap().is_empty());
        assert!(e.my_pacts(&Caller::Anonymous).unwrap().is_empty());
    }

    #[test]
    fn validation_rejects_before_writing() {
        let mut e = engine();
        let err = e
            .record_session(&alice(), SessionMode::Focus, 0, at(2026, 6, 1, 9, 0, 0), None)
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let future = Utc::now() + chrono::Duration::hours(2);
        let err = e
            .record_session(&alice(), SessionMode::Focus, 1500, future, None)
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        assert!(e.sessions(&alice()).unwrap().is_empty());
    }

    #[test]
    fn tag_update_is_owner_only() {
        let mut e = engine();
        let id = e
            .record_session(&alice(), SessionMode::Focus, 1500, at(2026, 6, 1, 9, 0, 0), None)
            .unwrap();

        e.update_session_tag(&alice(), id, Some("reading".to_string()), true)
            .unwrap();
        let s = &e.sessions(&alice()).unwrap()[0];
        assert_eq!(s.tag.as_deref(), Some("reading"));
        assert!(s.tag_private);

        let err = e
            .update_session_tag(&bob(), id, Some("hijack".to_string()), false)
            .unwrap_err();
        assert!(matches!(err, CoreError::NotAuthorized));

        let err = e
            .update_session_tag(&alice(), Uuid::new_v4(), None, false)
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { entity: "session", .. }));
    }

    #[test]
    fn challenge_completion_is_earned_and_kept() {
        let mut e = engine();
        e.define_challenge(
            &alice(),
            ChallengeDefinition {
                id: "daily-2".to_string(),
                kind: ChallengeKind::Daily,
                target: 2,
                active: true,
            },
        )
        .unwrap();

        let day = at(2026, 6, 1, 9, 0, 0);
        e.record_session(&bob(), SessionMode::Focus, 1500, day, None).unwrap();
        e.record_session(&bob(), SessionMode::Focus, 1500, day + chrono::Duration::hours(1), None)
            .unwrap();
        e.drain_tasks(day + chrono::Duration::hours(2));

        let c = e.db().get_completion("bob", "daily-2").unwrap().unwrap();
        assert!(c.completed);
        let stamped = c.completed_at;

        // A week later bob has zero progress for the day, but re-evaluation
        // never takes the completion back
        e.evaluate_challenges("bob", at(2026, 6, 8, 9, 0, 0)).unwrap();
        let c = e.db().get_completion("bob", "daily-2").unwrap().unwrap();
        assert!(c.completed);
        assert_eq!(c.completed_at, stamped);
    }

    #[test]
    fn define_challenge_requires_allow_listed_identity() {
        let e = engine();
        let def = ChallengeDefinition {
            id: "total-10".to_string(),
            kind: ChallengeKind::Total,
            target: 10,
            active: true,
        };
        let err = e.define_challenge(&bob(), def.clone()).unwrap_err();
        assert!(matches!(err, CoreError::NotAuthorized));
        e.define_challenge(&alice(), def).unwrap();
    }

    fn two_member_pact(e: &Engine, now: DateTime<Utc>) -> Pact {
        let pact = e
            .create_pact(&alice(), date(2026, 6, 1), date(2026, 6, 3), 1, now)
            .unwrap();
        e.join_pact(&bob(), &pact.join_code, now).unwrap();
        pact
    }

    #[test]
    fn pact_fails_fast_on_first_missed_day() {
        let mut e = engine();
        let created = at(2026, 5, 30, 8, 0, 0);
        let pact = two_member_pact(&e, created);

        // Day 1: both deliver
        for (caller, h) in [(alice(), 9), (bob(), 10)] {
            e.record_session(&caller, SessionMode::Focus, 1500, at(2026, 6, 1, h, 0, 0), None)
                .unwrap();
        }
        e.drain_tasks(at(2026, 6, 1, 12, 0, 0));
        assert_eq!(e.db().get_pact(pact.id).unwrap().unwrap().status, PactStatus::Active);

        // Day 2: only alice delivers
        e.record_session(&alice(), SessionMode::Focus, 1500, at(2026, 6, 2, 9, 0, 0), None)
            .unwrap();
        e.drain_tasks(at(2026, 6, 2, 12, 0, 0));

        // Day 3: alice keeps going; her write re-checks and finds bob's miss
        e.record_session(&alice(), SessionMode::Focus, 1500, at(2026, 6, 3, 9, 0, 0), None)
            .unwrap();
        e.drain_tasks(at(2026, 6, 3, 12, 0, 0));

        let failed = e.db().get_pact(pact.id).unwrap().unwrap();
        assert_eq!(failed.status, PactStatus::Failed);
        assert_eq!(failed.failed_on_date, Some(date(2026, 6, 2)));
        assert_eq!(failed.failed_by_user_id.as_deref(), Some("bob"));

        // Terminal: further sweeps change nothing
        e.sweep(date(2026, 6, 10)).unwrap();
        let still = e.db().get_pact(pact.id).unwrap().unwrap();
        assert_eq!(still.status, PactStatus::Failed);
        assert_eq!(still.failed_on_date, Some(date(2026, 6, 2)));
    }

    #[test]
    fn pact_completes_and_badges_once() {
        let mut e = engine();
        let created = at(2026, 5, 30, 8, 0, 0);
        let pact = two_member_pact(&e, created);

        for d in 1..=3 {
            for (caller, h) in [(alice(), 9), (bob(), 20)] {
                e.record_session(&caller, SessionMode::Focus, 1500, at(2026, 6, d, h, 0, 0), None)
                    .unwrap();
            }
            e.drain_tasks(at(2026, 6, d, 22, 0, 0));
        }
        // Range not over yet
        assert_eq!(e.db().get_pact(pact.id).unwrap().unwrap().status, PactStatus::Active);

        let summary = e.sweep(date(2026, 6, 4)).unwrap();
        assert_eq!(summary.completed, 1);
        assert_eq!(e.db().get_pact(pact.id).unwrap().unwrap().status, PactStatus::Completed);

        let badge_a = e.db().get_completion("alice", badge::TEAM_BADGE_ID).unwrap().unwrap();
        let badge_b = e.db().get_completion("bob", badge::TEAM_BADGE_ID).unwrap().unwrap();
        assert!(badge_a.completed && badge_b.completed);

        // Re-sweeping neither re-awards nor re-stamps
        let summary = e.sweep(date(2026, 6, 5)).unwrap();
        assert_eq!(summary.examined, 0);
        let again = e.db().get_completion("alice", badge::TEAM_BADGE_ID).unwrap().unwrap();
        assert_eq!(again.completed_at, badge_a.completed_at);
    }

    #[test]
    fn sweep_heals_lost_deferred_tasks() {
        let e = engine();
        // One-day solo pact, no sessions ever, no tasks ever drained
        let created = at(2026, 6, 1, 8, 0, 0);
        let pact = e
            .create_pact(&alice(), date(2026, 6, 1), date(2026, 6, 1), 1, created)
            .unwrap();

        let summary = e.sweep(date(2026, 6, 2)).unwrap();
        assert_eq!(summary.examined, 1);
        assert_eq!(summary.failed, 1);
        let failed = e.db().get_pact(pact.id).unwrap().unwrap();
        assert_eq!(failed.status, PactStatus::Failed);
        assert_eq!(failed.failed_on_date, Some(date(2026, 6, 1)));
        assert_eq!(failed.failed_by_user_id.as_deref(), Some("alice"));
    }

    #[test]
    fn membership_rules_are_hard_errors() {
        let e = engine();
        let created = at(2026, 5, 30, 8, 0, 0);
        let pact = two_member_pact(&e, created);

        // Double join
        let err = e.join_pact(&bob(), &pact.join_code, created).unwrap_err();
        assert!(matches!(err, CoreError::Pact(PactError::AlreadyJoined)));

        // Join after the start date has passed
        let err = e
            .join_pact(&bob(), &pact.join_code, at(2026, 6, 2, 8, 0, 0))
            .unwrap_err();
        assert!(matches!(err, CoreError::Pact(PactError::JoinWindowPassed { .. })));

        // Leave after activation
        e.check_transitions(pact.id, date(2026, 6, 1)).unwrap();
        let err = e.leave_pact(&bob(), pact.id).unwrap_err();
        assert!(matches!(err, CoreError::Pact(PactError::LeaveClosed { .. })));

        // Update by a non-creator, against a started pact
        let err = e
            .update_pact(&bob(), pact.id, date(2026, 6, 2), date(2026, 6, 4), 1, created)
            .unwrap_err();
        assert!(matches!(err, CoreError::Pact(PactError::NotCreator)));
        let err = e
            .update_pact(&alice(), pact.id, date(2026, 6, 2), date(2026, 6, 4), 1, at(2026, 6, 2, 8, 0, 0))
            .unwrap_err();
        assert!(matches!(err, CoreError::Pact(PactError::NotEditable { .. })));

        // Unknown join code
        let err = e.join_pact(&bob(), "ZZZZZZ", created).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { entity: "pact", .. }));
    }

    #[test]
    fn creator_leaving_pending_pact_dissolves_it() {
        let e = engine();
        let created = at(2026, 5, 30, 8, 0, 0);
        let pact = two_member_pact(&e, created);

        // Non-creator leaving keeps the pact
        e.leave_pact(&bob(), pact.id).unwrap();
        assert!(e.db().get_pact(pact.id).unwrap().is_some());

        e.leave_pact(&alice(), pact.id).unwrap();
        assert!(e.db().get_pact(pact.id).unwrap().is_none());
        assert!(e.my_pacts(&alice()).unwrap().is_empty());
    }

    #[test]
    fn update_pact_rewrites_terms_before_start() {
        let e = engine();
        let created = at(2026, 5, 30, 8, 0, 0);
        let pact = e
            .create_pact(&alice(), date(2026, 6, 1), date(2026, 6, 3), 1, created)
            .unwrap();
        let updated = e
            .update_pact(&alice(), pact.id, date(2026, 6, 2), date(2026, 6, 5), 3, created)
            .unwrap();
        assert_eq!(updated.start_date, date(2026, 6, 2));
        assert_eq!(updated.end_date, date(2026, 6, 5));
        assert_eq!(updated.required_pomos_per_day, 3);
        assert_eq!(updated.status, PactStatus::Pending);
    }

    #[test]
    fn overview_is_members_only() {
        let e = engine();
        let created = at(2026, 5, 30, 8, 0, 0);
        let pact = e
            .create_pact(&alice(), date(2026, 6, 1), date(2026, 6, 3), 1, created)
            .unwrap();

        assert!(e.pact_overview(&bob(), pact.id).unwrap().is_none());
        assert!(e.pact_overview(&Caller::Anonymous, pact.id).unwrap().is_none());

        let view = e.pact_overview(&alice(), pact.id).unwrap().unwrap();
        assert_eq!(view.participants.len(), 1);
        assert_eq!(view.pact.id, pact.id);
    }

    #[test]
    fn pact_validation() {
        let e = engine();
        let now = at(2026, 6, 1, 8, 0, 0);
        // Start in the past
        assert!(e
            .create_pact(&alice(), date(2026, 5, 31), date(2026, 6, 3), 1, now)
            .is_err());
        // Inverted range
        assert!(e
            .create_pact(&alice(), date(2026, 6, 3), date(2026, 6, 1), 1, now)
            .is_err());
        // Zero quota
        assert!(e
            .create_pact(&alice(), date(2026, 6, 1), date(2026, 6, 3), 0, now)
            .is_err());
        // Too long
        assert!(e
            .create_pact(&alice(), date(2026, 6, 1), date(2026, 12, 1), 1, now)
            .is_err());
    }

    #[test]
    fn stats_side_effect_raises_high_water_mark() {
        let mut e = engine();
        for d in 1..=3 {
            e.record_session(&alice(), SessionMode::Focus, 1500, at(2026, 6, d, 9, 0, 0), None)
                .unwrap();
        }
        let stats = e.stats(&alice(), at(2026, 6, 3, 12, 0, 0)).unwrap();
        assert_eq!(stats.current_streak, 3);
        assert_eq!(
            e.db().get_user("alice").unwrap().unwrap().best_daily_streak,
            3
        );

        // Long after the streak lapsed, best is still 3
        let later = e.stats(&alice(), at(2026, 7, 1, 12, 0, 0)).unwrap();
        assert_eq!(later.current_streak, 0);
        assert_eq!(later.best_streak, 3);
    }

    proptest! {
        /// Resubmitting any batch of sessions leaves the ledger unchanged.
        #[test]
        fn ingestion_is_idempotent(
            submissions in proptest::collection::vec(
                (0u32..600, prop_oneof![Just(SessionMode::Focus), Just(SessionMode::Break)], 1u32..3),
                1..12,
            )
        ) {
            let mut e = engine();
            let base = at(2026, 6, 1, 9, 0, 0);
            let mut ids = Vec::new();
            for (offset_s, mode, dur_units) in &submissions {
                let id = e.record_session(
                    &alice(),
                    *mode,
                    dur_units * 300,
                    base + chrono::Duration::seconds(*offset_s as i64),
                    None,
                ).unwrap();
                ids.push(id);
            }
            let count = e.sessions(&alice()).unwrap().len();

            for (i, (offset_s, mode, dur_units)) in submissions.iter().enumerate() {
                let id = e.record_session(
                    &alice(),
                    *mode,
                    dur_units * 300,
                    base + chrono::Duration::seconds(*offset_s as i64),
                    None,
                ).unwrap();
                prop_assert_eq!(id, ids[i]);
            }
            prop_assert_eq!(e.sessions(&alice()).unwrap().len(), count);
        }

        /// The stored best-streak mark never decreases, whatever order
        /// sessions arrive in.
        #[test]
        fn best_streak_is_monotone(
            day_offsets in proptest::collection::vec(0u8..40, 1..20)
        ) {
            let mut e = engine();
            let base = at(2026, 6, 1, 9, 0, 0);
            let as_of = at(2026, 7, 15, 12, 0, 0);
            let mut last_best = 0;
            for offset in day_offsets {
                e.record_session(
                    &alice(),
                    SessionMode::Focus,
                    1500,
                    base + chrono::Duration::days(offset as i64),
                    None,
                ).unwrap();
                e.stats(&alice(), as_of).unwrap();
                let stored = e.db().get_user("alice").unwrap().unwrap().best_daily_streak;
                prop_assert!(stored >= last_best);
                last_best = stored;
            }
        }
    }
}
