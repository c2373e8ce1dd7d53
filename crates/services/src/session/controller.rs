use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use exam_core::Clock;
use exam_core::model::{
    AnswerValue, ExamDefinition, QuestionId, ResultRecord, SessionId, SessionSnapshot,
    SessionStatus, SubmissionReceipt,
};
use storage::repository::SnapshotRepository;

use super::cursor::{NavStep, NavigationCursor, Position};
use super::progress::SessionProgress;
use super::stores::{AnswerStore, FlagSet};
use super::submission::SubmissionPipeline;
use super::timer::{CountdownTimer, TimerTick};
use crate::error::SessionError;

/// The orchestrating state machine for one exam attempt.
///
/// Owns the countdown timer, navigation cursor and answer/flag stores; every
/// mutation from a screen passes through a method here, so the state-machine
/// invariants are enforced in exactly one place. Collaborators (snapshot
/// store, submission pipeline, clock) are injected at construction — the
/// controller never reaches into ambient state or into a screen.
pub struct SessionController {
    definition: Arc<ExamDefinition>,
    session_id: SessionId,
    status: SessionStatus,
    timer: Option<CountdownTimer>,
    cursor: NavigationCursor,
    answers: AnswerStore,
    flags: FlagSet,
    submission_attempts: u32,
    started_at: DateTime<Utc>,
    receipt: Option<SubmissionReceipt>,
    snapshots: Arc<dyn SnapshotRepository>,
    pipeline: SubmissionPipeline,
    clock: Clock,
}

// Manual impl: the injected collaborators are trait objects.
impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("session_id", &self.session_id)
            .field("exam_id", self.definition.id())
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl SessionController {
    /// Create a fresh attempt in `NotStarted`; the timer begins at `start`.
    #[must_use]
    pub fn begin(
        definition: Arc<ExamDefinition>,
        snapshots: Arc<dyn SnapshotRepository>,
        pipeline: SubmissionPipeline,
        clock: Clock,
    ) -> Self {
        let session_id = SessionId::new();
        tracing::info!(session = %session_id, exam = %definition.id(), "attempt created");
        Self {
            definition,
            session_id,
            status: SessionStatus::NotStarted,
            timer: None,
            cursor: NavigationCursor::new(),
            answers: AnswerStore::new(),
            flags: FlagSet::new(),
            submission_attempts: 0,
            started_at: clock.now(),
            receipt: None,
            snapshots,
            pipeline,
            clock,
        }
    }

    /// Rebuild a pre-submission attempt from a durable snapshot.
    ///
    /// The persisted wall-clock deadline is restored as-is: time spent down
    /// still counts against the student, and a deadline already in the past
    /// expires on the first tick.
    ///
    /// # Errors
    ///
    /// Returns `SessionClosed` for snapshots past the point of editing,
    /// `SnapshotMismatch` if the snapshot does not belong to `definition`
    /// or references unknown questions, and `OutOfRange` for a corrupt
    /// cursor position.
    pub fn resume(
        definition: Arc<ExamDefinition>,
        snapshot: SessionSnapshot,
        snapshots: Arc<dyn SnapshotRepository>,
        pipeline: SubmissionPipeline,
        clock: Clock,
    ) -> Result<Self, SessionError> {
        if snapshot.status.is_closed() {
            return Err(SessionError::SessionClosed);
        }
        if snapshot.exam_id != *definition.id() {
            return Err(SessionError::SnapshotMismatch(format!(
                "snapshot is for exam {}, definition is {}",
                snapshot.exam_id,
                definition.id()
            )));
        }
        for question_id in snapshot.answers.keys().chain(snapshot.flags.iter()) {
            if !definition.has_question(question_id) {
                return Err(SessionError::SnapshotMismatch(format!(
                    "snapshot references unknown question {question_id}"
                )));
            }
        }

        let cursor = NavigationCursor::from_position(
            &definition,
            snapshot.current_section,
            snapshot.current_question,
        )?;
        let timer = snapshot.status.is_running().then(|| {
            CountdownTimer::resume(snapshot.deadline, definition.duration_seconds())
        });

        tracing::info!(
            session = %snapshot.session_id,
            exam = %snapshot.exam_id,
            status = %snapshot.status,
            "attempt resumed from snapshot"
        );

        Ok(Self {
            definition,
            session_id: snapshot.session_id,
            status: snapshot.status,
            timer,
            cursor,
            answers: AnswerStore::from_map(snapshot.answers),
            flags: FlagSet::from_set(snapshot.flags),
            submission_attempts: snapshot.submission_attempts,
            started_at: snapshot.started_at,
            receipt: None,
            snapshots,
            pipeline,
            clock,
        })
    }

    //
    // ─── LIFECYCLE ────────────────────────────────────────────────────────────
    //

    /// Confirm the start of the attempt: the countdown begins now.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the attempt is `NotStarted`.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        self.try_transition(SessionStatus::InProgress)?;
        self.started_at = self.clock.now();
        self.timer = Some(CountdownTimer::start(
            &self.clock,
            self.definition.duration_seconds(),
        ));
        self.write_snapshot().await;
        Ok(())
    }

    /// Move to the review screen. The timer keeps running.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the attempt is `InProgress`.
    pub async fn start_review(&mut self) -> Result<(), SessionError> {
        self.try_transition(SessionStatus::UnderReview)?;
        self.write_snapshot().await;
        Ok(())
    }

    /// Return from review to keep editing. The timer keeps running.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the attempt is `UnderReview`.
    pub async fn resume_editing(&mut self) -> Result<(), SessionError> {
        self.try_transition(SessionStatus::InProgress)?;
        self.write_snapshot().await;
        Ok(())
    }

    //
    // ─── ANSWERS & FLAGS ──────────────────────────────────────────────────────
    //

    /// Record the student's answer for a question. Last write wins.
    ///
    /// # Errors
    ///
    /// Returns `SessionClosed` once the attempt stopped accepting edits,
    /// `NotStarted` before `start`, and `UnknownQuestion` for an id not in
    /// the exam.
    pub async fn answer(
        &mut self,
        question_id: QuestionId,
        value: AnswerValue,
    ) -> Result<(), SessionError> {
        self.ensure_editable()?;
        self.ensure_known(&question_id)?;
        self.answers.set(question_id, value);
        self.write_snapshot().await;
        Ok(())
    }

    /// Remove the answer for a question; it becomes unanswered.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::answer`].
    pub async fn clear_answer(&mut self, question_id: &QuestionId) -> Result<(), SessionError> {
        self.ensure_editable()?;
        self.ensure_known(question_id)?;
        self.answers.clear(question_id);
        self.write_snapshot().await;
        Ok(())
    }

    /// Flip the "review later" flag for a question; answers are untouched.
    ///
    /// Returns whether the question is now flagged.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::answer`].
    pub async fn toggle_flag(&mut self, question_id: QuestionId) -> Result<bool, SessionError> {
        self.ensure_editable()?;
        self.ensure_known(&question_id)?;
        let flagged = self.flags.toggle(question_id);
        self.write_snapshot().await;
        Ok(flagged)
    }

    //
    // ─── NAVIGATION ───────────────────────────────────────────────────────────
    //

    /// Absolute jump, used by the review screen.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` (cursor unchanged) for a target that does not
    /// exist, and `SessionClosed`/`NotStarted` outside the editable states.
    pub async fn go_to(
        &mut self,
        section: usize,
        question: usize,
    ) -> Result<Position, SessionError> {
        self.ensure_editable()?;
        let position = self.cursor.go_to(&self.definition, section, question)?;
        self.write_snapshot().await;
        Ok(position)
    }

    /// Step forward; `Boundary` at a section edge unless the definition
    /// marks sections contiguous.
    ///
    /// # Errors
    ///
    /// Returns `SessionClosed`/`NotStarted` outside the editable states.
    pub async fn next(&mut self) -> Result<NavStep, SessionError> {
        self.ensure_editable()?;
        let step = self.cursor.next(&self.definition);
        if matches!(step, NavStep::Moved(_)) {
            self.write_snapshot().await;
        }
        Ok(step)
    }

    /// Step backward; `Boundary` at a section edge unless the definition
    /// marks sections contiguous.
    ///
    /// # Errors
    ///
    /// Returns `SessionClosed`/`NotStarted` outside the editable states.
    pub async fn previous(&mut self) -> Result<NavStep, SessionError> {
        self.ensure_editable()?;
        let step = self.cursor.previous(&self.definition);
        if matches!(step, NavStep::Moved(_)) {
            self.write_snapshot().await;
        }
        Ok(step)
    }

    //
    // ─── TIME ─────────────────────────────────────────────────────────────────
    //

    /// Advance the countdown; the embedder calls this once per second while
    /// an exam screen is mounted.
    ///
    /// On the tick that reaches zero the attempt is force-submitted: edits
    /// close immediately and the submission pipeline runs with the same
    /// guarantees as a manual submit. The student cannot block or delay
    /// this. Returns the remaining seconds after the tick.
    ///
    /// # Errors
    ///
    /// Returns `Submission` if the forced submission exhausts its retries;
    /// the attempt is then `SubmissionFailed` with all answers preserved.
    pub async fn tick(&mut self) -> Result<u32, SessionError> {
        if !self.status.is_running() {
            return Ok(self.remaining_seconds());
        }
        let clock = self.clock.clone();
        let Some(timer) = self.timer.as_mut() else {
            return Ok(self.remaining_seconds());
        };
        match timer.tick(&clock) {
            TimerTick::Running(remaining) => Ok(remaining),
            TimerTick::Expired => {
                tracing::info!(session = %self.session_id, "time expired, forcing submission");
                self.try_transition(SessionStatus::Expired)?;
                self.try_transition(SessionStatus::Submitting)?;
                self.finish_submission().await?;
                Ok(0)
            }
            TimerTick::Idle => Ok(0),
        }
    }

    /// Remaining whole seconds; the full duration before `start`.
    #[must_use]
    pub fn remaining_seconds(&self) -> u32 {
        match &self.timer {
            Some(timer) => timer.remaining(&self.clock),
            None => self.definition.duration_seconds(),
        }
    }

    //
    // ─── SUBMISSION ───────────────────────────────────────────────────────────
    //

    /// Submit the attempt (student confirmation or manual retry after a
    /// failure).
    ///
    /// Calling again after success returns the receipt of the first
    /// submission; at most one result record ever becomes authoritative for
    /// this session, because every attempt reuses the same idempotency key.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` while a submission is already in flight
    /// or before `start`, and `Submission` once retries are exhausted.
    pub async fn submit(&mut self) -> Result<SubmissionReceipt, SessionError> {
        if let Some(receipt) = &self.receipt {
            return Ok(receipt.clone());
        }
        // Winning this transition is the guard against the manual-submit /
        // timer-expiry race: whoever enters Submitting runs the pipeline,
        // any later caller lands in the receipt check above.
        self.try_transition(SessionStatus::Submitting)?;
        self.finish_submission().await
    }

    /// Re-enter the pipeline after `SubmissionFailed`. Answers stay frozen.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::submit`].
    pub async fn retry_submit(&mut self) -> Result<SubmissionReceipt, SessionError> {
        self.submit().await
    }

    async fn finish_submission(&mut self) -> Result<SubmissionReceipt, SessionError> {
        // The stores closed the moment Submitting was entered; the record is
        // a stable snapshot no late edit can race.
        let record = self.build_record();
        match self
            .pipeline
            .submit(&record, &mut self.submission_attempts)
            .await
        {
            Ok(receipt) => {
                self.try_transition(SessionStatus::Submitted)?;
                if let Some(timer) = self.timer.as_mut() {
                    timer.stop();
                }
                self.receipt = Some(receipt.clone());
                if let Err(error) = self.snapshots.delete_snapshot(&self.session_id).await {
                    tracing::warn!(session = %self.session_id, %error, "snapshot cleanup failed");
                }
                Ok(receipt)
            }
            Err(error) => {
                self.try_transition(SessionStatus::SubmissionFailed)?;
                // Keep the answers durable so a manual retry or reconnect can
                // still complete the submission without data loss.
                self.write_snapshot().await;
                Err(SessionError::Submission(error))
            }
        }
    }

    fn build_record(&self) -> ResultRecord {
        let total = self.definition.duration_seconds();
        let elapsed = total.saturating_sub(self.remaining_seconds());
        ResultRecord {
            session_id: self.session_id,
            exam_id: self.definition.id().clone(),
            answers: self.answers.to_map(),
            flags: self.flags.to_set(),
            elapsed_seconds: elapsed,
            submitted_at: self.clock.now(),
        }
    }

    //
    // ─── READ SIDE ────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn definition(&self) -> &ExamDefinition {
        &self.definition
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn current(&self) -> Position {
        self.cursor.current()
    }

    #[must_use]
    pub fn submission_attempts(&self) -> u32 {
        self.submission_attempts
    }

    #[must_use]
    pub fn receipt(&self) -> Option<&SubmissionReceipt> {
        self.receipt.as_ref()
    }

    #[must_use]
    pub fn answer_for(&self, question_id: &QuestionId) -> Option<&AnswerValue> {
        self.answers.get(question_id)
    }

    #[must_use]
    pub fn is_flagged(&self, question_id: &QuestionId) -> bool {
        self.flags.is_flagged(question_id)
    }

    /// Read-only iteration for the review screen (and post-submission
    /// audit).
    pub fn answers(&self) -> impl Iterator<Item = (&QuestionId, &AnswerValue)> {
        self.answers.all()
    }

    pub fn flags(&self) -> impl Iterator<Item = &QuestionId> {
        self.flags.all()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let total = self.definition.total_questions();
        let answered = self.answers.count();
        SessionProgress {
            total,
            answered,
            flagged: self.flags.len(),
            unanswered: total.saturating_sub(answered),
        }
    }

    /// Point-in-time durable shape of this attempt.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let position = self.cursor.current();
        let deadline = match &self.timer {
            Some(timer) => timer.deadline(),
            None => {
                self.clock.now()
                    + chrono::Duration::seconds(i64::from(self.definition.duration_seconds()))
            }
        };
        SessionSnapshot {
            session_id: self.session_id,
            exam_id: self.definition.id().clone(),
            status: self.status,
            remaining_seconds: self.remaining_seconds(),
            deadline,
            current_section: position.section,
            current_question: position.question,
            answers: self.answers.to_map(),
            flags: self.flags.to_set(),
            submission_attempts: self.submission_attempts,
            started_at: self.started_at,
        }
    }

    //
    // ─── INTERNALS ────────────────────────────────────────────────────────────
    //

    fn try_transition(&mut self, to: SessionStatus) -> Result<(), SessionError> {
        if !self.status.can_transition(to) {
            return Err(SessionError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        tracing::debug!(session = %self.session_id, from = %self.status, %to, "transition");
        self.status = to;
        Ok(())
    }

    fn ensure_editable(&self) -> Result<(), SessionError> {
        if self.status == SessionStatus::NotStarted {
            return Err(SessionError::NotStarted);
        }
        if self.status.is_closed() {
            return Err(SessionError::SessionClosed);
        }
        Ok(())
    }

    fn ensure_known(&self, question_id: &QuestionId) -> Result<(), SessionError> {
        if !self.definition.has_question(question_id) {
            return Err(SessionError::UnknownQuestion(question_id.clone()));
        }
        Ok(())
    }

    /// Best-effort durable snapshot, awaited inline so writes land in
    /// mutation order and none can outlive the session. A failed write is
    /// only logged: the in-memory session stays authoritative until
    /// submission.
    async fn write_snapshot(&self) {
        let snapshot = self.snapshot();
        if let Err(error) = self.snapshots.save_snapshot(&snapshot).await {
            tracing::warn!(
                session = %snapshot.session_id,
                %error,
                "snapshot write failed, session stays in memory"
            );
        }
    }
}
