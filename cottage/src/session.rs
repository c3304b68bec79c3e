//! The study session state machine.
//!
//! `SessionController` is the single owner of the session record. Every
//! user intent and every tick goes through it; after each transition the
//! record is written through the injected [`SessionStore`], alerts go to the
//! [`Notifier`] and the room is told about the new study time.

use crate::clock::{self, ClockReading};
use crate::notify::{Alert, Notifier};
use crate::room::RoomChannel;
use crate::storage::SessionStore;
use chrono::{DateTime, Duration, Utc};
pub use cottage_ipc::Phase;
use cottage_ipc::SessionStatus;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_FOCUS_MINUTES: u32 = 60;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("focus task must not be empty")]
    EmptyTask,
    #[error("duration must be at least one minute")]
    NonPositiveMinutes,
}

/// What the user asked for when the session began.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub focus_task: String,
    pub focus_minutes: u32,
    pub play_sound: bool,
}

impl SessionConfig {
    pub fn new(focus_task: impl Into<String>, focus_minutes: u32, play_sound: bool) -> Self {
        Self {
            focus_task: focus_task.into(),
            focus_minutes,
            play_sound,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), SessionError> {
        if self.focus_task.trim().is_empty() {
            return Err(SessionError::EmptyTask);
        }
        validate_minutes(self.focus_minutes)
    }
}

fn validate_minutes(minutes: u32) -> Result<(), SessionError> {
    if minutes == 0 {
        Err(SessionError::NonPositiveMinutes)
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakConfig {
    pub break_minutes: u32,
    /// Absent only in snapshots written before breaks were anchored.
    pub break_start_time: Option<DateTime<Utc>>,
    pub break_remaining_seconds: i64,
}

impl BreakConfig {
    fn remaining_at(&self, now: DateTime<Utc>) -> i64 {
        match self.break_start_time {
            Some(anchor) => {
                let total = i64::from(self.break_minutes) * 60;
                (total - (now - anchor).num_seconds()).max(0)
            }
            None => self.break_remaining_seconds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub phase: Phase,
    pub focus_task: String,
    pub focus_minutes: u32,
    pub play_sound: bool,
    /// Anchor of the current focus interval.
    pub start_time: Option<DateTime<Utc>>,
    /// Focus anchor parked while on break.
    pub suspended_start_time: Option<DateTime<Utc>>,
    pub accumulated_study_ms: i64,
    /// Part of the current anchor's elapsed time already in `accumulated_study_ms`.
    pub interval_credited_ms: i64,
    pub break_config: Option<BreakConfig>,
    pub is_time_up_notified: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            focus_task: String::new(),
            focus_minutes: DEFAULT_FOCUS_MINUTES,
            play_sound: true,
            start_time: None,
            suspended_start_time: None,
            accumulated_study_ms: 0,
            interval_credited_ms: 0,
            break_config: None,
            is_time_up_notified: false,
        }
    }
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    /// Idle has no anchors; every other phase has exactly one. A break
    /// restored from an old snapshot may have lost its focus anchor, so
    /// `BreakEnded` can be unanchored; continuing then starts a fresh one.
    pub fn anchors_consistent(&self) -> bool {
        let focus = self.start_time.is_some();
        let on_break = self.break_config.is_some();
        match self.phase {
            Phase::Idle => !focus && !on_break && self.suspended_start_time.is_none(),
            Phase::OnBreak => !focus && on_break,
            Phase::BreakEnded => !on_break,
            _ => focus && !on_break,
        }
    }

    pub fn focus_reading(&self, now: DateTime<Utc>) -> Option<ClockReading> {
        self.start_time
            .map(|anchor| clock::measure(now, anchor, self.focus_minutes))
    }

    /// Elapsed time of the current anchor not yet banked.
    fn pending_ms(&self, now: DateTime<Utc>) -> i64 {
        match self.focus_reading(now) {
            Some(reading) => {
                let counted = reading.elapsed.min(clock::window(self.focus_minutes));
                (counted.num_milliseconds() - self.interval_credited_ms).max(0)
            }
            None => 0,
        }
    }

    /// Banked time plus whatever the running interval has added so far.
    pub fn studied(&self, now: DateTime<Utc>) -> Duration {
        Duration::milliseconds(self.accumulated_study_ms + self.pending_ms(now))
    }

    pub fn break_remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        self.break_config.as_ref().map(|b| b.remaining_at(now))
    }

    fn fold(&mut self, now: DateTime<Utc>) {
        let pending = self.pending_ms(now);
        self.accumulated_study_ms += pending;
        self.interval_credited_ms += pending;
    }

    fn anchor_focus(&mut self, now: DateTime<Utc>, minutes: u32) {
        self.start_time = Some(now);
        self.interval_credited_ms = 0;
        self.focus_minutes = minutes;
        self.is_time_up_notified = false;
    }

    fn clear_anchors(&mut self) {
        self.start_time = None;
        self.suspended_start_time = None;
        self.interval_credited_ms = 0;
        self.break_config = None;
        self.is_time_up_notified = false;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Carry banked study time across extends and continues.
    pub accumulate: bool,
    /// Room to publish study-time updates to.
    pub room_id: Option<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            accumulate: true,
            room_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied(Phase),
    Unchanged,
}

pub struct SessionController {
    state: SessionState,
    options: SessionOptions,
    store: Box<dyn SessionStore>,
    notifier: Notifier,
    room: Box<dyn RoomChannel>,
}

impl SessionController {
    pub fn new(
        options: SessionOptions,
        store: Box<dyn SessionStore>,
        notifier: Notifier,
        room: Box<dyn RoomChannel>,
    ) -> Self {
        Self {
            state: SessionState::default(),
            options,
            store,
            notifier,
            room,
        }
    }

    /// Picks up whatever session was running before the last shutdown.
    pub fn restore(
        options: SessionOptions,
        store: Box<dyn SessionStore>,
        notifier: Notifier,
        room: Box<dyn RoomChannel>,
    ) -> Self {
        let mut controller = Self::new(options, store, notifier, room);
        if let Some(state) = controller.store.load() {
            info!(phase = ?state.phase, task = %state.focus_task, "restored session");
            controller.state = state;
        }
        controller
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn status(&self, now: DateTime<Utc>) -> SessionStatus {
        let reading = match self.state.phase {
            Phase::Focusing | Phase::TimeUp => self.state.focus_reading(now),
            _ => None,
        };
        SessionStatus {
            phase: self.state.phase,
            focus_task: self.state.focus_task.clone(),
            focus_minutes: self.state.focus_minutes,
            studied_secs: self.state.studied(now).num_seconds(),
            remaining_secs: reading.map_or(0, |r| r.remaining.num_seconds()),
            break_remaining_secs: self.state.break_remaining(now),
            progress: reading.as_ref().map_or(0.0, clock::progress),
        }
    }

    pub fn start(
        &mut self,
        config: SessionConfig,
        now: DateTime<Utc>,
    ) -> Result<Outcome, SessionError> {
        config.validate()?;
        if !self.state.is_idle() {
            debug!(phase = ?self.state.phase, "start ignored outside idle");
            return Ok(Outcome::Unchanged);
        }
        self.state = SessionState {
            phase: Phase::Focusing,
            focus_task: config.focus_task.trim().to_string(),
            focus_minutes: config.focus_minutes,
            play_sound: config.play_sound,
            start_time: Some(now),
            ..SessionState::default()
        };
        info!(task = %self.state.focus_task, minutes = config.focus_minutes, "focus started");
        Ok(self.commit(now))
    }

    /// Called once a second while focusing.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Outcome {
        if self.state.phase != Phase::Focusing || self.state.is_time_up_notified {
            return Outcome::Unchanged;
        }
        let Some(reading) = self.state.focus_reading(now) else {
            return Outcome::Unchanged;
        };
        if !reading.is_expired {
            return Outcome::Unchanged;
        }
        self.state.fold(now);
        self.state.is_time_up_notified = true;
        self.state.phase = Phase::TimeUp;
        info!(
            studied_ms = self.state.accumulated_study_ms,
            "focus interval finished"
        );
        let outcome = self.commit(now);
        self.notifier.maybe_notify(Alert::TimeUp, self.state.play_sound);
        outcome
    }

    pub fn extend(&mut self, minutes: u32, now: DateTime<Utc>) -> Result<Outcome, SessionError> {
        validate_minutes(minutes)?;
        if self.state.phase != Phase::TimeUp {
            return Ok(Outcome::Unchanged);
        }
        self.state.fold(now);
        if !self.options.accumulate {
            self.state.accumulated_study_ms = 0;
        }
        self.state.anchor_focus(now, minutes);
        self.state.phase = Phase::Focusing;
        info!(minutes, "focus extended");
        Ok(self.commit(now))
    }

    pub fn take_break(
        &mut self,
        minutes: u32,
        now: DateTime<Utc>,
    ) -> Result<Outcome, SessionError> {
        validate_minutes(minutes)?;
        if self.state.phase != Phase::TimeUp {
            return Ok(Outcome::Unchanged);
        }
        self.state.fold(now);
        self.state.suspended_start_time = self.state.start_time.take();
        self.state.break_config = Some(BreakConfig {
            break_minutes: minutes,
            break_start_time: Some(now),
            break_remaining_seconds: i64::from(minutes) * 60,
        });
        self.state.phase = Phase::OnBreak;
        info!(minutes, "break started");
        Ok(self.commit(now))
    }

    /// Called once a second while on break.
    pub fn break_tick(&mut self, now: DateTime<Utc>) -> Outcome {
        if self.state.phase != Phase::OnBreak {
            return Outcome::Unchanged;
        }
        let Some(config) = self.state.break_config.as_mut() else {
            return self.end_break(now, true);
        };
        let remaining = match config.break_start_time {
            Some(_) => config.remaining_at(now),
            None => config.break_remaining_seconds - 1,
        };
        config.break_remaining_seconds = remaining.max(0);
        let anchored = config.break_start_time.is_some();
        if remaining <= 0 {
            return self.end_break(now, true);
        }
        if !anchored {
            // Without an anchor the countdown itself is the state.
            self.persist();
        }
        Outcome::Unchanged
    }

    pub fn skip_break(&mut self, now: DateTime<Utc>) -> Outcome {
        if self.state.phase != Phase::OnBreak {
            return Outcome::Unchanged;
        }
        self.end_break(now, false)
    }

    fn end_break(&mut self, now: DateTime<Utc>, notify: bool) -> Outcome {
        self.state.break_config = None;
        self.state.start_time = self.state.suspended_start_time.take();
        self.state.phase = Phase::BreakEnded;
        info!(skipped = !notify, "break ended");
        let outcome = self.commit(now);
        if notify {
            self.notifier.maybe_notify(Alert::BreakEnd, self.state.play_sound);
        }
        outcome
    }

    pub fn continue_study(
        &mut self,
        minutes: u32,
        add_to_existing: bool,
        now: DateTime<Utc>,
    ) -> Result<Outcome, SessionError> {
        validate_minutes(minutes)?;
        if self.state.phase != Phase::BreakEnded {
            return Ok(Outcome::Unchanged);
        }
        if add_to_existing && self.state.start_time.is_some() {
            self.state.focus_minutes = self.state.focus_minutes.saturating_add(minutes);
            self.state.is_time_up_notified = false;
        } else {
            self.state.fold(now);
            if !self.options.accumulate {
                self.state.accumulated_study_ms = 0;
            }
            self.state.anchor_focus(now, minutes);
        }
        self.state.phase = Phase::Focusing;
        info!(minutes, add_to_existing, "study continued after break");
        Ok(self.commit(now))
    }

    /// Declines to continue after a break. Banked time is kept.
    pub fn cancel_continue(&mut self, now: DateTime<Utc>) -> Outcome {
        if self.state.phase != Phase::BreakEnded {
            return Outcome::Unchanged;
        }
        self.state.clear_anchors();
        self.state.phase = Phase::Idle;
        info!(
            studied_ms = self.state.accumulated_study_ms,
            "continue declined"
        );
        self.commit(now)
    }

    /// Abandons the running interval; its elapsed time is banked first.
    pub fn restart(&mut self, now: DateTime<Utc>) -> Outcome {
        if !matches!(self.state.phase, Phase::Focusing | Phase::OnBreak) {
            return Outcome::Unchanged;
        }
        self.state.fold(now);
        self.state.clear_anchors();
        self.state.phase = Phase::Idle;
        info!(
            studied_ms = self.state.accumulated_study_ms,
            "session restarted"
        );
        self.commit(now)
    }

    /// Ends the session from any phase and returns the total studied.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Duration {
        let studied = self.state.studied(now);
        self.state = SessionState {
            focus_task: std::mem::take(&mut self.state.focus_task),
            focus_minutes: self.state.focus_minutes,
            play_sound: self.state.play_sound,
            ..SessionState::default()
        };
        if let Err(e) = self.store.clear() {
            warn!("Failed to remove session snapshot: {:#}", e);
        }
        info!(studied_secs = studied.num_seconds(), "session finished");
        self.publish(now);
        studied
    }

    fn commit(&mut self, now: DateTime<Utc>) -> Outcome {
        if !self.state.anchors_consistent() {
            warn!(state = ?self.state, "session anchors out of step with phase");
        }
        self.persist();
        self.publish(now);
        Outcome::Applied(self.state.phase)
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.state) {
            warn!("Failed to save session snapshot: {:#}", e);
        }
    }

    fn publish(&self, now: DateTime<Utc>) {
        let Some(room_id) = self.options.room_id.as_deref() else {
            return;
        };
        self.room.publish(
            room_id,
            "update-study-time",
            json!({
                "phase": self.state.phase,
                "studiedSecs": self.state.studied(now).num_seconds(),
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::RecordingPlayer;
    use crate::room::testing::RecordingRoom;
    use crate::storage::MemoryStore;
    use chrono::TimeZone;

    const MINUTE_MS: i64 = 60 * 1000;

    struct Harness {
        controller: SessionController,
        store: MemoryStore,
        player: RecordingPlayer,
        room: RecordingRoom,
    }

    fn harness(options: SessionOptions) -> Harness {
        let store = MemoryStore::default();
        let player = RecordingPlayer::default();
        let room = RecordingRoom::default();
        let controller = SessionController::new(
            options,
            Box::new(store.clone()),
            Notifier::new(Box::new(player.clone())),
            Box::new(room.clone()),
        );
        Harness {
            controller,
            store,
            player,
            room,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 14, 0, 0).unwrap()
    }

    fn at(minutes: i64) -> DateTime<Utc> {
        t0() + Duration::minutes(minutes)
    }

    fn math() -> SessionConfig {
        SessionConfig::new("Math", 25, true)
    }

    /// Session that reached time-up after 25 minutes of Math.
    fn timed_up() -> Harness {
        let mut h = harness(SessionOptions::default());
        h.controller.start(math(), t0()).unwrap();
        h.controller.tick(at(25));
        assert_eq!(h.controller.phase(), Phase::TimeUp);
        h
    }

    #[test]
    fn empty_task_is_rejected() {
        let mut h = harness(SessionOptions::default());
        for task in ["", "   "] {
            let err = h
                .controller
                .start(SessionConfig::new(task, 25, true), t0())
                .unwrap_err();
            assert_eq!(err, SessionError::EmptyTask);
        }
        assert_eq!(h.controller.phase(), Phase::Idle);
        assert!(h.store.snapshot().is_none());
    }

    #[test]
    fn zero_minutes_are_rejected_everywhere() {
        let mut h = harness(SessionOptions::default());
        assert_eq!(
            h.controller.start(SessionConfig::new("Math", 0, true), t0()),
            Err(SessionError::NonPositiveMinutes)
        );

        let mut h = timed_up();
        let before = h.controller.state().clone();
        assert!(h.controller.extend(0, at(26)).is_err());
        assert!(h.controller.take_break(0, at(26)).is_err());
        assert_eq!(h.controller.state(), &before);
    }

    #[test]
    fn start_anchors_a_fresh_session() {
        let mut h = harness(SessionOptions::default());
        let outcome = h.controller.start(math(), t0()).unwrap();
        assert_eq!(outcome, Outcome::Applied(Phase::Focusing));
        let state = h.controller.state();
        assert_eq!(state.start_time, Some(t0()));
        assert_eq!(state.accumulated_study_ms, 0);
        assert!(!state.is_time_up_notified);
        assert!(h.store.snapshot().is_some());
    }

    #[test]
    fn scenario_a_time_up_fires_once() {
        let mut h = harness(SessionOptions::default());
        h.controller.start(math(), t0()).unwrap();

        assert_eq!(h.controller.tick(at(24)), Outcome::Unchanged);
        assert_eq!(h.controller.phase(), Phase::Focusing);
        assert_eq!(h.controller.status(at(24)).remaining_secs, 60);
        let reading = h.controller.state().focus_reading(at(24)).unwrap();
        assert_eq!(reading.remaining.num_milliseconds(), MINUTE_MS);

        assert_eq!(h.controller.tick(at(25)), Outcome::Applied(Phase::TimeUp));
        assert_eq!(h.controller.state().accumulated_study_ms, 25 * MINUTE_MS);
        for extra in 1..5 {
            h.controller.tick(at(25) + Duration::seconds(extra));
        }
        assert_eq!(h.player.count(Alert::TimeUp), 1);
        assert_eq!(h.controller.state().accumulated_study_ms, 25 * MINUTE_MS);
    }

    #[test]
    fn muted_session_never_plays() {
        let mut h = harness(SessionOptions::default());
        h.controller
            .start(SessionConfig::new("Reading", 10, false), t0())
            .unwrap();
        h.controller.tick(at(10));
        assert_eq!(h.controller.phase(), Phase::TimeUp);
        assert_eq!(h.player.count(Alert::TimeUp), 0);
    }

    #[test]
    fn late_time_up_banks_only_the_window() {
        let mut h = harness(SessionOptions::default());
        h.controller.start(math(), t0()).unwrap();
        h.controller.tick(at(90));
        assert_eq!(h.controller.state().accumulated_study_ms, 25 * MINUTE_MS);
    }

    #[test]
    fn scenario_b_extend_keeps_banked_time() {
        let mut h = timed_up();
        let banked = h.controller.state().accumulated_study_ms;
        let outcome = h.controller.extend(15, at(27)).unwrap();
        assert_eq!(outcome, Outcome::Applied(Phase::Focusing));
        let state = h.controller.state();
        assert_eq!(state.focus_minutes, 15);
        assert_eq!(state.start_time, Some(at(27)));
        assert_eq!(state.accumulated_study_ms, banked);
        assert!(!state.is_time_up_notified);

        h.controller.tick(at(42));
        assert_eq!(h.controller.phase(), Phase::TimeUp);
        assert_eq!(h.controller.state().accumulated_study_ms, 40 * MINUTE_MS);
        assert_eq!(h.player.count(Alert::TimeUp), 2);
    }

    #[test]
    fn extend_without_accumulation_starts_over() {
        let mut h = harness(SessionOptions {
            accumulate: false,
            room_id: None,
        });
        h.controller.start(math(), t0()).unwrap();
        h.controller.tick(at(25));
        h.controller.extend(15, at(25)).unwrap();
        assert_eq!(h.controller.state().accumulated_study_ms, 0);
        assert_eq!(h.controller.state().studied(at(30)), Duration::minutes(5));
    }

    #[test]
    fn scenario_c_break_ends_after_its_window() {
        let mut h = timed_up();
        let break_start = at(26);
        h.controller.take_break(5, break_start).unwrap();
        assert_eq!(h.controller.phase(), Phase::OnBreak);
        assert!(h.controller.state().anchors_consistent());
        assert_eq!(h.controller.state().start_time, None);

        for second in 1..=300 {
            h.controller
                .break_tick(break_start + Duration::seconds(second));
            if second < 300 {
                assert_eq!(h.controller.phase(), Phase::OnBreak, "second {second}");
            }
        }
        assert_eq!(h.controller.phase(), Phase::BreakEnded);
        assert_eq!(h.player.count(Alert::BreakEnd), 1);
        assert!(h.controller.state().break_config.is_none());
        assert_eq!(h.controller.state().start_time, Some(t0()));

        h.controller.break_tick(break_start + Duration::seconds(301));
        assert_eq!(h.player.count(Alert::BreakEnd), 1);
    }

    #[test]
    fn break_catches_up_after_a_long_sleep() {
        let mut h = timed_up();
        h.controller.take_break(5, at(26)).unwrap();
        assert_eq!(h.controller.break_tick(at(40)), Outcome::Applied(Phase::BreakEnded));
    }

    #[test]
    fn unanchored_break_counts_down_by_ticks() {
        let mut h = timed_up();
        h.controller.take_break(1, at(26)).unwrap();
        if let Some(config) = h.controller.state.break_config.as_mut() {
            config.break_start_time = None;
            config.break_remaining_seconds = 2;
        }
        assert_eq!(h.controller.break_tick(at(26)), Outcome::Unchanged);
        assert_eq!(h.controller.state().break_remaining(at(26)), Some(1));
        assert_eq!(
            h.controller.break_tick(at(26)),
            Outcome::Applied(Phase::BreakEnded)
        );
    }

    #[test]
    fn skipping_a_break_is_silent() {
        let mut h = timed_up();
        h.controller.take_break(10, at(26)).unwrap();
        assert_eq!(
            h.controller.skip_break(at(27)),
            Outcome::Applied(Phase::BreakEnded)
        );
        assert_eq!(h.player.count(Alert::BreakEnd), 0);
        assert!(h.controller.state().anchors_consistent());
    }

    #[test]
    fn scenario_d_continue_adds_to_the_running_window() {
        let mut h = timed_up();
        h.controller.take_break(5, at(25)).unwrap();
        h.controller.skip_break(at(30));
        let outcome = h.controller.continue_study(30, true, at(30)).unwrap();
        assert_eq!(outcome, Outcome::Applied(Phase::Focusing));
        let state = h.controller.state();
        assert_eq!(state.focus_minutes, 55);
        assert_eq!(state.start_time, Some(t0()));

        h.controller.tick(at(55));
        assert_eq!(h.controller.phase(), Phase::TimeUp);
        // The same anchor is never banked twice.
        assert_eq!(h.controller.state().accumulated_study_ms, 55 * MINUTE_MS);
    }

    #[test]
    fn continue_with_fresh_window_folds_the_prior_anchor() {
        let mut h = timed_up();
        h.controller.take_break(5, at(25)).unwrap();
        h.controller.skip_break(at(28));
        h.controller.continue_study(20, false, at(28)).unwrap();
        let state = h.controller.state();
        assert_eq!(state.start_time, Some(at(28)));
        assert_eq!(state.focus_minutes, 20);
        assert_eq!(state.accumulated_study_ms, 25 * MINUTE_MS);
        assert_eq!(state.studied(at(38)), Duration::minutes(35));
    }

    #[test]
    fn cancel_continue_keeps_banked_time() {
        let mut h = timed_up();
        h.controller.take_break(5, at(25)).unwrap();
        h.controller.skip_break(at(26));
        assert_eq!(
            h.controller.cancel_continue(at(26)),
            Outcome::Applied(Phase::Idle)
        );
        let state = h.controller.state();
        assert!(state.anchors_consistent());
        assert_eq!(state.accumulated_study_ms, 25 * MINUTE_MS);
    }

    #[test]
    fn restart_banks_in_progress_time() {
        let mut h = harness(SessionOptions::default());
        h.controller.start(math(), t0()).unwrap();
        assert_eq!(h.controller.restart(at(10)), Outcome::Applied(Phase::Idle));
        let state = h.controller.state();
        assert_eq!(state.accumulated_study_ms, 10 * MINUTE_MS);
        assert!(state.anchors_consistent());

        h.controller
            .start(SessionConfig::new("Physics", 30, true), at(11))
            .unwrap();
        assert_eq!(h.controller.state().accumulated_study_ms, 0);
    }

    #[test]
    fn restart_from_break_banks_nothing_new() {
        let mut h = timed_up();
        h.controller.take_break(5, at(25)).unwrap();
        h.controller.restart(at(27));
        assert_eq!(h.controller.state().accumulated_study_ms, 25 * MINUTE_MS);
        assert_eq!(h.controller.phase(), Phase::Idle);
    }

    #[test]
    fn scenario_e_finish_from_every_phase() {
        let setups: Vec<fn(&mut SessionController)> = vec![
            |_| {},
            |c| {
                c.start(math(), t0()).unwrap();
            },
            |c| {
                c.start(math(), t0()).unwrap();
                c.tick(at(25));
            },
            |c| {
                c.start(math(), t0()).unwrap();
                c.tick(at(25));
                c.take_break(5, at(25)).unwrap();
            },
            |c| {
                c.start(math(), t0()).unwrap();
                c.tick(at(25));
                c.take_break(5, at(25)).unwrap();
                c.skip_break(at(26));
            },
        ];
        for setup in setups {
            let mut h = harness(SessionOptions::default());
            setup(&mut h.controller);
            h.controller.finish(at(27));
            let state = h.controller.state();
            assert_eq!(state.phase, Phase::Idle);
            assert_eq!(state.accumulated_study_ms, 0);
            assert!(state.anchors_consistent());
            assert!(h.store.snapshot().is_none());
        }
    }

    #[test]
    fn finish_reports_everything_studied() {
        let mut h = timed_up();
        h.controller.extend(15, at(25)).unwrap();
        let studied = h.controller.finish(at(30));
        assert_eq!(studied, Duration::minutes(30));
    }

    #[test]
    fn events_outside_their_phase_are_ignored() {
        let mut h = harness(SessionOptions::default());
        assert_eq!(h.controller.tick(t0()), Outcome::Unchanged);
        assert_eq!(h.controller.extend(5, t0()), Ok(Outcome::Unchanged));
        assert_eq!(h.controller.take_break(5, t0()), Ok(Outcome::Unchanged));
        assert_eq!(h.controller.break_tick(t0()), Outcome::Unchanged);
        assert_eq!(h.controller.skip_break(t0()), Outcome::Unchanged);
        assert_eq!(
            h.controller.continue_study(5, true, t0()),
            Ok(Outcome::Unchanged)
        );
        assert_eq!(h.controller.cancel_continue(t0()), Outcome::Unchanged);
        assert_eq!(h.controller.restart(t0()), Outcome::Unchanged);

        h.controller.start(math(), t0()).unwrap();
        assert_eq!(
            h.controller
                .start(SessionConfig::new("Other", 5, true), at(1)),
            Ok(Outcome::Unchanged)
        );
        assert_eq!(h.controller.state().focus_task, "Math");
    }

    #[test]
    fn accumulated_equals_sum_of_completed_intervals() {
        let mut h = timed_up(); // 25
        h.controller.extend(10, at(25)).unwrap();
        h.controller.tick(at(35)); // +10
        h.controller.take_break(5, at(35)).unwrap();
        h.controller.skip_break(at(37));
        h.controller.continue_study(20, false, at(37)).unwrap();
        h.controller.tick(at(57)); // +20
        assert_eq!(h.controller.state().accumulated_study_ms, 55 * MINUTE_MS);
        assert!(h.controller.state().anchors_consistent());
    }

    #[test]
    fn transitions_are_published_to_the_room() {
        let mut h = harness(SessionOptions {
            accumulate: true,
            room_id: Some("mina".to_string()),
        });
        h.controller.start(math(), t0()).unwrap();
        h.controller.tick(at(25));
        let events = h.room.events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.room_id == "mina"));
        assert_eq!(events[1].event, "update-study-time");
        assert_eq!(events[1].payload["studiedSecs"], 25 * 60);
    }

    #[test]
    fn restore_resumes_from_the_store() {
        let mut h = timed_up();
        h.controller.take_break(5, at(25)).unwrap();

        let mut revived = SessionController::restore(
            SessionOptions::default(),
            Box::new(h.store.clone()),
            Notifier::new(Box::new(h.player.clone())),
            Box::new(RecordingRoom::default()),
        );
        assert_eq!(revived.state(), h.controller.state());
        assert_eq!(revived.break_tick(at(31)), Outcome::Applied(Phase::BreakEnded));
    }

    #[test]
    fn break_without_focus_anchor_continues_fresh() {
        let store = MemoryStore::default();
        store.put_raw(
            r#"{"focusTask":"Essay","focusMinutes":45,"isBreakActive":true,"breakMinutes":5,
                "breakRemainingSeconds":1,"isTimeUp":true,"accumulatedStudyMs":2700000}"#,
        );
        let mut controller = SessionController::restore(
            SessionOptions::default(),
            Box::new(store.clone()),
            Notifier::silent(),
            Box::new(RecordingRoom::default()),
        );
        assert_eq!(controller.phase(), Phase::OnBreak);
        assert_eq!(controller.break_tick(t0()), Outcome::Applied(Phase::BreakEnded));
        assert!(controller.state().anchors_consistent());
        assert_eq!(controller.state().start_time, None);

        let reopened = SessionController::restore(
            SessionOptions::default(),
            Box::new(store.clone()),
            Notifier::silent(),
            Box::new(RecordingRoom::default()),
        );
        assert_eq!(reopened.phase(), Phase::BreakEnded);
        assert_eq!(reopened.state().accumulated_study_ms, 45 * MINUTE_MS);

        controller.continue_study(30, true, at(1)).unwrap();
        let state = controller.state();
        assert_eq!(state.phase, Phase::Focusing);
        assert_eq!(state.start_time, Some(at(1)));
        assert_eq!(state.focus_minutes, 30);
        assert_eq!(state.accumulated_study_ms, 45 * MINUTE_MS);
        assert_eq!(state.studied(at(11)), Duration::minutes(55));
    }

    #[test]
    fn status_reports_break_countdown() {
        let mut h = timed_up();
        h.controller.take_break(5, at(25)).unwrap();
        let status = h.controller.status(at(25) + Duration::seconds(61));
        assert_eq!(status.phase, Phase::OnBreak);
        assert_eq!(status.break_remaining_secs, Some(239));
        assert_eq!(status.studied_secs, 25 * 60);
        assert_eq!(status.remaining_secs, 0);
    }
}
