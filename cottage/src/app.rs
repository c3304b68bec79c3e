use crate::ambience::{Scene, TimeOfDay};
use crate::config::Config;
use crate::profile::{Profile, ProfileStore};
use crate::session::{Outcome, Phase, SessionConfig, SessionController, SessionError};
use chrono::{DateTime, Local, Utc};
use cottage_ipc::{Command, Response};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::time::{Duration as StdDuration, Instant};
use tracing::{info, warn};

pub const EXTEND_CHOICES: [u32; 5] = [5, 10, 15, 30, 60];
pub const BREAK_CHOICES: [u32; 4] = [5, 10, 15, 30];
pub const CONTINUE_CHOICES: [u32; 6] = [15, 30, 45, 60, 90, 120];

#[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
pub enum AppMode {
    #[default]
    Normal,
    ShowStats,
    ShowHelp,
}

#[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
pub enum FormField {
    #[default]
    Task,
    Minutes,
    Sound,
}

impl FormField {
    fn next(self) -> Self {
        match self {
            FormField::Task => FormField::Minutes,
            FormField::Minutes => FormField::Sound,
            FormField::Sound => FormField::Task,
        }
    }
}

/// The "what are you focusing on" form shown while idle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WelcomeForm {
    pub task: String,
    pub minutes: String,
    pub play_sound: bool,
    pub field: FormField,
    pub selected_recent: Option<usize>,
    pub error: Option<String>,
}

/// Picks the neighbouring choice, snapping unknown values to the list.
fn step(choices: &[u32], current: u32, forward: bool) -> u32 {
    let idx = choices
        .iter()
        .position(|&c| c >= current)
        .unwrap_or(choices.len() - 1);
    let idx = match (forward, choices.get(idx) == Some(&current)) {
        (true, true) => (idx + 1).min(choices.len() - 1),
        (true, false) => idx,
        (false, _) => idx.saturating_sub(1),
    };
    choices[idx]
}

pub struct App {
    pub session: SessionController,
    pub profile: Profile,
    profile_store: Option<ProfileStore>,
    pub config: Config,
    pub scene: Scene,
    pub mode: AppMode,
    pub form: WelcomeForm,
    pub extend_minutes: u32,
    pub break_minutes: u32,
    pub continue_minutes: u32,
    pub add_to_existing: bool,
    last_input: Instant,
    pub should_quit: bool,
}

impl App {
    pub fn new(
        config: Config,
        session: SessionController,
        profile: Profile,
        profile_store: Option<ProfileStore>,
    ) -> Self {
        let scene = Scene {
            time_of_day: TimeOfDay::at(Local::now()),
            weather: config.ambience.weather,
            has_fireplace: config.ambience.fireplace,
            theme: config.ambience.theme_name.clone(),
        };
        let mut app = Self {
            session,
            profile,
            profile_store,
            scene,
            mode: AppMode::Normal,
            form: WelcomeForm::default(),
            extend_minutes: config.session.default_extend_minutes,
            break_minutes: config.session.default_break_minutes,
            continue_minutes: config.session.default_focus_minutes,
            add_to_existing: true,
            last_input: Instant::now(),
            should_quit: false,
            config,
        };
        app.reset_form();
        app
    }

    pub fn reset_form(&mut self) {
        let prefs = &self.profile.preferences;
        let (minutes, play_sound) = if prefs.last_task.is_empty() {
            (
                self.config.session.default_focus_minutes,
                self.config.session.play_sound,
            )
        } else {
            (prefs.last_minutes, prefs.play_sound)
        };
        self.form = WelcomeForm {
            task: prefs.last_task.clone(),
            minutes: minutes.to_string(),
            play_sound,
            ..WelcomeForm::default()
        };
    }

    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    pub fn touch(&mut self, at: Instant) {
        self.last_input = at;
    }

    pub fn controls_visible(&self, at: Instant) -> bool {
        self.phase() == Phase::Idle
            || at.duration_since(self.last_input)
                < StdDuration::from_secs(self.config.session.idle_seconds)
    }

    pub fn on_tick(&mut self, now: DateTime<Utc>) {
        self.scene.time_of_day = TimeOfDay::at(now.with_timezone(&Local));
        match self.phase() {
            Phase::Focusing => {
                self.session.tick(now);
            }
            Phase::OnBreak => {
                if self.session.break_tick(now) == Outcome::Applied(Phase::BreakEnded) {
                    self.continue_minutes = self.config.session.default_focus_minutes;
                }
            }
            _ => {}
        }
    }

    /// Starts a session, first recording any time banked by a session that
    /// was restarted or left after a break.
    pub fn begin(
        &mut self,
        config: SessionConfig,
        now: DateTime<Utc>,
    ) -> Result<Outcome, SessionError> {
        config.validate()?;
        if self.phase() == Phase::Idle && self.session.state().accumulated_study_ms > 0 {
            self.finish(now);
        }
        let outcome = self.session.start(config.clone(), now)?;
        if outcome != Outcome::Unchanged {
            self.profile.preferences.remember(
                config.focus_task.trim(),
                config.focus_minutes,
                config.play_sound,
            );
            self.save_profile();
        }
        Ok(outcome)
    }

    pub fn confirm_welcome(&mut self, now: DateTime<Utc>) {
        let minutes = match self.form.minutes.trim().parse::<u32>() {
            Ok(minutes) => minutes,
            Err(_) => {
                self.form.error = Some("minutes must be a whole number".to_string());
                return;
            }
        };
        let config = SessionConfig::new(self.form.task.clone(), minutes, self.form.play_sound);
        match self.begin(config, now) {
            Ok(_) => self.form.error = None,
            Err(e) => self.form.error = Some(e.to_string()),
        }
    }

    /// Ends the session and books its study time.
    pub fn finish(&mut self, now: DateTime<Utc>) {
        let studied = self.session.finish(now);
        self.profile
            .stats
            .record(studied, now.with_timezone(&Local));
        self.save_profile();
        self.reset_form();
        info!(summary = %self.profile.stats.summary(), "study time recorded");
    }

    pub fn select_recent(&mut self, forward: bool) {
        let recent = &self.profile.preferences.recent_tasks;
        if recent.is_empty() {
            return;
        }
        let idx = match (self.form.selected_recent, forward) {
            (None, _) => 0,
            (Some(i), true) => (i + 1).min(recent.len() - 1),
            (Some(i), false) => i.saturating_sub(1),
        };
        self.form.selected_recent = Some(idx);
        self.form.task = recent[idx].clone();
    }

    pub fn forget_selected_recent(&mut self) {
        let Some(idx) = self.form.selected_recent else {
            return;
        };
        if let Some(task) = self.profile.preferences.recent_tasks.get(idx).cloned() {
            self.profile.preferences.forget(&task);
            self.save_profile();
        }
        let remaining = self.profile.preferences.recent_tasks.len();
        self.form.selected_recent = (remaining > 0).then(|| idx.min(remaining - 1));
    }

    /// Moves the weekly goal by whole hours, between one hour and a full week.
    pub fn adjust_weekly_goal(&mut self, delta_hours: i64) {
        let hours = (self.profile.stats.weekly_goal_secs / 3600 + delta_hours).clamp(1, 168);
        self.profile.stats.set_weekly_goal_hours(hours as u32);
        self.save_profile();
    }

    fn save_profile(&self) {
        if let Some(store) = &self.profile_store {
            if let Err(e) = store.save(&self.profile) {
                warn!("Failed to save profile: {:#}", e);
            }
        }
    }

    /// Applies a command that arrived over IPC.
    pub fn handle_command(&mut self, command: Command, now: DateTime<Utc>) -> Response {
        let before = self.phase();
        let result = match command {
            Command::Start {
                task,
                minutes,
                play_sound,
            } => self.begin(SessionConfig::new(task, minutes, play_sound), now),
            Command::Extend { minutes } => self.session.extend(minutes, now),
            Command::Break { minutes } => self.session.take_break(minutes, now),
            Command::SkipBreak => Ok(self.session.skip_break(now)),
            Command::Continue {
                minutes,
                add_to_existing,
            } => self.session.continue_study(minutes, add_to_existing, now),
            Command::CancelContinue => Ok(self.session.cancel_continue(now)),
            Command::Restart => Ok(self.session.restart(now)),
            Command::Finish => {
                self.finish(now);
                Ok(Outcome::Applied(Phase::Idle))
            }
            Command::Status => return Response::Status(self.session.status(now)),
            Command::Subscribe => {
                return Response::Error("subscriptions are served by the socket".to_string())
            }
        };
        if before != Phase::Idle && self.phase() == Phase::Idle {
            self.reset_form();
        }
        match result {
            Ok(Outcome::Applied(_)) => Response::Ok,
            Ok(Outcome::Unchanged) => Response::Ignored,
            Err(e) => Response::Rejected(e.to_string()),
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: DateTime<Utc>) {
        self.touch(Instant::now());
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }
        if self.mode != AppMode::Normal {
            match key.code {
                KeyCode::Esc | KeyCode::Char('q' | '?' | 's') => self.mode = AppMode::Normal,
                KeyCode::Char('+' | '=') if self.mode == AppMode::ShowStats => {
                    self.adjust_weekly_goal(1)
                }
                KeyCode::Char('-') if self.mode == AppMode::ShowStats => {
                    self.adjust_weekly_goal(-1)
                }
                _ => {}
            }
            return;
        }
        match self.phase() {
            Phase::Idle => self.handle_welcome_key(key, now),
            Phase::Focusing => self.handle_focus_key(key, now),
            Phase::TimeUp => self.handle_time_up_key(key, now),
            Phase::OnBreak => self.handle_break_key(key, now),
            Phase::BreakEnded => self.handle_break_ended_key(key, now),
        }
    }

    fn handle_welcome_key(&mut self, key: KeyEvent, now: DateTime<Utc>) {
        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Enter => self.confirm_welcome(now),
            KeyCode::Tab => self.form.field = self.form.field.next(),
            KeyCode::Up => self.select_recent(false),
            KeyCode::Down => self.select_recent(true),
            KeyCode::Delete => self.forget_selected_recent(),
            KeyCode::Backspace => match self.form.field {
                FormField::Task => {
                    self.form.task.pop();
                }
                FormField::Minutes => {
                    self.form.minutes.pop();
                }
                FormField::Sound => {}
            },
            KeyCode::Char(c) => match self.form.field {
                FormField::Task => self.form.task.push(c),
                FormField::Minutes if c.is_ascii_digit() => self.form.minutes.push(c),
                FormField::Sound if c == ' ' => self.form.play_sound = !self.form.play_sound,
                _ => {}
            },
            _ => {}
        }
    }

    fn handle_common_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.mode = AppMode::ShowHelp,
            KeyCode::Char('s') => self.mode = AppMode::ShowStats,
            KeyCode::Char('w') => self.scene.cycle_weather(),
            KeyCode::Char('p') => self.scene.toggle_fireplace(),
            _ => return false,
        }
        true
    }

    fn handle_focus_key(&mut self, key: KeyEvent, now: DateTime<Utc>) {
        if self.handle_common_key(key) {
            return;
        }
        if key.code == KeyCode::Char('r') {
            self.session.restart(now);
            self.reset_form();
        }
    }

    fn handle_time_up_key(&mut self, key: KeyEvent, now: DateTime<Utc>) {
        if self.handle_common_key(key) {
            return;
        }
        let result = match key.code {
            KeyCode::Left => {
                self.extend_minutes = step(&EXTEND_CHOICES, self.extend_minutes, false);
                return;
            }
            KeyCode::Right => {
                self.extend_minutes = step(&EXTEND_CHOICES, self.extend_minutes, true);
                return;
            }
            KeyCode::Down => {
                self.break_minutes = step(&BREAK_CHOICES, self.break_minutes, false);
                return;
            }
            KeyCode::Up => {
                self.break_minutes = step(&BREAK_CHOICES, self.break_minutes, true);
                return;
            }
            KeyCode::Char('e') => self.session.extend(self.extend_minutes, now),
            KeyCode::Char('b') => self.session.take_break(self.break_minutes, now),
            KeyCode::Char('f') => {
                self.finish(now);
                return;
            }
            _ => return,
        };
        if let Err(e) = result {
            warn!("time-up action rejected: {}", e);
        }
    }

    fn handle_break_key(&mut self, key: KeyEvent, now: DateTime<Utc>) {
        if self.handle_common_key(key) {
            return;
        }
        match key.code {
            KeyCode::Char('k') => {
                self.session.skip_break(now);
                self.continue_minutes = self.config.session.default_focus_minutes;
            }
            KeyCode::Char('r') => {
                self.session.restart(now);
                self.reset_form();
            }
            _ => {}
        }
    }

    fn handle_break_ended_key(&mut self, key: KeyEvent, now: DateTime<Utc>) {
        match key.code {
            KeyCode::Left | KeyCode::Char('-') => {
                self.continue_minutes = step(&CONTINUE_CHOICES, self.continue_minutes, false);
            }
            KeyCode::Right | KeyCode::Char('+') => {
                self.continue_minutes = step(&CONTINUE_CHOICES, self.continue_minutes, true);
            }
            KeyCode::Char('a') => self.add_to_existing = !self.add_to_existing,
            KeyCode::Enter => {
                if let Err(e) =
                    self.session
                        .continue_study(self.continue_minutes, self.add_to_existing, now)
                {
                    warn!("continue rejected: {}", e);
                }
            }
            KeyCode::Esc => {
                self.session.cancel_continue(now);
                self.reset_form();
            }
            KeyCode::Char('q') => self.should_quit = true,
            _ => {}
        }
    }
}
