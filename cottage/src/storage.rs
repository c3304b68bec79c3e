use crate::session::{BreakConfig, Phase, SessionState, DEFAULT_FOCUS_MINUTES};
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

pub const SESSION_FILE: &str = "session.json";
const DEFAULT_BREAK_MINUTES: u32 = 5;

/// Durable home of the session snapshot.
///
/// `load` never fails: anything that cannot be turned back into a session
/// means there is nothing to resume.
pub trait SessionStore: Send {
    fn save(&self, state: &SessionState) -> Result<()>;
    fn load(&self) -> Option<SessionState>;
    fn clear(&self) -> Result<()>;
}

/// Per-user data directory, created on demand.
pub fn data_dir(override_dir: Option<&Path>) -> Result<PathBuf> {
    let dir = match override_dir {
        Some(dir) => dir.to_path_buf(),
        None => ProjectDirs::from("com", "cottage", "cottage")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?
            .data_dir()
            .to_path_buf(),
    };
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create data directory {:?}", dir))?;
    Ok(dir)
}

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(SESSION_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for JsonFileStore {
    fn save(&self, state: &SessionState) -> Result<()> {
        let json = encode(state)?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write session to {:?}", self.path))?;
        debug!(path = ?self.path, phase = ?state.phase, "session saved");
        Ok(())
    }

    fn load(&self) -> Option<SessionState> {
        if !self.path.exists() {
            return None;
        }
        match fs::read_to_string(&self.path) {
            Ok(json) => decode(&json),
            Err(e) => {
                warn!(path = ?self.path, "Failed to read session snapshot: {}", e);
                None
            }
        }
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to remove {:?}", self.path))
            }
        }
    }
}

/// Keeps the serialized snapshot in memory. Clones share the same slot.
#[derive(Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryStore {
    pub fn snapshot(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    pub fn put_raw(&self, json: impl Into<String>) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(json.into());
        }
    }
}

impl SessionStore for MemoryStore {
    fn save(&self, state: &SessionState) -> Result<()> {
        let json = encode(state)?;
        self.put_raw(json);
        Ok(())
    }

    fn load(&self) -> Option<SessionState> {
        decode(&self.snapshot()?)
    }

    fn clear(&self) -> Result<()> {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
        Ok(())
    }
}

/// On-disk layout. The `isBreakActive`/`showAlertModal`/`isTimeUp` flags
/// are what older snapshots carried instead of `phase`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionSnapshot {
    #[serde(default)]
    phase: Option<Phase>,
    #[serde(default)]
    focus_task: String,
    #[serde(default = "default_focus_minutes")]
    focus_minutes: u32,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    suspended_start_time: Option<String>,
    #[serde(default)]
    accumulated_study_ms: i64,
    #[serde(default)]
    interval_credited_ms: i64,
    #[serde(default)]
    is_break_active: bool,
    #[serde(default = "default_break_minutes")]
    break_minutes: u32,
    #[serde(default)]
    break_start_time: Option<String>,
    #[serde(default)]
    break_remaining_seconds: Option<i64>,
    #[serde(default)]
    show_alert_modal: bool,
    #[serde(default)]
    is_time_up: bool,
    #[serde(default)]
    is_time_up_notified: Option<bool>,
    #[serde(default = "default_true")]
    play_sound: bool,
}

fn default_focus_minutes() -> u32 {
    DEFAULT_FOCUS_MINUTES
}

fn default_break_minutes() -> u32 {
    DEFAULT_BREAK_MINUTES
}

fn default_true() -> bool {
    true
}

fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_time(raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    raw.map(|s| {
        DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .with_context(|| format!("invalid timestamp {:?}", s))
    })
    .transpose()
}

impl From<&SessionState> for SessionSnapshot {
    fn from(state: &SessionState) -> Self {
        let on_break = state.break_config.as_ref();
        Self {
            phase: Some(state.phase),
            focus_task: state.focus_task.clone(),
            focus_minutes: state.focus_minutes,
            start_time: state.start_time.map(format_time),
            suspended_start_time: state.suspended_start_time.map(format_time),
            accumulated_study_ms: state.accumulated_study_ms,
            interval_credited_ms: state.interval_credited_ms,
            is_break_active: state.phase == Phase::OnBreak,
            break_minutes: on_break.map_or(DEFAULT_BREAK_MINUTES, |b| b.break_minutes),
            break_start_time: on_break.and_then(|b| b.break_start_time).map(format_time),
            break_remaining_seconds: on_break.map(|b| b.break_remaining_seconds),
            show_alert_modal: state.phase == Phase::TimeUp,
            is_time_up: matches!(
                state.phase,
                Phase::TimeUp | Phase::OnBreak | Phase::BreakEnded
            ),
            is_time_up_notified: Some(state.is_time_up_notified),
            play_sound: state.play_sound,
        }
    }
}

impl SessionSnapshot {
    fn derived_phase(&self) -> Phase {
        if let Some(phase) = self.phase {
            return phase;
        }
        if self.is_break_active {
            Phase::OnBreak
        } else if self.start_time.is_none() {
            Phase::Idle
        } else if self.is_time_up && self.show_alert_modal {
            Phase::TimeUp
        } else if self.is_time_up {
            Phase::BreakEnded
        } else {
            Phase::Focusing
        }
    }

    fn into_state(self) -> Result<SessionState> {
        let phase = self.derived_phase();
        let mut start_time = parse_time(self.start_time.as_deref())?;
        let mut suspended_start_time = parse_time(self.suspended_start_time.as_deref())?;
        let break_start_time = parse_time(self.break_start_time.as_deref())?;

        if phase == Phase::OnBreak && suspended_start_time.is_none() {
            // Older snapshots kept the focus anchor in place during a break.
            suspended_start_time = start_time.take();
        }

        let break_config = (phase == Phase::OnBreak).then(|| BreakConfig {
            break_minutes: self.break_minutes,
            break_start_time,
            break_remaining_seconds: self
                .break_remaining_seconds
                .unwrap_or(i64::from(self.break_minutes) * 60),
        });

        if phase != Phase::Idle {
            anyhow::ensure!(!self.focus_task.trim().is_empty(), "active session without a task");
            anyhow::ensure!(self.focus_minutes > 0, "active session without a duration");
        }
        match phase {
            Phase::Focusing | Phase::TimeUp => {
                anyhow::ensure!(start_time.is_some(), "{:?} snapshot without startTime", phase)
            }
            // A break restored without its focus anchor ends unanchored.
            Phase::BreakEnded => {}
            Phase::OnBreak => {
                anyhow::ensure!(
                    break_start_time.is_some() || self.break_remaining_seconds.is_some(),
                    "break snapshot without a countdown"
                )
            }
            Phase::Idle => {
                start_time = None;
                suspended_start_time = None;
            }
        }

        Ok(SessionState {
            phase,
            focus_task: self.focus_task,
            focus_minutes: self.focus_minutes,
            play_sound: self.play_sound,
            start_time,
            suspended_start_time,
            accumulated_study_ms: self.accumulated_study_ms.max(0),
            interval_credited_ms: self.interval_credited_ms.max(0),
            break_config,
            is_time_up_notified: self.is_time_up_notified.unwrap_or(self.is_time_up),
        })
    }
}

pub fn encode(state: &SessionState) -> Result<String> {
    serde_json::to_string_pretty(&SessionSnapshot::from(state))
        .context("Failed to serialize session")
}

/// Parses a snapshot, logging and discarding anything unusable.
pub fn decode(json: &str) -> Option<SessionState> {
    let snapshot: SessionSnapshot = match serde_json::from_str(json) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!("Discarding unreadable session snapshot: {}", e);
            return None;
        }
    };
    match snapshot.into_state() {
        Ok(state) => Some(state),
        Err(e) => {
            warn!("Discarding invalid session snapshot: {:#}", e);
            None
        }
    }
}
