//! What outlives a single session: welcome-form defaults, recently used
//! tasks and study statistics.

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const PROFILE_FILE: &str = "profile.json";
pub const MAX_RECENT_TASKS: usize = 5;
const DEFAULT_WEEKLY_GOAL_SECS: i64 = 10 * 60 * 60;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub preferences: Preferences,
    pub stats: StudyStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub last_task: String,
    pub last_minutes: u32,
    pub play_sound: bool,
    pub recent_tasks: Vec<String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            last_task: String::new(),
            last_minutes: crate::session::DEFAULT_FOCUS_MINUTES,
            play_sound: true,
            recent_tasks: vec![],
        }
    }
}

impl Preferences {
    /// Remembers what the welcome form was confirmed with.
    pub fn remember(&mut self, task: &str, minutes: u32, play_sound: bool) {
        self.last_task = task.to_string();
        self.last_minutes = minutes;
        self.play_sound = play_sound;
        if !task.trim().is_empty() && !self.recent_tasks.iter().any(|t| t == task) {
            self.recent_tasks.insert(0, task.to_string());
            self.recent_tasks.truncate(MAX_RECENT_TASKS);
        }
    }

    pub fn forget(&mut self, task: &str) {
        self.recent_tasks.retain(|t| t != task);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyStats {
    pub total_study_secs: i64,
    /// Sunday first.
    pub weekly_secs: [i64; 7],
    pub weekly_goal_secs: i64,
    pub week_start: Option<NaiveDate>,
    pub last_active: Option<NaiveDate>,
    pub daily_streak: u32,
    pub sessions_completed: u32,
}

impl Default for StudyStats {
    fn default() -> Self {
        Self {
            total_study_secs: 0,
            weekly_secs: [0; 7],
            weekly_goal_secs: DEFAULT_WEEKLY_GOAL_SECS,
            week_start: None,
            last_active: None,
            daily_streak: 0,
            sessions_completed: 0,
        }
    }
}

fn sunday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

impl StudyStats {
    pub fn record(&mut self, studied: Duration, at: DateTime<Local>) {
        let secs = studied.num_seconds();
        if secs <= 0 {
            return;
        }
        let today = at.date_naive();
        let week = sunday_of(today);
        if self.week_start != Some(week) {
            self.weekly_secs = [0; 7];
            self.week_start = Some(week);
        }

        self.total_study_secs += secs;
        self.weekly_secs[today.weekday().num_days_from_sunday() as usize] += secs;
        self.sessions_completed += 1;

        match self.last_active {
            Some(last) if last == today => {}
            Some(last) if today.signed_duration_since(last).num_days() == 1 => {
                self.daily_streak += 1;
            }
            _ => self.daily_streak = 1,
        }
        self.last_active = Some(today);
    }

    pub fn weekly_total_secs(&self) -> i64 {
        self.weekly_secs.iter().sum()
    }

    /// Percentage of the weekly goal reached, capped at 100.
    pub fn weekly_progress(&self) -> u16 {
        if self.weekly_goal_secs <= 0 {
            return 100;
        }
        let percent = self.weekly_total_secs() * 100 / self.weekly_goal_secs;
        percent.clamp(0, 100) as u16
    }

    pub fn set_weekly_goal_hours(&mut self, hours: u32) {
        self.weekly_goal_secs = i64::from(hours.max(1)) * 3600;
    }

    pub fn summary(&self) -> String {
        format!(
            "total {}h{:02}m | week {}% of {}h | streak {}d",
            self.total_study_secs / 3600,
            (self.total_study_secs % 3600) / 60,
            self.weekly_progress(),
            self.weekly_goal_secs / 3600,
            self.daily_streak
        )
    }
}

pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(PROFILE_FILE),
        }
    }

    pub fn save(&self, profile: &Profile) -> Result<()> {
        let json = serde_json::to_string_pretty(profile)?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write profile to {:?}", self.path))?;
        Ok(())
    }

    /// A damaged profile is replaced by defaults rather than blocking startup.
    pub fn load(&self) -> Profile {
        if !self.path.exists() {
            return Profile::default();
        }
        let parsed = fs::read_to_string(&self.path)
            .context("Failed to read profile")
            .and_then(|json| serde_json::from_str(&json).context("Failed to parse profile"));
        match parsed {
            Ok(profile) => profile,
            Err(e) => {
                warn!(path = ?self.path, "{:#}", e);
                Profile::default()
            }
        }
    }
}
