use crate::ambience::Weather;
use crate::notify::{DesktopSound, Notifier, Silent, SoundPlayer, TerminalBell};
use crate::session::SessionOptions;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use ratatui::style::Color;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub theme: Theme,
    pub icons: Icons,
    pub session: SessionSettings,
    pub notifications: NotificationSettings,
    pub ambience: AmbienceSettings,
    pub room: RoomSettings,
    pub storage: StorageSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Theme {
    #[serde(deserialize_with = "hex_to_color")]
    pub background: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub foreground: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub selection: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub black: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub red: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub green: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub yellow: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub blue: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub magenta: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub cyan: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub gray: Color,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Icons {
    pub focus: String,
    pub rest: String,
    pub alert: String,
    pub recent: String,
    pub select: String,
    pub sound_on: String,
    pub sound_off: String,
    pub input_cursor: String,
    pub separator: String,
    pub header_left: String,
    pub header_right: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionSettings {
    pub default_focus_minutes: u32,
    pub default_extend_minutes: u32,
    pub default_break_minutes: u32,
    pub play_sound: bool,
    /// Keep studied time across extends and continues.
    pub accumulate: bool,
    pub tick_millis: u64,
    /// Hide key hints after this many seconds without input.
    pub idle_seconds: u64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlayerKind {
    #[default]
    Desktop,
    Bell,
    Silent,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct NotificationSettings {
    pub player: PlayerKind,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AmbienceSettings {
    pub weather: Weather,
    pub fireplace: bool,
    pub theme_name: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct RoomSettings {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct StorageSettings {
    pub data_dir: Option<PathBuf>,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: Color::Rgb(9, 14, 19),
            foreground: Color::Rgb(197, 201, 199),
            selection: Color::Rgb(230, 195, 132),
            black: Color::Rgb(13, 12, 12),
            red: Color::Rgb(228, 104, 118),
            green: Color::Rgb(138, 154, 123),
            yellow: Color::Rgb(196, 178, 138),
            blue: Color::Rgb(127, 180, 202),
            magenta: Color::Rgb(162, 146, 163),
            cyan: Color::Rgb(122, 168, 159),
            gray: Color::Rgb(164, 167, 164),
        }
    }
}

impl Default for Icons {
    fn default() -> Self {
        Self {
            focus: "✎".to_string(),
            rest: "☕".to_string(),
            alert: "⏰".to_string(),
            recent: "↺".to_string(),
            select: "▸".to_string(),
            sound_on: "♪".to_string(),
            sound_off: "∅".to_string(),
            input_cursor: "▊".to_string(),
            separator: "│".to_string(),
            header_left: "⟪ ".to_string(),
            header_right: " ⟫".to_string(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            default_focus_minutes: 60,
            default_extend_minutes: 15,
            default_break_minutes: 5,
            play_sound: true,
            accumulate: true,
            tick_millis: 1000,
            idle_seconds: 3,
        }
    }
}

impl Default for AmbienceSettings {
    fn default() -> Self {
        Self {
            weather: Weather::Clear,
            fireplace: true,
            theme_name: "cottage".to_string(),
        }
    }
}

impl Config {
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            accumulate: self.session.accumulate,
            room_id: self.room.id.clone().filter(|id| !id.trim().is_empty()),
        }
    }

    pub fn notifier(&self) -> Notifier {
        let player: Box<dyn SoundPlayer> = match self.notifications.player {
            PlayerKind::Desktop => Box::new(DesktopSound),
            PlayerKind::Bell => Box::new(TerminalBell),
            PlayerKind::Silent => Box::new(Silent),
        };
        Notifier::new(player)
    }
}

fn hex_to_color<'de, D>(deserializer: D) -> Result<Color, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = serde::Deserialize::deserialize(deserializer)?;
    if !s.is_ascii() || !s.starts_with('#') || s.len() != 7 {
        return Err(serde::de::Error::custom("invalid hex color format"));
    }
    let r = u8::from_str_radix(&s[1..3], 16).map_err(serde::de::Error::custom)?;
    let g = u8::from_str_radix(&s[3..5], 16).map_err(serde::de::Error::custom)?;
    let b = u8::from_str_radix(&s[5..7], 16).map_err(serde::de::Error::custom)?;
    Ok(Color::Rgb(r, g, b))
}

pub fn parse_config(config_str: &str) -> Result<Config> {
    let config: Config = toml::from_str(config_str)?;
    anyhow::ensure!(
        config.session.default_focus_minutes > 0
            && config.session.default_extend_minutes > 0
            && config.session.default_break_minutes > 0,
        "session durations must be at least one minute"
    );
    anyhow::ensure!(config.session.tick_millis > 0, "tick_millis must be positive");
    Ok(config)
}

pub fn load_config() -> Result<Config> {
    match ProjectDirs::from("com", "cottage", "Cottage") {
        Some(proj_dirs) => {
            let path = proj_dirs.config_dir().join("cottage.toml");
            if path.exists() {
                let config_str = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file at {:?}", path))?;
                parse_config(&config_str)
                    .with_context(|| format!("Failed to parse config file at {:?}", path))
            } else {
                Ok(Config::default())
            }
        }
        None => Ok(Config::default()),
    }
}
