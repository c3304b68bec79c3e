//! The scenery around the desk. Purely decorative: nothing here feeds back
//! into the session.

use chrono::{DateTime, Local, Timelike};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOfDay {
    Day,
    Night,
}

impl TimeOfDay {
    pub fn from_hour(hour: u32) -> Self {
        if (6..18).contains(&hour) {
            TimeOfDay::Day
        } else {
            TimeOfDay::Night
        }
    }

    pub fn at(now: DateTime<Local>) -> Self {
        Self::from_hour(now.hour())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weather {
    #[default]
    Clear,
    Rainy,
    Snowy,
}

impl Weather {
    pub fn next(self) -> Self {
        match self {
            Weather::Clear => Weather::Rainy,
            Weather::Rainy => Weather::Snowy,
            Weather::Snowy => Weather::Clear,
        }
    }
}

/// Inputs of the ambient scene renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scene {
    pub time_of_day: TimeOfDay,
    pub weather: Weather,
    pub has_fireplace: bool,
    pub theme: String,
}

impl Scene {
    pub fn cycle_weather(&mut self) {
        self.weather = self.weather.next();
    }

    pub fn toggle_fireplace(&mut self) {
        self.has_fireplace = !self.has_fireplace;
    }

    pub fn describe(&self) -> String {
        let sky = match (self.time_of_day, self.weather) {
            (TimeOfDay::Day, Weather::Clear) => "☀ sunny",
            (TimeOfDay::Night, Weather::Clear) => "☾ starry",
            (_, Weather::Rainy) => "☂ rain",
            (_, Weather::Snowy) => "❄ snow",
        };
        let fire = if self.has_fireplace { " · 🔥" } else { "" };
        format!("{} · {}{}", sky, self.theme, fire)
    }
}
