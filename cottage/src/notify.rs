//! Time-up and break-end signals.
//!
//! Whether a signal is due is decided by the session state machine; this
//! module only plays it and makes sure a failing player never reaches the
//! caller.

use anyhow::{Context, Result};
use std::io::Write;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alert {
    TimeUp,
    BreakEnd,
}

impl Alert {
    fn summary(self) -> &'static str {
        match self {
            Alert::TimeUp => "Time's up",
            Alert::BreakEnd => "Break is over",
        }
    }

    fn body(self) -> &'static str {
        match self {
            Alert::TimeUp => "Extend, take a break, or finish the session.",
            Alert::BreakEnd => "Ready to get back to it?",
        }
    }
}

/// Something that can make a noise. Fire-and-forget from the caller's view.
pub trait SoundPlayer: Send {
    fn play(&self, alert: Alert) -> Result<()>;
}

/// Desktop notification with the freedesktop "message" sound.
pub struct DesktopSound;

impl SoundPlayer for DesktopSound {
    fn play(&self, alert: Alert) -> Result<()> {
        notify_rust::Notification::new()
            .summary(alert.summary())
            .body(alert.body())
            .appname("cottage")
            .sound_name("message-new-instant")
            .show()
            .context("Failed to show desktop notification")?;
        Ok(())
    }
}

/// Rings the terminal bell.
pub struct TerminalBell;

impl SoundPlayer for TerminalBell {
    fn play(&self, _alert: Alert) -> Result<()> {
        let mut stdout = std::io::stdout();
        stdout.write_all(b"\x07").context("Failed to ring terminal bell")?;
        stdout.flush()?;
        Ok(())
    }
}

pub struct Silent;

impl SoundPlayer for Silent {
    fn play(&self, _alert: Alert) -> Result<()> {
        Ok(())
    }
}

pub struct Notifier {
    player: Box<dyn SoundPlayer>,
}

impl Notifier {
    pub fn new(player: Box<dyn SoundPlayer>) -> Self {
        Self { player }
    }

    pub fn silent() -> Self {
        Self::new(Box::new(Silent))
    }

    pub fn maybe_notify(&self, alert: Alert, play_sound: bool) {
        if !play_sound {
            debug!(?alert, "sound disabled, skipping notification");
            return;
        }
        if let Err(e) = self.player.play(alert) {
            warn!(?alert, "Failed to play notification sound: {:#}", e);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingPlayer;
    use super::*;

    #[test]
    fn muted_sessions_do_not_reach_the_player() {
        let player = RecordingPlayer::default();
        let notifier = Notifier::new(Box::new(player.clone()));
        notifier.maybe_notify(Alert::TimeUp, false);
        assert_eq!(player.count(Alert::TimeUp), 0);
        notifier.maybe_notify(Alert::TimeUp, true);
        assert_eq!(player.count(Alert::TimeUp), 1);
    }

    #[test]
    fn player_failures_are_swallowed() {
        let player = RecordingPlayer {
            fail: true,
            ..Default::default()
        };
        let notifier = Notifier::new(Box::new(player.clone()));
        notifier.maybe_notify(Alert::BreakEnd, true);
        assert_eq!(player.count(Alert::BreakEnd), 1);
    }
}
