use crate::app::{App, AppMode, FormField};
use crate::clock::{format_hms, format_ms};
use crate::session::Phase;
use chrono::{DateTime, Duration, Utc};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Gauge, List, ListItem, Paragraph},
    Frame,
};
use std::time::Instant;

pub fn draw(f: &mut Frame, app: &App, now: DateTime<Utc>, at: Instant) {
    let area = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(7),
            Constraint::Length(3),
        ])
        .split(area);

    draw_header(f, chunks[0], app);
    draw_desk(f, chunks[1], app, now);
    draw_status_bar(f, chunks[2], app, at);

    match app.phase() {
        Phase::Idle => draw_welcome_overlay(f, app),
        Phase::TimeUp => draw_time_up_overlay(f, app, now),
        Phase::BreakEnded => draw_break_ended_overlay(f, app),
        _ => {}
    }
    match app.mode {
        AppMode::ShowStats => draw_stats_overlay(f, app),
        AppMode::ShowHelp => draw_help_overlay(f, app),
        AppMode::Normal => {}
    }
}

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.config.theme;
    let icons = &app.config.icons;
    let text = Line::from(vec![
        Span::raw(icons.header_left.clone()),
        Span::styled(
            "COTTAGE",
            Style::default().fg(theme.blue).add_modifier(Modifier::BOLD),
        ),
        Span::raw(icons.header_right.clone()),
        Span::styled(
            format!("  {}", app.scene.describe()),
            Style::default().fg(theme.gray),
        ),
    ]);
    f.render_widget(
        Paragraph::new(text).alignment(Alignment::Center).block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_style(Style::default().fg(theme.black)),
        ),
        area,
    );
}

/// The main panel: study clock while focusing, countdown while on break.
fn draw_desk(f: &mut Frame, area: Rect, app: &App, now: DateTime<Utc>) {
    let theme = &app.config.theme;
    let icons = &app.config.icons;
    let state = app.session.state();
    let on_break = app.phase() == Phase::OnBreak;
    let (icon, title, color) = if on_break {
        (&icons.rest, "Break", theme.yellow)
    } else {
        (&icons.focus, "Focus", theme.green)
    };
    let block = Block::default()
        .title(Span::styled(
            format!(" {} {} ", icon, title),
            Style::default().fg(theme.gray),
        ))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(color));
    let inner_area = block.inner(area);
    f.render_widget(block, area);

    let v_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(inner_area);

    let task = if state.focus_task.is_empty() {
        "-".to_string()
    } else {
        state.focus_task.clone()
    };
    f.render_widget(
        Paragraph::new(task)
            .style(Style::default().fg(theme.foreground))
            .alignment(Alignment::Center),
        v_chunks[0],
    );

    let studied = format!("studied {}", format_hms(state.studied(now)));
    f.render_widget(
        Paragraph::new(studied)
            .style(
                Style::default()
                    .fg(theme.foreground)
                    .add_modifier(Modifier::BOLD),
            )
            .alignment(Alignment::Center),
        v_chunks[1],
    );

    if on_break {
        let remaining = state.break_remaining(now).unwrap_or(0);
        let total = state
            .break_config
            .as_ref()
            .map_or(1, |b| i64::from(b.break_minutes) * 60)
            .max(1);
        f.render_widget(
            Paragraph::new(format!("back in {}", format_ms(remaining)))
                .style(Style::default().fg(theme.yellow))
                .alignment(Alignment::Center),
            v_chunks[2],
        );
        let percent = ((total - remaining).clamp(0, total) * 100 / total) as u16;
        f.render_widget(
            Gauge::default()
                .gauge_style(Style::default().fg(theme.yellow).bg(theme.black))
                .percent(percent),
            v_chunks[3],
        );
        return;
    }

    if let Some(reading) = state.focus_reading(now) {
        f.render_widget(
            Paragraph::new(format!(
                "{} left of {}m",
                format_hms(reading.remaining),
                state.focus_minutes
            ))
            .style(Style::default().fg(theme.cyan))
            .alignment(Alignment::Center),
            v_chunks[2],
        );
        f.render_widget(
            Gauge::default()
                .gauge_style(Style::default().fg(theme.blue).bg(theme.black))
                .percent((crate::clock::progress(&reading) * 100.0) as u16),
            v_chunks[3],
        );
    } else if state.accumulated_study_ms > 0 {
        f.render_widget(
            Paragraph::new("banked, booked when the next session starts")
                .style(Style::default().fg(theme.gray))
                .alignment(Alignment::Center),
            v_chunks[2],
        );
    }
}

fn draw_status_bar(f: &mut Frame, area: Rect, app: &App, at: Instant) {
    let theme = &app.config.theme;
    let (mode_text, mode_color) = match app.mode {
        AppMode::ShowStats => ("STATS", theme.magenta),
        AppMode::ShowHelp => ("HELP", theme.magenta),
        AppMode::Normal => match app.phase() {
            Phase::Idle => ("WELCOME", theme.blue),
            Phase::Focusing => ("FOCUS", theme.green),
            Phase::TimeUp => ("TIME UP", theme.red),
            Phase::OnBreak => ("BREAK", theme.yellow),
            Phase::BreakEnded => ("CONTINUE?", theme.cyan),
        },
    };
    let hints: &[&str] = match app.mode {
        AppMode::ShowStats => &["+/-:weekly goal", "esc:close"],
        AppMode::ShowHelp => &["esc:close"],
        AppMode::Normal if !app.controls_visible(at) => &[],
        AppMode::Normal => match app.phase() {
            Phase::Idle => &[
                "tab:field",
                "↑/↓:recent",
                "del:forget",
                "enter:start",
                "esc:quit",
            ],
            Phase::Focusing => &[
                "r:restart",
                "w:weather",
                "p:fireplace",
                "s:stats",
                "?:help",
                "q:quit",
            ],
            Phase::TimeUp => &["←/→:extend", "↑/↓:break", "e:extend", "b:break", "f:finish"],
            Phase::OnBreak => &["k:skip", "r:restart", "w:weather", "p:fireplace", "q:quit"],
            Phase::BreakEnded => &["←/→:minutes", "a:add", "enter:continue", "esc:stop"],
        },
    };
    let separator = format!(" {} ", app.config.icons.separator);
    let help = hints.join(separator.as_str());
    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(
                format!(" {} ", mode_text),
                Style::default()
                    .bg(mode_color)
                    .fg(theme.background)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
            Span::raw(help),
        ]))
        .block(Block::default().style(Style::default().bg(theme.black).fg(theme.gray))),
        area,
    );
}

fn overlay_block<'a>(title: String, app: &App, color: ratatui::style::Color) -> Block<'a> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .border_type(BorderType::Double)
        .style(Style::default().bg(app.config.theme.background))
}

fn draw_welcome_overlay(f: &mut Frame, app: &App) {
    let theme = &app.config.theme;
    let icons = &app.config.icons;
    let form = &app.form;
    let area = centered_rect(60, 70, f.area());
    f.render_widget(Clear, area);
    let block = overlay_block(" What are you studying? ".to_string(), app, theme.yellow);
    let inner_area = block.inner(area);
    f.render_widget(block, area);

    let field_style = |field: FormField| {
        if form.field == field {
            Style::default().fg(theme.selection).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.gray)
        }
    };
    let cursor = |field: FormField| {
        if form.field == field {
            Span::styled(
                icons.input_cursor.clone(),
                Style::default()
                    .fg(theme.foreground)
                    .add_modifier(Modifier::SLOW_BLINK),
            )
        } else {
            Span::raw("")
        }
    };
    let sound = if form.play_sound {
        format!("{} on", icons.sound_on)
    } else {
        format!("{} off", icons.sound_off)
    };

    let mut lines = vec![
        Line::from(vec![
            Span::styled("task    ", field_style(FormField::Task)),
            Span::styled(form.task.clone(), Style::default().fg(theme.foreground)),
            cursor(FormField::Task),
        ]),
        Line::from(vec![
            Span::styled("minutes ", field_style(FormField::Minutes)),
            Span::styled(form.minutes.clone(), Style::default().fg(theme.foreground)),
            cursor(FormField::Minutes),
        ]),
        Line::from(vec![
            Span::styled("sound   ", field_style(FormField::Sound)),
            Span::styled(sound, Style::default().fg(theme.foreground)),
        ]),
    ];
    let banked = app.session.state().accumulated_study_ms;
    if banked > 0 {
        lines.push(Line::from(Span::styled(
            format!(
                "banked {} from the last session",
                format_hms(Duration::milliseconds(banked))
            ),
            Style::default().fg(theme.cyan),
        )));
    }
    if let Some(error) = &form.error {
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(theme.red),
        )));
    }
    lines.push(Line::from(""));

    let recent = &app.profile.preferences.recent_tasks;
    if !recent.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("{} recent", icons.recent),
            Style::default().fg(theme.gray),
        )));
        for (i, task) in recent.iter().enumerate() {
            let selected = form.selected_recent == Some(i);
            lines.push(Line::from(vec![
                if selected {
                    Span::styled(icons.select.clone(), Style::default().fg(theme.selection))
                } else {
                    Span::raw(" ")
                },
                Span::raw(" "),
                Span::styled(
                    task.clone(),
                    if selected {
                        Style::default().fg(theme.selection)
                    } else {
                        Style::default().fg(theme.foreground)
                    },
                ),
            ]));
        }
    }
    f.render_widget(Paragraph::new(lines), inner_area);
}

fn draw_time_up_overlay(f: &mut Frame, app: &App, now: DateTime<Utc>) {
    let theme = &app.config.theme;
    let area = centered_rect(50, 40, f.area());
    f.render_widget(Clear, area);
    let block = overlay_block(
        format!(" {} Time's up ", app.config.icons.alert),
        app,
        theme.red,
    );
    let inner_area = block.inner(area);
    f.render_widget(block, area);
    let lines = vec![
        Line::from(Span::styled(
            format!(
                "{} · studied {}",
                app.session.state().focus_task,
                format_hms(app.session.state().studied(now))
            ),
            Style::default().fg(theme.foreground),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("e ", Style::default().fg(theme.blue)),
            Span::raw(format!("keep going for {}m", app.extend_minutes)),
        ]),
        Line::from(vec![
            Span::styled("b ", Style::default().fg(theme.blue)),
            Span::raw(format!("take a {}m break", app.break_minutes)),
        ]),
        Line::from(vec![
            Span::styled("f ", Style::default().fg(theme.blue)),
            Span::raw("finish for now"),
        ]),
    ];
    f.render_widget(
        Paragraph::new(lines).alignment(Alignment::Center),
        inner_area,
    );
}

fn draw_break_ended_overlay(f: &mut Frame, app: &App) {
    let theme = &app.config.theme;
    let area = centered_rect(50, 40, f.area());
    f.render_widget(Clear, area);
    let block = overlay_block(
        format!(" {} Break's over ", app.config.icons.rest),
        app,
        theme.cyan,
    );
    let inner_area = block.inner(area);
    f.render_widget(block, area);
    let mode = if app.add_to_existing {
        "added to the current timer"
    } else {
        "as a fresh timer"
    };
    let lines = vec![
        Line::from(Span::styled(
            app.session.state().focus_task.clone(),
            Style::default().fg(theme.foreground),
        )),
        Line::from(""),
        Line::from(format!("continue for {}m", app.continue_minutes)),
        Line::from(Span::styled(mode, Style::default().fg(theme.gray))),
    ];
    f.render_widget(
        Paragraph::new(lines).alignment(Alignment::Center),
        inner_area,
    );
}

fn draw_stats_overlay(f: &mut Frame, app: &App) {
    let theme = &app.config.theme;
    let stats = &app.profile.stats;
    let area = centered_rect(60, 50, f.area());
    f.render_widget(Clear, area);
    let block = overlay_block(" Study stats ".to_string(), app, theme.magenta);
    let inner_area = block.inner(area);
    f.render_widget(block, area);

    let mut constraints = vec![Constraint::Length(1); 7];
    constraints.extend([Constraint::Length(1), Constraint::Length(1), Constraint::Length(1)]);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(inner_area);
    let days = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
    for (i, day) in days.iter().enumerate() {
        f.render_widget(
            Paragraph::new(format!(
                "{} {}",
                day,
                format_hms(Duration::seconds(stats.weekly_secs[i]))
            ))
            .style(Style::default().fg(theme.foreground)),
            rows[i],
        );
    }
    f.render_widget(
        Gauge::default()
            .gauge_style(Style::default().fg(theme.magenta).bg(theme.black))
            .percent(stats.weekly_progress()),
        rows[8],
    );
    f.render_widget(
        Paragraph::new(stats.summary()).style(Style::default().fg(theme.gray)),
        rows[9],
    );
}

fn draw_help_overlay(f: &mut Frame, app: &App) {
    let theme = &app.config.theme;
    let area = centered_rect(70, 80, f.area());
    f.render_widget(Clear, area);

    let shortcuts = [
        (
            "General",
            vec![
                ("q", "Quit"),
                ("?", "Toggle help"),
                ("s", "Study stats"),
                ("+ / -", "Weekly goal, in study stats"),
            ],
        ),
        (
            "Desk",
            vec![
                ("r", "Restart, keeping studied time"),
                ("k", "Skip the break"),
                ("w", "Change the weather"),
                ("p", "Light or put out the fire"),
            ],
        ),
        (
            "Alerts",
            vec![
                ("e / b / f", "Extend, break or finish"),
                ("←/→", "Pick minutes"),
                ("a", "Add continue time to the current timer"),
            ],
        ),
    ];
    let mut items = vec![];
    for (section, keys) in shortcuts {
        items.push(ListItem::new(Line::from(Span::styled(
            section,
            Style::default().fg(theme.blue).add_modifier(Modifier::BOLD),
        ))));
        for (key, action) in keys {
            items.push(ListItem::new(Line::from(vec![
                Span::styled(format!("  {:<10}", key), Style::default().fg(theme.yellow)),
                Span::raw(action),
            ])));
        }
    }
    f.render_widget(
        List::new(items).block(overlay_block(" Help ".to_string(), app, theme.magenta)),
        area,
    );
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::notify::Notifier;
    use crate::profile::Profile;
    use crate::room::NullRoom;
    use crate::session::{SessionConfig, SessionController, SessionOptions};
    use crate::storage::MemoryStore;
    use chrono::TimeZone;
    use ratatui::{backend::TestBackend, Terminal};

    fn render(app: &App, now: DateTime<Utc>) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal
            .draw(|f| draw(f, app, now, Instant::now()))
            .unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn app() -> App {
        let session = SessionController::new(
            SessionOptions::default(),
            Box::new(MemoryStore::default()),
            Notifier::silent(),
            Box::new(NullRoom),
        );
        App::new(Config::default(), session, Profile::default(), None)
    }

    #[test]
    fn idle_shows_the_welcome_form() {
        let screen = render(&app(), Utc::now());
        assert!(screen.contains("What are you studying?"));
        assert!(screen.contains("WELCOME"));
    }

    #[test]
    fn hints_use_the_configured_separator() {
        let mut app = app();
        app.config.icons.separator = "¦".to_string();
        let screen = render(&app, Utc::now());
        assert!(screen.contains("tab:field ¦ ↑/↓:recent"));
        assert!(!screen.contains("│ ↑/↓"));
    }

    #[test]
    fn focusing_shows_studied_and_remaining() {
        let mut app = app();
        let t0 = Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap();
        app.begin(SessionConfig::new("Organic chemistry", 25, false), t0)
            .unwrap();
        let screen = render(&app, t0 + Duration::minutes(5));
        assert!(screen.contains("Organic chemistry"));
        assert!(screen.contains("studied 00:05:00"));
        assert!(screen.contains("00:20:00 left of 25m"));
    }
}
