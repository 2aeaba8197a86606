//! Terminal display
//!
//! Draws the published [`LiveSnapshot`] with ratatui: a session header, a
//! live standings table and a statistics table. Calculated values that
//! disagree with the reported ones are shown in red. `q`, `Q` or Ctrl+C
//! requests shutdown.

use crate::state::AppState;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use lmu_core::model::{CompetitorSnapshot, CompetitorStats, LiveSnapshot, SessionInfo};
use lmu_core::units::{format_lap_time, times_differ, MetersPerSecond};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame, Terminal,
};
use std::io::Stdout;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const KEY_POLL_INTERVAL: Duration = Duration::from_millis(100);

// Column caps
const LIVE_DRIVER_MAX: usize = 40;
const LIVE_VEHICLE_MAX: usize = 40;
const LIVE_STATUS_MAX: usize = 20;
const STATS_DRIVER_MAX: usize = 25;
const STATS_VEHICLE_MAX: usize = 20;
const STATS_CLASS_MAX: usize = 15;

const LIVE_HEADER: [&str; 8] = [
    "Pos", "Driver", "Vehicle", "Laps", "CurLap", "BestLap", "Speed", "Status",
];
const STATS_HEADER: [&str; 14] = [
    "Driver", "Vehicle", "Class", "MaxSpd", "BestLap", "BestS1", "BestS2", "BestS3", "MaxSpdC",
    "BestLapC", "BestS1C", "BestS2C", "BestS3C", "MaxSpdBC",
];

/// Owns the terminal while the display runs and restores it on drop
struct Screen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl Screen {
    fn enter() -> Result<Self> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        let mut stdout = std::io::stdout();
        if let Err(e) = stdout.execute(EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(e).context("Failed to enter alternate screen");
        }
        let terminal =
            Terminal::new(CrosstermBackend::new(stdout)).context("Failed to create terminal")?;
        Ok(Self { terminal })
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = self.terminal.backend_mut().execute(LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Redraw on every published snapshot, at most once per `interval`
pub async fn run(mut state: AppState, interval: Duration, cancel: CancellationToken) {
    let mut screen = match Screen::enter() {
        Ok(screen) => screen,
        Err(e) => {
            warn!("Console display unavailable: {:#}", e);
            return;
        }
    };
    let keys = {
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || watch_keys(cancel))
    };

    debug!("Console display started");
    loop {
        let snapshot = state.snapshots.borrow_and_update().clone();
        if let Err(e) = screen.terminal.draw(|frame| draw(frame, &snapshot)) {
            warn!("Console draw failed: {}", e);
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = state.snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    drop(screen);

    if let Err(e) = keys.await {
        warn!("Console key reader failed: {}", e);
    }
    debug!("Console display stopped");
}

/// Blocking key reader; a quit key cancels the whole process
fn watch_keys(cancel: CancellationToken) {
    while !cancel.is_cancelled() {
        match event::poll(KEY_POLL_INTERVAL) {
            Ok(false) => {}
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) if is_quit(&key) => {
                    info!("Quit requested from console");
                    cancel.cancel();
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Failed to read terminal event: {}", e);
                    break;
                }
            },
            Err(e) => {
                warn!("Terminal event poll failed: {}", e);
                break;
            }
        }
    }
}

/// `q`, `Q` or Ctrl+C; raw mode keeps Ctrl+C from raising SIGINT
fn is_quit(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Whole screen for one snapshot
pub fn draw(frame: &mut Frame, snapshot: &LiveSnapshot) {
    let [title, session, standings, stats] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(4),
        Constraint::Fill(1),
        Constraint::Fill(1),
    ])
    .areas(frame.area());

    frame.render_widget(
        Paragraph::new(format!("LMU Racing Telemetry {}", env!("CARGO_PKG_VERSION")))
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Blue)),
        title,
    );
    frame.render_widget(
        Paragraph::new(render_session(snapshot.session.as_ref())).block(block("Session")),
        session,
    );
    draw_standings(frame, standings, snapshot);
    draw_stats(frame, stats, snapshot);
}

pub fn render_session(session: Option<&SessionInfo>) -> String {
    let Some(s) = session else {
        return "Waiting for session info...".to_string();
    };
    format!(
        "Track: {}  Session: {}  Phase: {}\n\
         Event Time: {:.1}s  Cars: {}/{}  Track: {:.1}°C  Air: {:.1}°C  Rain: {:.1}%",
        s.track_name,
        s.session,
        s.game_phase,
        s.current_event_time,
        s.number_of_vehicles,
        s.max_players,
        s.track_temp,
        s.ambient_temp,
        s.raining * 100.0,
    )
}

/// Live table, one row per competitor ordered by position
fn draw_standings(frame: &mut Frame, area: Rect, snapshot: &LiveSnapshot) {
    let rows = snapshot.standings();
    if rows.is_empty() {
        frame.render_widget(
            Paragraph::new("No drivers connected...").block(block("Live")),
            area,
        );
        return;
    }

    let driver_w = column_width("Driver", rows.iter().map(|c| c.driver_name.as_str()), LIVE_DRIVER_MAX);
    let vehicle_w = column_width("Vehicle", rows.iter().map(|c| c.vehicle_name.as_str()), LIVE_VEHICLE_MAX);
    let status_w = column_width("Status", rows.iter().map(|c| c.status()), LIVE_STATUS_MAX);
    let widths = [3, driver_w, vehicle_w, 4, 8, 8, 6, status_w];

    let body = rows
        .iter()
        .map(|c| standings_row(c, driver_w, vehicle_w, status_w));
    frame.render_widget(table(body, &LIVE_HEADER, &widths).block(block("Live")), area);
}

fn standings_row(
    c: &CompetitorSnapshot,
    driver_w: usize,
    vehicle_w: usize,
    status_w: usize,
) -> Row<'static> {
    Row::new(vec![
        Cell::from(c.position.to_string()),
        Cell::from(truncate(&c.driver_name, driver_w)),
        Cell::from(truncate(&c.vehicle_name, vehicle_w)),
        Cell::from(c.laps_completed.to_string()),
        Cell::from(format_lap_time(c.time_into_lap)),
        Cell::from(format_lap_time(c.best_lap_time)),
        Cell::from(display_speed(c.car_velocity.velocity)),
        Cell::from(truncate(c.status(), status_w)),
    ])
}

/// Statistics table ordered by reported best lap
fn draw_stats(frame: &mut Frame, area: Rect, snapshot: &LiveSnapshot) {
    let rows = snapshot.stats_by_best_lap();
    if rows.is_empty() {
        frame.render_widget(
            Paragraph::new("No driver statistics available...").block(block("Statistics")),
            area,
        );
        return;
    }

    let driver_w = column_width("Driver", rows.iter().map(|s| s.driver_name.as_str()), STATS_DRIVER_MAX);
    let vehicle_w = column_width("Vehicle", rows.iter().map(|s| s.vehicle_name.as_str()), STATS_VEHICLE_MAX);
    let class_w = column_width("Class", rows.iter().map(|s| s.car_class.as_str()), STATS_CLASS_MAX);
    let widths = [driver_w, vehicle_w, class_w, 6, 8, 8, 8, 8, 7, 8, 8, 8, 8, 8];

    let body = rows
        .iter()
        .map(|s| stats_row(s, driver_w, vehicle_w, class_w));
    frame.render_widget(
        table(body, &STATS_HEADER, &widths).block(block("Statistics")),
        area,
    );
}

fn stats_row(s: &CompetitorStats, driver_w: usize, vehicle_w: usize, class_w: usize) -> Row<'static> {
    let best_lap_speed = format!("{:.1}", s.max_speed_on_best_lap_calculated);
    Row::new(vec![
        Cell::from(truncate(&s.driver_name, driver_w)),
        Cell::from(truncate(&s.vehicle_name, vehicle_w)),
        Cell::from(truncate(&s.car_class, class_w)),
        Cell::from(format!("{:.1}", s.max_speed)),
        Cell::from(format_lap_time(s.best_lap_time)),
        Cell::from(format_lap_time(s.best_sector1)),
        Cell::from(format_lap_time(s.best_sector2)),
        Cell::from(format_lap_time(s.best_sector3)),
        calculated(
            best_lap_speed.clone(),
            s.max_speed_on_best_lap,
            s.max_speed_on_best_lap_calculated,
        ),
        calculated(
            format_lap_time(s.best_lap_time_calculated),
            s.best_lap_time,
            s.best_lap_time_calculated,
        ),
        calculated(
            format_lap_time(s.best_sector1_calculated),
            s.best_sector1,
            s.best_sector1_calculated,
        ),
        calculated(
            format_lap_time(s.best_sector2_calculated),
            s.best_sector2,
            s.best_sector2_calculated,
        ),
        calculated(
            format_lap_time(s.best_sector3_calculated),
            s.best_sector3,
            s.best_sector3_calculated,
        ),
        calculated(
            best_lap_speed,
            s.max_speed_on_best_lap,
            s.max_speed_on_best_lap_calculated,
        ),
    ])
}

/// Calculated value cell, red when it disagrees with the reported one
fn calculated(text: String, reported: f64, calculated: f64) -> Cell<'static> {
    let cell = Cell::from(text);
    if times_differ(reported, calculated) {
        cell.style(Style::default().fg(Color::Red))
    } else {
        cell
    }
}

fn table<'a>(
    rows: impl IntoIterator<Item = Row<'a>>,
    header: &[&'static str],
    widths: &[usize],
) -> Table<'a> {
    let widths = widths
        .iter()
        .map(|&w| Constraint::Length(u16::try_from(w).unwrap_or(u16::MAX)));
    Table::new(rows, widths).header(
        Row::new(header.iter().copied()).style(Style::default().add_modifier(Modifier::BOLD)),
    )
}

fn block(title: &'static str) -> Block<'static> {
    Block::default().borders(Borders::ALL).title(title)
}

fn column_width<'a>(header: &str, values: impl Iterator<Item = &'a str>, cap: usize) -> usize {
    values
        .map(|v| v.chars().count())
        .fold(header.len(), usize::max)
        .min(cap)
}

/// Cut to `width` characters, marking the cut with "..."
fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let keep = width.saturating_sub(3);
    let mut cut: String = s.chars().take(keep).collect();
    cut.push_str("...");
    cut
}

/// Whole km/h for a raw m/s value
fn display_speed(mps: f64) -> String {
    format!("{:.0}", MetersPerSecond(mps).to_kph().0)
}
