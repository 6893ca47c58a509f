use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

use skeet::powerups::PowerUpKind;
use skeet::session::Phase;
use skeet::targets::{Target, ARENA_HEIGHT, ARENA_WIDTH, TARGET_SIZE};
use skeet::timer::Millis;

use crate::App;

const HORIZONTAL_MARGIN: u16 = 2;

/// HUD row, arena box, and notice row for the play screens.
fn play_layout(area: Rect) -> (Rect, Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints(
            [
                Constraint::Length(1),
                Constraint::Min(5),
                Constraint::Length(1),
            ]
            .as_ref(),
        )
        .split(area);
    (chunks[0], chunks[1], chunks[2])
}

/// Cell region inside the arena border for a full frame area. The mouse
/// handler uses the same computation as the renderer so clicks and targets
/// can never disagree about where the arena is.
pub fn arena_inner(area: Rect) -> Rect {
    let (_, arena, _) = play_layout(area);
    Block::default().borders(Borders::ALL).inner(arena)
}

/// Maps a terminal cell to logical arena coordinates (cell center).
pub fn cell_to_logical(inner: Rect, column: u16, row: u16) -> Option<(u16, u16)> {
    if inner.width == 0 || inner.height == 0 {
        return None;
    }
    if column < inner.x
        || column >= inner.x + inner.width
        || row < inner.y
        || row >= inner.y + inner.height
    {
        return None;
    }
    // Midpoint of the cell's logical span, so a cell mostly covered by a
    // target resolves to that target.
    let x = ((column - inner.x) as u32 * 2 + 1) * ARENA_WIDTH as u32 / (inner.width as u32 * 2);
    let y = ((row - inner.y) as u32 * 2 + 1) * ARENA_HEIGHT as u32 / (inner.height as u32 * 2);
    Some((x as u16, y as u16))
}

/// Cell rectangle a target's logical box projects onto, at least 1x1.
/// Edges round to the nearest cell boundary so every projected cell's
/// center stays inside the logical box, keeping clicks on drawn cells hits.
fn target_cells(inner: Rect, target: &Target) -> Rect {
    let round_x = |lx: u32| (lx * inner.width as u32 + ARENA_WIDTH as u32 / 2) / ARENA_WIDTH as u32;
    let round_y =
        |ly: u32| (ly * inner.height as u32 + ARENA_HEIGHT as u32 / 2) / ARENA_HEIGHT as u32;

    let (x, y) = target.position;
    let left = inner.x + round_x(x as u32) as u16;
    let top = inner.y + round_y(y as u32) as u16;
    let right = inner.x + round_x((x + TARGET_SIZE) as u32) as u16;
    let bottom = inner.y + round_y((y + TARGET_SIZE) as u32) as u16;
    Rect {
        x: left,
        y: top,
        width: (right - left).max(1),
        height: (bottom - top).max(1),
    }
}

fn format_clock(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.game.phase() {
            Phase::Idle => render_title(self, area, buf),
            Phase::Running | Phase::Paused => render_arena(self, area, buf),
            Phase::Ended => render_results(self, area, buf),
        }
    }
}

fn render_title(app: &App, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let dim_style = Style::default().add_modifier(Modifier::DIM);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let state = app.game.state();
    let lines = vec![
        Line::from(Span::styled("S K E E T", bold_style.fg(Color::Yellow))),
        Line::from(Span::styled(
            "shoot the targets before they slip away",
            italic_style,
        )),
        Line::default(),
        Line::from(vec![
            Span::styled("difficulty ", dim_style),
            Span::styled(state.difficulty.to_string(), bold_style),
            Span::styled("   high score ", dim_style),
            Span::styled(state.high_score.to_string(), bold_style),
        ]),
        Line::default(),
        Line::from(Span::styled(
            "(s)tart / (d)ifficulty / (q)uit",
            italic_style,
        )),
        Line::from(Span::styled(
            "in play: click targets, (1) rapid fire, (2) time freeze, (space) pause",
            dim_style,
        )),
    ];

    centered_block(lines, area, buf);
}

fn render_arena(app: &App, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let dim_style = Style::default().add_modifier(Modifier::DIM);
    let paused = app.game.phase() == Phase::Paused;

    let (hud, arena, footer) = play_layout(area);
    render_hud(app, hud, buf);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(if paused { dim_style } else { Style::default() });
    let inner = block.inner(arena);
    block.render(arena, buf);

    for target in app.game.targets() {
        let cells = target_cells(inner, target);
        let style = if paused {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().fg(urgency_color(target, app.now))
        };
        for row in cells.y..cells.y + cells.height {
            for col in cells.x..cells.x + cells.width {
                if col < inner.x + inner.width && row < inner.y + inner.height {
                    buf.set_string(col, row, "█", style);
                }
            }
        }
    }

    if paused {
        let veil = Paragraph::new(Span::styled(
            "PAUSED - (space) to resume",
            bold_style.fg(Color::Yellow),
        ))
        .alignment(Alignment::Center);
        let mid = Rect {
            x: inner.x,
            y: inner.y + inner.height / 2,
            width: inner.width,
            height: 1,
        };
        veil.render(mid, buf);
    }

    let footer_text = if app.notices.is_empty() {
        Span::styled(
            "(1) rapid fire / (2) time freeze / (space) pause / (q)uit",
            Style::default().add_modifier(Modifier::ITALIC | Modifier::DIM),
        )
    } else {
        Span::styled(
            app.notices
                .iter()
                .map(|n| n.text.as_str())
                .collect::<Vec<_>>()
                .join("   "),
            bold_style.fg(Color::Cyan),
        )
    };
    Paragraph::new(footer_text)
        .alignment(Alignment::Center)
        .render(footer, buf);
}

/// Targets shade from green to red as their lifetime drains.
fn urgency_color(target: &Target, now: Millis) -> Color {
    let total = target.deadline.saturating_sub(target.spawned_at);
    if total == 0 {
        return Color::Red;
    }
    match (target.deadline.saturating_sub(now) * 100 / total) as u32 {
        51.. => Color::Green,
        26..=50 => Color::Yellow,
        _ => Color::Red,
    }
}

fn render_hud(app: &App, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let dim_style = Style::default().add_modifier(Modifier::DIM);

    let state = app.game.state();
    let mut spans = vec![
        Span::styled("SCORE ", dim_style),
        Span::styled(format!("{:<6}", state.score), bold_style),
        Span::styled("TIME ", dim_style),
        Span::styled(
            format!("{:<6}", format_clock(state.time_remaining)),
            bold_style,
        ),
        Span::styled("LVL ", dim_style),
        Span::styled(format!("{:<4}", state.level), bold_style),
        Span::styled("HIGH ", dim_style),
        Span::styled(format!("{:<6}", state.high_score), bold_style),
    ];
    for (key, kind) in [("1", PowerUpKind::RapidFire), ("2", PowerUpKind::TimeFreeze)] {
        let slot = app.game.power_up(kind);
        let style = if slot.active {
            bold_style.fg(Color::Cyan)
        } else if slot.charges_remaining == 0 {
            dim_style
        } else {
            Style::default()
        };
        spans.push(Span::styled(
            format!("[{}] {} x{}  ", key, kind, slot.charges_remaining),
            style,
        ));
    }
    Paragraph::new(Line::from(spans)).render(area, buf);
}

fn render_results(app: &App, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let dim_style = Style::default().add_modifier(Modifier::DIM);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let state = app.game.state();
    let accuracy = app.game.accuracy_stats().accuracy();

    let mut lines = vec![
        Line::from(Span::styled("SESSION OVER", bold_style.fg(Color::Yellow))),
        Line::default(),
        Line::from(Span::styled(
            format!(
                "{} pts   {}% acc   level {}   {}",
                state.score, accuracy, state.level, state.difficulty
            ),
            bold_style,
        )),
    ];
    if app.last_summary.is_some_and(|s| s.is_new_high_score) {
        lines.push(Line::from(Span::styled(
            "NEW HIGH SCORE!",
            bold_style.fg(Color::Green),
        )));
    } else {
        lines.push(Line::from(Span::styled(
            format!("high score {}", state.high_score),
            dim_style,
        )));
    }

    if let Some(db) = app.game.history() {
        if let Ok(recent) = db.recent_sessions(app.recent_limit) {
            if !recent.is_empty() {
                lines.push(Line::default());
                lines.push(Line::from(Span::styled("recent sessions", dim_style)));
                for rec in &recent {
                    lines.push(Line::from(Span::raw(format!(
                        "{}  {:<6}  {} pts  {}% acc  lvl {}",
                        rec.finished_at.format("%m-%d %H:%M"),
                        rec.difficulty.to_string(),
                        rec.score,
                        rec.accuracy,
                        rec.level_reached,
                    ))));
                }
            }
        }
        if let Ok(best) = db.best_scores() {
            if !best.is_empty() {
                lines.push(Line::default());
                lines.push(Line::from(Span::styled("best scores", dim_style)));
                let summary = best
                    .iter()
                    .map(|(d, score)| format!("{} {}", d, score))
                    .collect::<Vec<_>>()
                    .join("   ");
                lines.push(Line::from(Span::raw(summary)));
            }
        }
    }

    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "(s) play again / (d)ifficulty / (q)uit",
        italic_style,
    )));

    centered_block(lines, area, buf);
}

fn centered_block(lines: Vec<Line>, area: Rect, buf: &mut Buffer) {
    let block_height = (lines.len() as u16).min(area.height);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints(
            [
                Constraint::Length(area.height.saturating_sub(block_height) / 2),
                Constraint::Length(block_height),
                Constraint::Min(0),
            ]
            .as_ref(),
        )
        .split(area);

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(chunks[1], buf);
}
