use chrono::{DateTime, Local};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Tabs, Widget, Wrap},
    Frame,
};
use twisty::{
    clock::Clock,
    history::TRIMMED_WINDOWS,
    record::{SolveRecord, StepSolveRecord},
    solve_timer::SolvePhase,
    step_timer::CfopStep,
    util::{format_optional, format_tenths, format_time, NO_DATA},
};
use unicode_width::UnicodeWidthStr;

use crate::{App, Screen};

const HORIZONTAL_MARGIN: u16 = 5;

const HELP_TIMER: &str =
    "space start/stop · n new scramble · i inspection · [ ] length · w warnings · t threshold · d delete · X clear";
const HELP_STEPS: &str = "enter start/complete step · esc reset · d delete · X clear";
const HELP_DRILLS: &str = "c f o p start/stop drill · esc reset · X clear";
const HELP_HISTORY: &str = "d delete latest · X clear";

pub fn draw<C: Clock + Clone>(app: &App<C>, f: &mut Frame) {
    f.render_widget(app, f.area());
}

impl<C: Clock + Clone> Widget for &App<C> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // tabs
                Constraint::Min(1),    // body
                Constraint::Length(1), // status
                Constraint::Length(1), // help
            ])
            .split(area);

        let titles: Vec<&str> = Screen::ALL.iter().map(|s| s.title()).collect();
        let selected = Screen::ALL
            .iter()
            .position(|s| *s == self.screen)
            .unwrap_or(0);
        Tabs::new(titles)
            .block(Block::default().borders(Borders::ALL).title("twisty"))
            .select(selected)
            .highlight_style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
            .render(chunks[0], buf);

        match self.screen {
            Screen::Timer => render_timer(self, chunks[1], buf),
            Screen::Steps => render_steps(self, chunks[1], buf),
            Screen::Drills => render_drills(self, chunks[1], buf),
            Screen::History => render_history(self, chunks[1], buf),
        }

        let status = self
            .status
            .as_deref()
            .or_else(|| self.session.warning())
            .unwrap_or("");
        Paragraph::new(Span::styled(
            status.to_string(),
            Style::default().fg(Color::Magenta),
        ))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);

        let help = match self.screen {
            Screen::Timer => HELP_TIMER,
            Screen::Steps => HELP_STEPS,
            Screen::Drills => HELP_DRILLS,
            Screen::History => HELP_HISTORY,
        };
        Paragraph::new(Span::styled(
            format!("{} · tab screens · q quit", help),
            Style::default().add_modifier(Modifier::DIM | Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .render(chunks[3], buf);
    }
}

fn render_timer<C: Clock + Clone>(app: &App<C>, area: Rect, buf: &mut Buffer) {
    let session = &app.session;
    let timer = session.solve_timer();
    let scramble = session.scramble().to_string();

    let max_chars_per_line = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
    let scramble_lines = (scramble.width() as f64 / max_chars_per_line as f64).ceil() as u16;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(scramble_lines.max(1)), // scramble
            Constraint::Min(1),                        // padding
            Constraint::Length(1),                     // time
            Constraint::Length(1),                     // inspection hint
            Constraint::Min(1),                        // padding
            Constraint::Length(1),                     // averages
            Constraint::Length(1),                     // totals
            Constraint::Length(1),                     // inspection settings
        ])
        .split(area);

    Paragraph::new(Span::styled(
        scramble,
        Style::default().add_modifier(Modifier::BOLD),
    ))
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .render(chunks[1], buf);

    let (time, time_style, hint) = match (timer.phase(), timer.inspection()) {
        (SolvePhase::Inspecting, Some(status)) => {
            let style = if status.overtime {
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
            } else if status.warning {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            };
            let hint = if status.overtime {
                "+2 penalty, start now"
            } else {
                "inspecting, press space to start"
            };
            (format_tenths(status.remaining), style, hint)
        }
        (SolvePhase::Running, _) => (
            format_time(timer.elapsed()),
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
            "press space to stop",
        ),
        _ => (
            format_time(timer.elapsed()),
            Style::default().add_modifier(Modifier::BOLD),
            "press space to start",
        ),
    };

    Paragraph::new(Span::styled(time, time_style))
        .alignment(Alignment::Center)
        .render(chunks[3], buf);
    Paragraph::new(Span::styled(
        hint,
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(chunks[4], buf);

    let solves = session.solves();
    let averages = TRIMMED_WINDOWS
        .iter()
        .map(|n| format!("Ao{} {}", n, format_optional(solves.average_of(*n))))
        .collect::<Vec<_>>()
        .join("   ");
    Paragraph::new(averages)
        .alignment(Alignment::Center)
        .render(chunks[6], buf);

    Paragraph::new(format!(
        "best {}   worst {}   mean {}   solves {}",
        format_optional(solves.best()),
        format_optional(solves.worst()),
        format_optional(solves.mean()),
        solves.len()
    ))
    .alignment(Alignment::Center)
    .render(chunks[7], buf);

    let config = session.inspection_config();
    let settings = if config.enabled {
        format!(
            "inspection {}s · warnings {} at {}s",
            config.duration_seconds,
            if config.show_warnings { "on" } else { "off" },
            config.warning_threshold_seconds
        )
    } else {
        "inspection off".to_string()
    };
    Paragraph::new(Span::styled(
        settings,
        Style::default().add_modifier(Modifier::DIM),
    ))
    .alignment(Alignment::Center)
    .render(chunks[8], buf);
}

fn render_steps<C: Clock + Clone>(app: &App<C>, area: Rect, buf: &mut Buffer) {
    let session = &app.session;
    let timer = session.step_timer();
    let history = session.step_solves();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1), // progress
            Constraint::Length(1),
            Constraint::Length(1), // current step time
            Constraint::Length(1), // running total
            Constraint::Length(1),
            Constraint::Min(6), // per-step stats
        ])
        .split(area);

    let progress: Vec<Span> = CfopStep::ALL
        .iter()
        .enumerate()
        .flat_map(|(idx, step)| {
            let style = if idx < timer.completed().len() {
                Style::default().fg(Color::Green)
            } else if idx == timer.current_index() {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().add_modifier(Modifier::DIM)
            };
            let sep = if idx + 1 < CfopStep::ALL.len() { " → " } else { "" };
            [Span::styled(step.label(), style), Span::raw(sep)]
        })
        .collect();
    Paragraph::new(Line::from(progress))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

    let step_style = if timer.is_running() {
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    };
    Paragraph::new(Span::styled(
        format!(
            "{} {}",
            timer.current_step(),
            format_time(timer.current_elapsed())
        ),
        step_style,
    ))
    .alignment(Alignment::Center)
    .render(chunks[3], buf);

    Paragraph::new(format!("total {}", format_time(timer.running_total())))
        .alignment(Alignment::Center)
        .render(chunks[4], buf);

    let rows: Vec<Row> = CfopStep::ALL
        .iter()
        .map(|step| {
            Row::new(vec![
                Cell::from(step.label()).style(Style::default().add_modifier(Modifier::BOLD)),
                Cell::from(split_of(timer.completed(), *step)),
                Cell::from(format_optional(history.step_average(*step))),
                Cell::from(format_optional(history.step_best(*step))),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(12),
        ],
    )
    .header(
        Row::new(vec!["Step", "This solve", "Average", "Best"])
            .style(Style::default().add_modifier(Modifier::UNDERLINED)),
    )
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Step solves: {}", history.len())),
    );
    table.render(chunks[6], buf);
}

fn split_of(completed: &[twisty::record::StepSplit], step: CfopStep) -> String {
    completed
        .iter()
        .find(|s| s.step == step)
        .map(|s| format_time(s.elapsed))
        .unwrap_or_else(|| NO_DATA.to_string())
}

fn render_drills<C: Clock + Clone>(app: &App<C>, area: Rect, buf: &mut Buffer) {
    let session = &app.session;
    let drill = session.drill();
    let log = session.drills();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1), // active drill
            Constraint::Length(1),
            Constraint::Min(6), // per-step stats
        ])
        .split(area);

    let active = match drill.active_step() {
        Some(step) => Span::styled(
            format!("{} {}", step, format_time(drill.elapsed())),
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
        None => Span::styled(
            "press c, f, o or p to drill a step",
            Style::default().add_modifier(Modifier::ITALIC),
        ),
    };
    Paragraph::new(active)
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

    let rows: Vec<Row> = CfopStep::ALL
        .iter()
        .map(|step| {
            let style = if drill.active_step() == Some(*step) {
                Style::default().fg(Color::Green)
            } else {
                Style::default()
            };
            Row::new(vec![
                Cell::from(step.label()).style(Style::default().add_modifier(Modifier::BOLD)),
                Cell::from(log.count(*step).to_string()),
                Cell::from(format_optional(log.step_average(*step))),
                Cell::from(format_optional(log.step_best(*step))),
            ])
            .style(style)
        })
        .collect();

    Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(12),
            Constraint::Length(12),
        ],
    )
    .header(
        Row::new(vec!["Step", "Count", "Average", "Best"])
            .style(Style::default().add_modifier(Modifier::UNDERLINED)),
    )
    .block(Block::default().borders(Borders::ALL).title("Drills"))
    .render(chunks[3], buf);
}

fn render_history<C: Clock + Clone>(app: &App<C>, area: Rect, buf: &mut Buffer) {
    let session = &app.session;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let visible = chunks[0].height.saturating_sub(3) as usize; // borders + header
    let solves = session.solves();
    let rows: Vec<Row> = solves
        .records()
        .iter()
        .rev()
        .take(visible)
        .map(solve_row)
        .collect();

    if rows.is_empty() {
        Paragraph::new("No solves yet")
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("Solves"))
            .render(chunks[0], buf);
    } else {
        Table::new(
            rows,
            [
                Constraint::Length(6),
                Constraint::Length(12),
                Constraint::Length(6),
                Constraint::Length(17),
                Constraint::Min(10),
            ],
        )
        .header(
            Row::new(vec!["#", "Time", "", "When", "Scramble"])
                .style(Style::default().add_modifier(Modifier::UNDERLINED)),
        )
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Solves: {}", solves.len())),
        )
        .render(chunks[0], buf);
    }

    let visible = chunks[1].height.saturating_sub(3) as usize;
    let steps = session.step_solves();
    let rows: Vec<Row> = steps
        .records()
        .iter()
        .rev()
        .take(visible)
        .map(step_row)
        .collect();

    if rows.is_empty() {
        Paragraph::new("No step solves yet")
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("Step solves"))
            .render(chunks[1], buf);
    } else {
        Table::new(
            rows,
            [
                Constraint::Length(6),
                Constraint::Length(10),
                Constraint::Length(10),
                Constraint::Length(10),
                Constraint::Length(10),
                Constraint::Length(12),
                Constraint::Length(4),
            ],
        )
        .header(
            Row::new(vec!["#", "Cross", "F2L", "OLL", "PLL", "Total", ""])
                .style(Style::default().add_modifier(Modifier::UNDERLINED)),
        )
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Step solves: {}", steps.len())),
        )
        .render(chunks[1], buf);
    }
}

fn solve_row(record: &SolveRecord) -> Row<'static> {
    let time_style = if record.is_personal_best {
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let mut marks = Vec::new();
    if record.is_personal_best {
        marks.push("PB");
    }
    if record.has_penalty() {
        marks.push("+2");
    }

    Row::new(vec![
        Cell::from(record.id.to_string()),
        Cell::from(format_time(record.elapsed)).style(time_style),
        Cell::from(marks.join(" ")).style(Style::default().fg(Color::Yellow)),
        Cell::from(when(&record.recorded_at)).style(Style::default().add_modifier(Modifier::DIM)),
        Cell::from(record.scramble.clone().unwrap_or_default()),
    ])
}

fn step_row(record: &StepSolveRecord) -> Row<'static> {
    let mut cells = vec![Cell::from(record.id.to_string())];
    cells.extend(
        CfopStep::ALL
            .iter()
            .map(|step| Cell::from(format_optional(record.split(*step)))),
    );
    let total_style = if record.is_personal_best {
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    cells.push(Cell::from(format_time(record.total())).style(total_style));
    cells.push(Cell::from(if record.is_personal_best { "PB" } else { "" }));
    Row::new(cells)
}

fn when(at: &DateTime<Local>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}
