use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Widget, Wrap},
};
use std::time::Instant;
use unicode_width::UnicodeWidthStr;

use cubestats::{
    solve::{EffectiveTime, Penalty, SolveRecord},
    store::DATE_FORMAT,
    timer::TimerPhase,
    util::format_millis,
};

use crate::{App, AppState};

const HORIZONTAL_MARGIN: u16 = 2;
const VERTICAL_MARGIN: u16 = 1;

const TIMING_HINTS: &str =
    "space: start/stop  m: modify  2/d/o/x: last solve  tab: session  n: new  D: delete  p: options  esc: quit";

/// Time as shown in the solve list: `12.345`, `14.345+` or `DNF`
pub fn solve_label(record: &SolveRecord) -> String {
    match (record.penalty, record.effective_time()) {
        (_, EffectiveTime::Dnf) => "DNF".to_string(),
        (Penalty::PlusTwo, EffectiveTime::Finished(ms)) => format!("{}+", format_millis(ms)),
        (_, EffectiveTime::Finished(ms)) => format_millis(ms),
    }
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

impl App {
    fn time_text(&self, now: Instant) -> (String, Style) {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        match self.timer.phase() {
            TimerPhase::Holding { .. } => ("0.000".to_string(), bold.fg(Color::Red)),
            TimerPhase::Ready => ("0.000".to_string(), bold.fg(Color::Green)),
            TimerPhase::Running { .. } if !self.config.show_time => ("solving".to_string(), bold),
            TimerPhase::Running { .. } => (
                self.timer.display_ms(now).map(format_millis).unwrap_or_default(),
                bold,
            ),
            TimerPhase::Idle | TimerPhase::Stopped { .. } => (
                self.live
                    .solves()
                    .last()
                    .map_or_else(|| "0.000".to_string(), solve_label),
                bold,
            ),
        }
    }

    fn render_scramble(&self, area: Rect, buf: &mut Buffer) {
        let title = format!(" {} scramble ", self.config.cube_type);
        Paragraph::new(self.scramble.as_str())
            .block(Block::default().borders(Borders::ALL).title(title))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(area, buf);
    }

    fn render_time(&self, area: Rect, buf: &mut Buffer) {
        let (text, style) = self.time_text(Instant::now());
        let title = format!(" session {} ", self.live.name());
        Paragraph::new(Span::styled(text, style))
            .block(Block::default().borders(Borders::ALL).title(title))
            .alignment(Alignment::Center)
            .render(area, buf);
    }

    fn render_solves(&self, area: Rect, buf: &mut Buffer) {
        let visible = area.height.saturating_sub(3) as usize;
        let rows = self
            .live
            .solves()
            .iter()
            .rev()
            .take(visible)
            .map(|s| {
                Row::new(vec![
                    Cell::from(s.sequence_number.to_string()),
                    Cell::from(solve_label(s)),
                    Cell::from(s.timestamp.format(DATE_FORMAT).to_string()),
                ])
            });

        let header = Row::new(vec!["#", "Time", "Date"])
            .style(Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED));
        Table::new(
            rows,
            [
                Constraint::Length(6),
                Constraint::Length(10),
                Constraint::Min(19),
            ],
        )
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(" solves "))
        .render(area, buf);
    }

    fn render_stats(&self, area: Rect, buf: &mut Buffer) {
        let engine = self.live.engine();
        let summary = engine.summary();
        let dim = Style::default().add_modifier(Modifier::DIM);
        let fastest = engine
            .best_single()
            .map_or_else(|| "N/A".to_string(), format_millis);

        let mut lines = vec![
            Line::from(vec![
                Span::styled("solves       ", dim),
                Span::raw(summary.num_solves.to_string()),
            ]),
            Line::from(vec![Span::styled("fastest      ", dim), Span::raw(fastest)]),
            Line::from(vec![
                Span::styled("session avg  ", dim),
                Span::raw(summary.average.to_string()),
            ]),
            Line::from(""),
        ];
        for size in engine.config().window_sizes() {
            let best = engine
                .best_average(size)
                .map_or_else(|| "N/A".to_string(), |b| format!("{b:.3}"));
            lines.push(Line::from(vec![
                Span::styled(format!("{:<13}", format!("ao{size}")), dim),
                Span::raw(format!("{:<10}", engine.current_average(size).to_string())),
                Span::styled("best ", dim),
                Span::raw(best),
            ]));
        }

        Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title(" statistics "))
            .render(area, buf);
    }

    fn render_dialog(&self, area: Rect, buf: &mut Buffer) {
        let highlight = Style::default()
            .fg(Color::Black)
            .bg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        let plain = Style::default();

        let (title, lines): (&str, Vec<(String, Style)>) = match &self.state {
            AppState::Timing => return,
            AppState::Modify { input } => (
                " modify solve ",
                vec![
                    (format!("Solve number: {input}_"), plain),
                    (String::new(), plain),
                    ("p: +2   d: DNF   o: OK   x: remove   esc: close".to_string(), plain),
                ],
            ),
            AppState::NewSession { input } => (
                " new session ",
                vec![
                    (format!("Name: {input}_"), plain),
                    (String::new(), plain),
                    ("enter: create   esc: cancel".to_string(), plain),
                ],
            ),
            AppState::ConfirmDelete => (
                " delete session ",
                vec![
                    (
                        format!("Delete session \"{}\" and all of its solves?", self.live.name()),
                        plain,
                    ),
                    (String::new(), plain),
                    ("y: delete   any other key: cancel".to_string(), plain),
                ],
            ),
            AppState::Options { cursor } => {
                let show_time = if self.config.show_time { "yes" } else { "no" };
                let mut lines: Vec<(String, Style)> = [
                    format!("Cube type        {}", self.config.cube_type),
                    format!("Scramble length  {}", self.config.scramble_length),
                    format!("Show time        {show_time}"),
                ]
                .into_iter()
                .enumerate()
                .map(|(idx, text)| (text, if idx == *cursor { highlight } else { plain }))
                .collect();
                lines.push((String::new(), plain));
                lines.push(("up/down: select   left/right: change   esc: close".to_string(), plain));
                (" options ", lines)
            }
        };

        let width = lines.iter().map(|(text, _)| text.width()).max().unwrap_or(0) as u16 + 4;
        let dialog = centered_rect(width, lines.len() as u16 + 2, area);
        Clear.render(dialog, buf);
        Paragraph::new(
            lines
                .into_iter()
                .map(|(text, style)| Line::from(Span::styled(text, style)))
                .collect::<Vec<_>>(),
        )
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .render(dialog, buf);
    }
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let scramble_lines = if (self.scramble.width() as u16) + 2 > area.width { 4 } else { 3 };
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(scramble_lines),
                Constraint::Length(3),
                Constraint::Min(4),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(area);

        self.render_scramble(chunks[0], buf);
        self.render_time(chunks[1], buf);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[2]);
        self.render_solves(body[0], buf);
        self.render_stats(body[1], buf);

        Paragraph::new(Span::styled(
            self.status.as_str(),
            Style::default().fg(Color::Yellow),
        ))
        .render(chunks[3], buf);
        Paragraph::new(Span::styled(
            TIMING_HINTS,
            Style::default().add_modifier(Modifier::DIM | Modifier::ITALIC),
        ))
        .render(chunks[4], buf);

        self.render_dialog(area, buf);
    }
}
