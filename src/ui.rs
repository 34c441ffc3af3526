use crate::engine::{ChartFrame, TickOutcome, TrafficEngine};
use crate::format::format_bps;
use crate::keybindings::{KeyCategory, get_all_keybindings, get_status_bar_keybindings};
use crate::registry::LegendEntry;
use crate::render::{Size, TerminalCanvas, terminal::dots_for};
use crate::sample::{Direction as Flow, RawInterfaceSample};
use crate::scheduler::DimensionSource;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};
use unicode_width::UnicodeWidthStr;

const LEGEND_WIDTH: u16 = 34;

pub struct AppState {
    pub engine: TrafficEngine,
    pub legend_state: ListState,
    pub show_help: bool,
    pub help_scroll_offset: usize,
    pub status_message: String,
    pub source_name: String,
    /// Most recent chart frame from the engine
    pub frame: Option<ChartFrame>,
    /// Inner area of the chart region at the last draw
    pub chart_area: Option<Rect>,
    /// Whole terminal area at the last draw
    pub frame_area: Option<Rect>,
    layout_changed: bool,
    ticks: u64,
}

impl AppState {
    pub fn new(engine: TrafficEngine, source_name: impl Into<String>) -> Self {
        Self {
            engine,
            legend_state: ListState::default(),
            show_help: false,
            help_scroll_offset: 0,
            status_message: "Waiting for traffic samples...".to_string(),
            source_name: source_name.into(),
            frame: None,
            chart_area: None,
            frame_area: None,
            layout_changed: false,
            ticks: 0,
        }
    }

    /// Feed one sampler batch to the engine
    pub fn apply_batch(&mut self, batch: &[RawInterfaceSample]) {
        let report = self.engine.ingest(batch);
        match report.outcome {
            TickOutcome::NoData => {}
            TickOutcome::Stale => {
                self.status_message = "Ignored an out-of-order sample".to_string();
            }
            TickOutcome::Appended { .. } | TickOutcome::Replaced => {
                self.ticks += 1;
                let legend_len = self.engine.legend().len();
                self.status_message = format!(
                    "Tick {} | {} interface(s) | {}/{} points",
                    self.ticks,
                    legend_len,
                    self.engine.buffer().size(),
                    self.engine.buffer().capacity()
                );
            }
        }
        if report.skipped > 0 {
            log::debug!("Skipped {} malformed sample(s)", report.skipped);
        }
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        let len = self.engine.legend().len();
        match self.legend_state.selected() {
            _ if len == 0 => self.legend_state.select(None),
            None => self.legend_state.select(Some(0)),
            Some(i) if i >= len => self.legend_state.select(Some(len - 1)),
            Some(_) => {}
        }
    }

    pub fn select_next(&mut self) {
        let len = self.engine.legend().len();
        if len == 0 {
            return;
        }
        let i = match self.legend_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.legend_state.select(Some(i));
    }

    pub fn select_previous(&mut self) {
        let len = self.engine.legend().len();
        if len == 0 {
            return;
        }
        let i = match self.legend_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.legend_state.select(Some(i));
    }

    pub fn selected_interface(&self) -> Option<LegendEntry> {
        let i = self.legend_state.selected()?;
        self.engine.legend().into_iter().nth(i)
    }

    pub fn toggle_selected(&mut self) {
        let Some(entry) = self.selected_interface() else {
            return;
        };
        if let Some(hidden) = self.engine.toggle(&entry.name) {
            self.status_message = format!(
                "{} {}",
                entry.name,
                if hidden { "hidden" } else { "shown" }
            );
        }
    }

    pub fn show_all(&mut self) {
        self.engine.show_all();
        self.status_message = "Showing all interfaces".to_string();
    }

    pub fn reset(&mut self) {
        self.engine.reset();
        self.ticks = 0;
        self.legend_state.select(None);
        self.status_message = "Session reset".to_string();
    }

    /// Whether the chart region moved or resized during the last draw
    pub fn take_layout_change(&mut self) -> bool {
        std::mem::take(&mut self.layout_changed)
    }

    fn record_chart_area(&mut self, area: Rect) {
        if self.chart_area != Some(area) {
            log::trace!("Chart region is now {}x{}", area.width, area.height);
            self.chart_area = Some(area);
            self.layout_changed = true;
        }
    }

    pub fn reset_help_scroll(&mut self) {
        self.help_scroll_offset = 0;
    }

    pub fn scroll_help_up(&mut self) {
        self.help_scroll_offset = self.help_scroll_offset.saturating_sub(1);
    }

    pub fn scroll_help_down(&mut self) {
        self.help_scroll_offset += 1;
    }

    pub fn clamp_scroll(scroll_offset: usize, content_lines: usize, visible_height: u16) -> usize {
        // Borders plus a line of padding
        let usable_height = visible_height.saturating_sub(3) as usize;
        let max_scroll = content_lines.saturating_sub(usable_height);
        scroll_offset.min(max_scroll)
    }
}

/// A terminal region measured in braille dots
pub struct CellArea {
    name: &'static str,
    area: Option<Rect>,
}

impl CellArea {
    pub fn new(name: &'static str, area: Option<Rect>) -> Self {
        Self { name, area }
    }
}

impl DimensionSource for CellArea {
    fn name(&self) -> &str {
        self.name
    }

    fn measure(&self) -> Option<Size> {
        self.area.map(dots_for)
    }
}

/// The terminal window as reported by the OS
pub struct Viewport;

impl DimensionSource for Viewport {
    fn name(&self) -> &str {
        "viewport"
    }

    fn measure(&self) -> Option<Size> {
        match crossterm::terminal::size() {
            Ok((columns, rows)) => {
                // Leave room for the header, status bar, and legend
                let width = columns.saturating_sub(LEGEND_WIDTH + 2);
                let height = rows.saturating_sub(8) / 2;
                Some(dots_for(Rect::new(0, 0, width, height)))
            }
            Err(e) => {
                log::debug!("Could not query terminal size: {}", e);
                None
            }
        }
    }
}

pub fn draw_ui(f: &mut Frame, app: &mut AppState) {
    let area = f.area();
    app.frame_area = Some(area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
        ])
        .split(area);

    draw_header(f, rows[0], app);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(20), Constraint::Length(LEGEND_WIDTH)])
        .split(rows[1]);

    let charts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(columns[0]);

    let inbound = chart_block(app, Flow::In);
    app.record_chart_area(inbound.inner(charts[0]));
    draw_chart(f, charts[0], app, Flow::In, inbound);
    let outbound = chart_block(app, Flow::Out);
    draw_chart(f, charts[1], app, Flow::Out, outbound);

    draw_legend(f, columns[1], app);
    draw_status_bar(f, rows[2], app);

    if app.show_help {
        draw_help_overlay(f, area, app);
    }
}

fn draw_header(f: &mut Frame, area: Rect, app: &AppState) {
    let clock = chrono::Local::now().format("%H:%M:%S");
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "trafficgraph",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(" - interface traffic via {}  ", app.source_name)),
        Span::styled(clock.to_string(), Style::default().fg(Color::Gray)),
    ]))
    .block(Block::default().borders(Borders::ALL));

    f.render_widget(header, area);
}

fn chart_block(app: &AppState, flow: Flow) -> Block<'static> {
    let title = match &app.frame {
        Some(frame) => format!(
            " {} (max {}) ",
            flow.title(),
            format_bps(frame.scale.max_for(flow))
        ),
        None => format!(" {} ", flow.title()),
    };
    Block::default()
        .borders(Borders::ALL)
        .title(title)
        .style(Style::default().fg(Color::Cyan))
}

fn draw_chart(f: &mut Frame, area: Rect, app: &AppState, flow: Flow, block: Block<'static>) {
    match &app.frame {
        Some(frame) => {
            let canvas = TerminalCanvas::new(frame.for_direction(flow)).block(block);
            f.render_widget(canvas, area);
        }
        None => {
            let waiting = Paragraph::new("Collecting samples...")
                .style(Style::default().fg(Color::DarkGray))
                .block(block);
            f.render_widget(waiting, area);
        }
    }
}

fn draw_legend(f: &mut Frame, area: Rect, app: &mut AppState) {
    let legend = app.engine.legend();
    let latest = app.engine.buffer().latest();
    let name_width = legend
        .iter()
        .map(|e| e.name.width())
        .max()
        .unwrap_or(0)
        .min(12);

    let items: Vec<ListItem> = legend
        .iter()
        .map(|entry| {
            let (marker, name_style) = if entry.hidden {
                ("○", Style::default().fg(Color::DarkGray))
            } else {
                ("●", Style::default().fg(Color::White))
            };

            let mut name = entry.name.clone();
            while name.width() > name_width {
                name.pop();
            }
            let padding = " ".repeat(name_width - name.width());

            let rates = match latest {
                Some(point) => format!(
                    " ↓{} ↑{}",
                    format_bps(point.value_for(&entry.name, Flow::In)),
                    format_bps(point.value_for(&entry.name, Flow::Out))
                ),
                None => String::new(),
            };

            ListItem::new(Line::from(vec![
                Span::styled(format!("{} ", marker), Style::default().fg(entry.color.into())),
                Span::styled(format!("{}{}", name, padding), name_style),
                Span::styled(rates, Style::default().fg(Color::Gray)),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Interfaces ")
                .style(Style::default().fg(Color::Cyan)),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        );

    f.render_stateful_widget(list, area, &mut app.legend_state);
}

fn draw_status_bar(f: &mut Frame, area: Rect, app: &AppState) {
    let mut spans = vec![];

    for (i, (key, description)) in get_status_bar_keybindings().iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" "));
        }
        spans.push(Span::styled(
            format!("[{}]", key),
            Style::default().fg(Color::Yellow),
        ));
        spans.push(Span::raw(format!(" {} ", description)));
    }

    spans.push(Span::raw("| "));
    spans.push(Span::styled(
        &app.status_message,
        Style::default().fg(Color::Gray),
    ));

    let status = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(status, area);
}

fn draw_help_overlay(f: &mut Frame, area: Rect, app: &mut AppState) {
    let mut help_text = vec![
        Line::from(""),
        Line::from(Span::styled(
            "trafficgraph - Keyboard Shortcuts",
            Style::default().add_modifier(Modifier::BOLD),
        )),
    ];

    let bindings = get_all_keybindings();
    for category in KeyCategory::ALL {
        help_text.push(Line::from(""));
        help_text.push(Line::from(Span::styled(
            category.title(),
            Style::default().fg(Color::Yellow),
        )));
        for binding in bindings.iter().filter(|b| b.category == category) {
            help_text.push(Line::from(format!(
                "  {:12} - {}",
                binding.key, binding.description
            )));
        }
    }

    help_text.push(Line::from(""));
    help_text.push(Line::from("Use ↑↓ to scroll, any other key to close"));

    let help_area = centered_rect(60, 60, area);

    let content_lines = help_text.len();
    let clamped_scroll =
        AppState::clamp_scroll(app.help_scroll_offset, content_lines, help_area.height);
    app.help_scroll_offset = clamped_scroll;

    let help = Paragraph::new(help_text)
        .style(Style::default().bg(Color::Black).fg(Color::White))
        .scroll((clamped_scroll as u16, 0))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Help")
                .style(Style::default().fg(Color::Cyan)),
        );

    f.render_widget(Clear, help_area);
    f.render_widget(help, help_area);
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
