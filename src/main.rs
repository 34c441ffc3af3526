use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TryRecvError};

use trafficgraph::config::{Config, Overrides};
use trafficgraph::monitor::{Sampler, detect_sources, select_source};
use trafficgraph::render::{ChartStyle, Size};
use trafficgraph::scheduler::FallbackChain;
use trafficgraph::ui::{self, AppState, CellArea, Viewport};
use trafficgraph::{ChartFrame, LegendEntry, RawInterfaceSample, TrafficEngine};

/// Longest wait between frame callbacks
const FRAME_INTERVAL: Duration = Duration::from_millis(50);

/// Surface size for headless rendering
const HEADLESS_SIZE: Size = Size {
    width: 600.0,
    height: 200.0,
};

/// trafficgraph - live per-interface network traffic charts
#[derive(Parser, Debug)]
#[command(name = "trafficgraph")]
#[command(version)]
#[command(about = "Live inbound/outbound traffic charts for every network interface", long_about = None)]
struct Args {
    /// Points kept in the rolling window
    #[arg(long, value_name = "POINTS")]
    capacity: Option<usize>,

    /// Sampling interval in milliseconds
    #[arg(long, value_name = "MS")]
    interval_ms: Option<u64>,

    /// Counter source to use (see --list-sources)
    #[arg(long, value_name = "SOURCE")]
    source: Option<String>,

    /// Replay recorded traffic payloads (JSON lines) instead of live counters
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// List all available counter sources and exit
    #[arg(long)]
    list_sources: bool,

    /// Don't restore hidden interfaces from the saved config
    #[arg(long)]
    no_restore: bool,

    /// Don't save hidden interfaces on exit
    #[arg(long)]
    no_save: bool,

    /// Sample for this many ticks without the TUI, then print the rendered charts as JSON
    #[arg(long, value_name = "TICKS")]
    headless: Option<usize>,
}

fn print_available_sources() {
    println!("trafficgraph {} - Counter Sources\n", env!("CARGO_PKG_VERSION"));

    for source in detect_sources() {
        let status = if source.available {
            "available"
        } else {
            "unavailable"
        };
        println!("  {:10} {:12} {}", source.name, status, source.description);
    }

    println!();
    println!("Usage:");
    println!("  trafficgraph [--source <name>] [--interval-ms <MS>]");
    println!("  trafficgraph --replay <FILE> [--headless <TICKS>]");
}

#[derive(Serialize)]
struct HeadlessReport<'a> {
    legend: Vec<LegendEntry>,
    #[serde(flatten)]
    frame: &'a ChartFrame,
}

async fn run_headless(
    mut engine: TrafficEngine,
    rx: &mut mpsc::Receiver<Vec<RawInterfaceSample>>,
    ticks: usize,
) -> Result<()> {
    engine.mount();

    let mut received = 0;
    while received < ticks {
        let Some(batch) = rx.recv().await else {
            log::info!("Source exhausted after {} tick(s)", received);
            break;
        };
        received += 1;
        let report = engine.ingest(&batch);
        log::debug!("Tick {}: {:?}", received, report);
    }

    let frame = engine.render(HEADLESS_SIZE);
    let report = HeadlessReport {
        legend: engine.legend(),
        frame: &frame,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to serialize charts")?
    );

    engine.unmount();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if std::env::var("RUST_LOG").is_ok() {
        pretty_env_logger::formatted_builder()
            .parse_default_env()
            .init();
    }

    if args.list_sources {
        print_available_sources();
        return Ok(());
    }

    let mut stored = Config::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config, using defaults: {:#}", e);
        Config::default()
    });
    let config = stored.with_overrides(&Overrides {
        capacity: args.capacity,
        tick_interval_ms: args.interval_ms,
        source: args.source.clone(),
    });

    let source = select_source(config.source.as_deref(), args.replay.as_deref())?;
    let source_name = source.name();
    log::info!(
        "Sampling {} every {:?}",
        source_name,
        config.tick_interval()
    );

    let (tx, mut rx) = mpsc::channel(16);
    let sampler = Sampler::spawn(source, config.tick_interval(), tx);

    let hidden = if args.no_restore {
        log::info!("Skipping hidden interface restoration (--no-restore flag)");
        Vec::new()
    } else {
        config.hidden_interfaces.clone()
    };

    if let Some(ticks) = args.headless {
        let engine =
            TrafficEngine::new(config.engine_config(ChartStyle::default())).with_hidden(hidden);
        let res = run_headless(engine, &mut rx, ticks).await;
        sampler.cancel();
        return res;
    }

    let engine =
        TrafficEngine::new(config.engine_config(ChartStyle::terminal())).with_hidden(hidden);
    let mut app = AppState::new(engine, source_name);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    app.engine.mount();
    let res = run_app(&mut terminal, &mut app, &mut rx).await;

    // Stop ticks before tearing the engine down
    sampler.cancel();
    let hidden = app.engine.hidden_interfaces();
    app.engine.unmount();

    if !args.no_save {
        // Only the hidden set goes back to disk, never this run's overrides
        stored.hidden_interfaces = hidden;
        if let Err(e) = stored.save() {
            log::warn!("Failed to save config: {}", e);
        } else {
            log::info!(
                "Saved {} hidden interface(s) to config",
                stored.hidden_interfaces.len()
            );
        }
    }

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        log::error!("Error: {:?}", err);
    }

    Ok(())
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut AppState,
    rx: &mut mpsc::Receiver<Vec<RawInterfaceSample>>,
) -> Result<()> {
    let mut needs_draw = true;
    let mut source_done = false;

    loop {
        loop {
            match rx.try_recv() {
                Ok(batch) => {
                    app.apply_batch(&batch);
                    needs_draw = true;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !source_done {
                        source_done = true;
                        app.status_message = format!("{} source finished", app.source_name);
                        needs_draw = true;
                    }
                    break;
                }
            }
        }

        let now = Instant::now();
        let container = CellArea::new("container", app.chart_area);
        let parent = CellArea::new("parent", app.frame_area);
        let viewport = Viewport;
        let chain = FallbackChain::new()
            .then(&container)
            .then(&parent)
            .then(&viewport);
        if let Some(frame) = app.engine.poll_frame(now, &chain) {
            app.frame = Some(frame);
            needs_draw = true;
        }

        if needs_draw {
            terminal.draw(|f| ui::draw_ui(f, app))?;
            needs_draw = false;
            if app.take_layout_change() {
                app.engine.notify_resize(Instant::now());
            }
        }

        let timeout = app
            .engine
            .next_deadline(Instant::now())
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(FRAME_INTERVAL)
            .min(FRAME_INTERVAL);

        if !event::poll(timeout)? {
            continue;
        }

        match event::read()? {
            Event::Resize(_, _) => {
                app.engine.notify_resize(Instant::now());
                needs_draw = true;
            }
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                // Ctrl+C always quits
                if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
                    return Ok(());
                }
                needs_draw = true;

                if app.show_help {
                    match key.code {
                        KeyCode::Up | KeyCode::Char('k') => app.scroll_help_up(),
                        KeyCode::Down | KeyCode::Char('j') => app.scroll_help_down(),
                        _ => app.show_help = false,
                    }
                    continue;
                }

                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => {
                        return Ok(());
                    }
                    KeyCode::Char('h') | KeyCode::Char('?') => {
                        app.reset_help_scroll();
                        app.show_help = true;
                    }
                    KeyCode::Up | KeyCode::Char('k') => app.select_previous(),
                    KeyCode::Down | KeyCode::Char('j') => app.select_next(),
                    KeyCode::Char(' ') | KeyCode::Enter => app.toggle_selected(),
                    KeyCode::Char('a') => app.show_all(),
                    KeyCode::Char('r') => app.reset(),
                    _ => needs_draw = false,
                }
            }
            _ => {}
        }
    }
}
