mod config;
mod model;
mod parser;
mod render;
mod runner;
mod scheduler;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use crossterm::{
	event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
	execute,
	terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use model::{DisplayMode, UsageTier};
use ratatui::{
	prelude::*,
	widgets::{Block, Borders, Gauge, Paragraph, Wrap},
};
use render::{format_interval, status_line, tier_color};
use runner::{FetchOutcome, FETCH_TIMEOUT_SECS};
use scheduler::{RefreshCommand, RefreshView, SchedulerHandle};
use std::fs;
use std::io::stdout;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const SPINNER_FRAMES: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

#[derive(Parser)]
#[command(name = "usagebar")]
#[command(about = "Terminal status indicator for Claude Code usage limits")]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
	/// Run one refresh cycle and print the parsed snapshot as JSON
	Status,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();
	let cfg = config::load_or_init().context("failed to load config")?;
	setup_logging(&cfg)?;

	match cli.command {
		Some(Commands::Status) => {
			let fetch = cfg.fetch_config()?;
			match runner::fetch_usage(&fetch).await {
				FetchOutcome::Success(snapshot) => {
					println!("{}", serde_json::to_string_pretty(&snapshot)?);
					Ok(())
				}
				FetchOutcome::NoData => {
					anyhow::bail!("no usage data found in {} output", fetch.program)
				}
				FetchOutcome::TimedOut => {
					anyhow::bail!("{} timed out after {}s", fetch.program, FETCH_TIMEOUT_SECS)
				}
			}
		}
		None => {
			let handle = scheduler::start(cfg.fetch_config()?, cfg.refresh_interval());
			run_tui(cfg, handle)
		}
	}
}

fn setup_logging(cfg: &Config) -> Result<()> {
	let dir = Path::new(&cfg.general.logs_dir);
	fs::create_dir_all(dir)?;
	let file = fs::File::create(dir.join("usagebar.log"))
		.with_context(|| format!("failed to open log file in {}", dir.display()))?;

	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new("usagebar=info"));
	tracing_subscriber::registry()
		.with(filter)
		.with(
			tracing_subscriber::fmt::layer()
				.with_target(false)
				.with_ansi(false)
				.with_writer(std::sync::Mutex::new(file)),
		)
		.init();
	Ok(())
}

fn run_tui(mut cfg: Config, handle: SchedulerHandle) -> Result<()> {
	enable_raw_mode()?;
	let mut stdout_handle = stdout();
	execute!(stdout_handle, EnterAlternateScreen)?;
	let backend = ratatui::backend::CrosstermBackend::new(stdout_handle);
	let mut terminal = ratatui::Terminal::new(backend)?;

	let mut mode = cfg.display_mode();
	let mut interval_secs = cfg.refresh_interval_secs();
	let mut spinner_tick: usize = 0;
	let mut status_message: Option<(String, Instant)> = None;
	let mut view = handle.view.clone();

	loop {
		if status_message
			.as_ref()
			.map(|(_, ts)| ts.elapsed() >= Duration::from_secs(5))
			.unwrap_or(false)
		{
			status_message = None;
		}

		let current = view.borrow_and_update().clone();
		if current.refreshing {
			spinner_tick = spinner_tick.wrapping_add(1);
		}

		terminal.draw(|f| {
			draw(
				f,
				&current,
				mode,
				interval_secs,
				spinner_tick,
				status_message.as_ref().map(|(msg, _)| msg.as_str()),
			)
		})?;

		if event::poll(Duration::from_millis(200))? {
			if let Event::Key(key) = event::read()? {
				if key.kind != KeyEventKind::Press {
					continue;
				}
				match key.code {
					KeyCode::Char('q') | KeyCode::Esc => break,
					KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,
					KeyCode::Char('r') => {
						let _ = handle.commands.send(RefreshCommand::RefreshNow);
					}
					KeyCode::Char('m') => {
						mode = mode.cycle();
						cfg.set_display_mode(mode);
						persist(&cfg, &mut status_message);
						set_message(&mut status_message, format!("display mode: {}", mode.as_str()));
					}
					KeyCode::Char('i') => {
						interval_secs = cfg.next_refresh_interval_secs();
						cfg.set_refresh_interval_secs(interval_secs);
						persist(&cfg, &mut status_message);
						let _ = handle
							.commands
							.send(RefreshCommand::SetInterval(Duration::from_secs(interval_secs)));
						set_message(
							&mut status_message,
							format!("refresh interval: {}", format_interval(interval_secs)),
						);
					}
					_ => {}
				}
			}
		}
	}

	let _ = handle.commands.send(RefreshCommand::Shutdown);
	disable_raw_mode()?;
	execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
	Ok(())
}

fn persist(cfg: &Config, status_message: &mut Option<(String, Instant)>) {
	if let Err(e) = cfg.save() {
		set_message(status_message, format!("failed to save settings: {e}"));
	}
}

fn set_message(status_message: &mut Option<(String, Instant)>, msg: String) {
	*status_message = Some((msg, Instant::now()));
}

fn draw(
	f: &mut Frame,
	view: &RefreshView,
	mode: DisplayMode,
	interval_secs: u64,
	spinner_tick: usize,
	status_message: Option<&str>,
) {
	let area = f.area();
	let vertical = Layout::default()
		.direction(Direction::Vertical)
		.constraints(
			[
				Constraint::Length(1), // status bar
				Constraint::Length(3), // session gauge
				Constraint::Length(3), // weekly gauge
				Constraint::Min(2),    // info
				Constraint::Length(2), // footer
			]
			.as_ref(),
		)
		.split(area);

	// The compact indicator itself, with a spinner while a refresh runs.
	let mut bar = status_line(view.snapshot.as_ref(), mode);
	if view.refreshing {
		let frame = SPINNER_FRAMES[spinner_tick % SPINNER_FRAMES.len()];
		bar.push_span(Span::styled(
			format!("  {frame}"),
			Style::default().fg(Color::Cyan),
		));
	}
	f.render_widget(Paragraph::new(bar), vertical[0]);

	let snapshot = view.snapshot.as_ref();
	render_gauge(
		f,
		vertical[1],
		"Session",
		snapshot.and_then(|s| s.session_percent),
	);
	render_gauge(
		f,
		vertical[2],
		"Week (all models)",
		snapshot.and_then(|s| s.weekly_percent),
	);

	let mut info_lines: Vec<Line> = Vec::new();
	if let Some(reset) = snapshot.and_then(|s| s.session_reset.as_deref()) {
		info_lines.push(Line::from(format!("Session resets {reset}")));
	}
	match view.fetched_at {
		Some(ts) => info_lines.push(Line::from(Span::styled(
			format!("updated {}", ts.format("%H:%M:%S")),
			Style::default().fg(Color::DarkGray),
		))),
		None => info_lines.push(Line::from(Span::styled(
			"waiting for first report…",
			Style::default().fg(Color::DarkGray),
		))),
	}
	f.render_widget(Paragraph::new(info_lines).wrap(Wrap { trim: true }), vertical[3]);

	let footer = match status_message {
		Some(msg) => Line::from(Span::styled(msg.to_string(), Style::default().fg(Color::Cyan))),
		None => Line::from(Span::styled(
			format!(
				"q quit · r refresh · m mode: {} · i interval: {}",
				mode.as_str(),
				format_interval(interval_secs)
			),
			Style::default().fg(Color::DarkGray),
		)),
	};
	f.render_widget(
		Paragraph::new(footer).block(Block::default().borders(Borders::TOP)),
		vertical[4],
	);
}

fn render_gauge(f: &mut Frame, area: Rect, title: &str, percent: Option<f64>) {
	let block = Block::default().borders(Borders::ALL).title(title.to_string());
	match percent {
		Some(p) => {
			let clamped = p.clamp(0.0, 100.0);
			let gauge = Gauge::default()
				.block(block)
				.gauge_style(Style::default().fg(tier_color(UsageTier::for_percent(p))))
				.percent(clamped.round() as u16)
				.label(format!("{:.0}%", p));
			f.render_widget(gauge, area);
		}
		None => {
			let empty = Paragraph::new(Span::styled("–", Style::default().fg(Color::DarkGray)))
				.block(block);
			f.render_widget(empty, area);
		}
	}
}
