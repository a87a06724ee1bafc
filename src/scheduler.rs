//! Repeating refresh timer with an Idle/Refreshing state machine.
//!
//! One writer (the scheduler task) publishes [`RefreshView`] over a watch
//! channel; the TUI and the `status` subcommand only read. Failures never
//! blank the display: the last successful snapshot is retained until a later
//! refresh replaces it.

use crate::model::UsageSnapshot;
use crate::runner::{fetch_usage, FetchConfig, FetchOutcome};
use chrono::{DateTime, Local};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum RefreshCommand {
	/// Manual refresh. Dropped (not queued) while a refresh is in flight.
	RefreshNow,
	/// Cancel and restart the repeating timer with a new period. Does not
	/// affect an in-flight refresh.
	SetInterval(Duration),
	Shutdown,
}

/// Scheduler-owned state as seen by observers.
#[derive(Debug, Clone, Default)]
pub struct RefreshView {
	pub refreshing: bool,
	/// Last-known-good snapshot; never cleared on failure or timeout.
	pub snapshot: Option<UsageSnapshot>,
	/// When `snapshot` was captured. Only set on success.
	pub fetched_at: Option<DateTime<Local>>,
}

pub struct SchedulerHandle {
	pub commands: mpsc::UnboundedSender<RefreshCommand>,
	pub view: watch::Receiver<RefreshView>,
}

/// Spawn the scheduler task. Triggers one immediate refresh before the first
/// timer-driven one.
pub fn start(fetch: FetchConfig, interval: Duration) -> SchedulerHandle {
	let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
	let (view_tx, view_rx) = watch::channel(RefreshView::default());

	tokio::spawn(run(fetch, interval, cmd_rx, view_tx));

	SchedulerHandle {
		commands: cmd_tx,
		view: view_rx,
	}
}

async fn run(
	fetch: FetchConfig,
	interval: Duration,
	mut commands: mpsc::UnboundedReceiver<RefreshCommand>,
	view: watch::Sender<RefreshView>,
) {
	let mut ticker = tokio::time::interval(interval);
	ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

	let mut in_flight: Option<JoinHandle<FetchOutcome>> = None;
	let mut state = RefreshView::default();

	loop {
		tokio::select! {
			_ = ticker.tick() => {
				if in_flight.is_none() {
					in_flight = Some(begin_refresh(&fetch, &mut state, &view));
				}
				// A tick while refreshing is skipped, not queued.
			}
			cmd = commands.recv() => match cmd {
				Some(RefreshCommand::RefreshNow) => {
					if in_flight.is_none() {
						in_flight = Some(begin_refresh(&fetch, &mut state, &view));
					} else {
						debug!("refresh request dropped, already refreshing");
					}
				}
				Some(RefreshCommand::SetInterval(period)) => {
					info!("refresh interval set to {}s", period.as_secs());
					ticker = tokio::time::interval_at(
						tokio::time::Instant::now() + period,
						period,
					);
					ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
				}
				Some(RefreshCommand::Shutdown) | None => break,
			},
			// Guarded by `in_flight.is_some()`, so the expect cannot fire.
			outcome = async { in_flight.as_mut().expect("in_flight guarded by select").await },
				if in_flight.is_some() =>
			{
				in_flight = None;
				state.refreshing = false;
				match outcome {
					Ok(FetchOutcome::Success(snapshot)) => {
						debug!(
							"refresh ok: session {:?}, weekly {:?}",
							snapshot.session_percent, snapshot.weekly_percent
						);
						state.snapshot = Some(snapshot);
						state.fetched_at = Some(Local::now());
					}
					// Last-known-good stays in place; the normal timer
					// cadence is the only retry.
					Ok(FetchOutcome::NoData) => debug!("refresh produced no data"),
					Ok(FetchOutcome::TimedOut) => debug!("refresh timed out"),
					Err(e) => warn!("refresh task failed: {}", e),
				}
				let _ = view.send(state.clone());
			}
		}
	}

	// Shutdown: abort the in-flight refresh; kill_on_drop terminates the child.
	if let Some(handle) = in_flight {
		handle.abort();
	}
	info!("scheduler stopped");
}

fn begin_refresh(
	fetch: &FetchConfig,
	state: &mut RefreshView,
	view: &watch::Sender<RefreshView>,
) -> JoinHandle<FetchOutcome> {
	state.refreshing = true;
	let _ = view.send(state.clone());
	let fetch = fetch.clone();
	tokio::spawn(async move { fetch_usage(&fetch).await })
}
