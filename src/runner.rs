//! Spawn the usage CLI and stream its output through the parser.

use crate::model::UsageSnapshot;
use crate::parser::parse_usage;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Wall-clock budget for one refresh cycle, measured from spawn.
pub const FETCH_TIMEOUT_SECS: u64 = 30;

/// Fallback PATH when the environment has none. Covers Homebrew on both
/// macOS architectures plus the usual system locations.
const DEFAULT_PATH: &str = "/opt/homebrew/bin:/usr/local/bin:/usr/bin:/bin";

/// How to invoke the external usage CLI.
#[derive(Debug, Clone)]
pub struct FetchConfig {
	pub program: String,
	pub args: Vec<String>,
	/// Isolated working directory, created if absent.
	pub work_dir: PathBuf,
	pub timeout_secs: u64,
}

/// Resolution of one refresh cycle. `NoData` covers both spawn failure and
/// output that parsed to nothing; the caller keeps its previous snapshot in
/// every non-`Success` case.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
	Success(UsageSnapshot),
	NoData,
	TimedOut,
}

/// Run one refresh cycle.
///
/// stdout and stderr are merged into one accumulator and re-parsed after each
/// chunk; once both percentages are present the child is killed and the
/// refresh completes early (the CLI may keep an interactive prompt open long
/// after printing the report). A child that exits first is parsed as-is.
pub async fn fetch_usage(cfg: &FetchConfig) -> FetchOutcome {
	if let Err(e) = std::fs::create_dir_all(&cfg.work_dir) {
		warn!("could not create work dir {}: {}", cfg.work_dir.display(), e);
		return FetchOutcome::NoData;
	}

	let mut cmd = Command::new(&cfg.program);
	cmd.args(&cfg.args)
		.current_dir(&cfg.work_dir)
		// Fixed minimal environment so ambient state can't change the
		// CLI's output formatting. No color codes.
		.env_clear()
		.env(
			"PATH",
			std::env::var("PATH").unwrap_or_else(|_| DEFAULT_PATH.to_string()),
		)
		.env("TERM", "dumb")
		.env("NO_COLOR", "1")
		.stdin(Stdio::null())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.kill_on_drop(true);
	if let Ok(home) = std::env::var("HOME") {
		cmd.env("HOME", home);
	}
	if let Ok(user) = std::env::var("USER") {
		cmd.env("USER", user);
	}

	let mut child = match cmd.spawn() {
		Ok(child) => child,
		Err(e) => {
			warn!("failed to spawn {}: {}", cfg.program, e);
			return FetchOutcome::NoData;
		}
	};

	let Some(mut stdout) = child.stdout.take() else {
		let _ = child.kill().await;
		return FetchOutcome::NoData;
	};
	let Some(mut stderr) = child.stderr.take() else {
		let _ = child.kill().await;
		return FetchOutcome::NoData;
	};

	let deadline = tokio::time::sleep(Duration::from_secs(cfg.timeout_secs));
	tokio::pin!(deadline);

	// Bytes, not String: a chunk boundary may split a multi-byte character,
	// so the whole accumulator is lossily decoded on each parse attempt.
	let mut accumulated: Vec<u8> = Vec::new();
	let mut out_buf = [0u8; 4096];
	let mut err_buf = [0u8; 4096];
	let mut out_open = true;
	let mut err_open = true;

	loop {
		tokio::select! {
			_ = &mut deadline => {
				warn!("usage fetch timed out after {}s", cfg.timeout_secs);
				let _ = child.kill().await;
				return FetchOutcome::TimedOut;
			}
			read = stdout.read(&mut out_buf), if out_open => match read {
				Ok(0) => out_open = false,
				Ok(n) => {
					accumulated.extend_from_slice(&out_buf[..n]);
					if let Some(snapshot) = try_complete(&accumulated) {
						let _ = child.kill().await;
						return FetchOutcome::Success(snapshot);
					}
				}
				Err(e) => {
					warn!("stdout read failed: {}", e);
					out_open = false;
				}
			},
			read = stderr.read(&mut err_buf), if err_open => match read {
				Ok(0) => err_open = false,
				Ok(n) => {
					accumulated.extend_from_slice(&err_buf[..n]);
					if let Some(snapshot) = try_complete(&accumulated) {
						let _ = child.kill().await;
						return FetchOutcome::Success(snapshot);
					}
				}
				Err(e) => {
					warn!("stderr read failed: {}", e);
					err_open = false;
				}
			},
			status = child.wait(), if !out_open && !err_open => {
				match status {
					Ok(status) => debug!("usage CLI exited with {}", status),
					Err(e) => warn!("wait for usage CLI failed: {}", e),
				}
				break;
			}
		}
	}

	// Natural exit before early completion: parse whatever accumulated.
	let text = String::from_utf8_lossy(&accumulated);
	match parse_usage(&text) {
		Some(snapshot) => FetchOutcome::Success(snapshot),
		None => {
			warn!(
				"usage CLI produced no parseable data ({} bytes); output format may have changed",
				accumulated.len()
			);
			FetchOutcome::NoData
		}
	}
}

/// Early-exit check: only a snapshot with both percentages ends the refresh
/// before the child does.
fn try_complete(accumulated: &[u8]) -> Option<UsageSnapshot> {
	let text = String::from_utf8_lossy(accumulated);
	parse_usage(&text).filter(|s| s.is_complete())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Instant;
	use tempfile::TempDir;

	fn sh_config(dir: &TempDir, script: &str, timeout_secs: u64) -> FetchConfig {
		FetchConfig {
			program: "sh".to_string(),
			args: vec!["-c".to_string(), script.to_string()],
			work_dir: dir.path().to_path_buf(),
			timeout_secs,
		}
	}

	#[tokio::test]
	async fn test_successful_fetch() {
		let dir = TempDir::new().unwrap();
		let cfg = sh_config(
			&dir,
			"echo 'Current session'; echo '45% used'; echo 'Resets 3pm (Australia/Melbourne)'; echo 'Current week'; echo '32% used'",
			10,
		);
		match fetch_usage(&cfg).await {
			FetchOutcome::Success(snapshot) => {
				assert_eq!(snapshot.session_percent, Some(45.0));
				assert_eq!(snapshot.weekly_percent, Some(32.0));
				assert_eq!(
					snapshot.session_reset.as_deref(),
					Some("3pm (Australia/Melbourne)")
				);
			}
			other => panic!("expected Success, got {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_partial_output_still_succeeds_on_exit() {
		let dir = TempDir::new().unwrap();
		let cfg = sh_config(&dir, "echo 'Current session'; echo '45% used'", 10);
		match fetch_usage(&cfg).await {
			FetchOutcome::Success(snapshot) => {
				assert_eq!(snapshot.session_percent, Some(45.0));
				assert_eq!(snapshot.weekly_percent, None);
			}
			other => panic!("expected Success, got {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_unparseable_output_is_no_data() {
		let dir = TempDir::new().unwrap();
		let cfg = sh_config(&dir, "echo 'hello world'", 10);
		assert_eq!(fetch_usage(&cfg).await, FetchOutcome::NoData);
	}

	#[tokio::test]
	async fn test_spawn_failure_is_no_data() {
		let dir = TempDir::new().unwrap();
		let cfg = FetchConfig {
			program: "/nonexistent/usagebar-test-binary".to_string(),
			args: vec![],
			work_dir: dir.path().to_path_buf(),
			timeout_secs: 10,
		};
		assert_eq!(fetch_usage(&cfg).await, FetchOutcome::NoData);
	}

	#[tokio::test]
	async fn test_timeout_kills_child() {
		let dir = TempDir::new().unwrap();
		let cfg = sh_config(&dir, "sleep 30", 1);
		let start = Instant::now();
		assert_eq!(fetch_usage(&cfg).await, FetchOutcome::TimedOut);
		assert!(start.elapsed() < Duration::from_secs(5));
	}

	#[tokio::test]
	async fn test_early_exit_before_process_ends() {
		let dir = TempDir::new().unwrap();
		// The CLI keeps an interactive prompt open after printing the report;
		// the runner must not wait for it.
		let cfg = sh_config(
			&dir,
			"echo 'Current session'; echo '45% used'; echo 'Current week'; echo '32% used'; sleep 30",
			10,
		);
		let start = Instant::now();
		match fetch_usage(&cfg).await {
			FetchOutcome::Success(snapshot) => assert!(snapshot.is_complete()),
			other => panic!("expected Success, got {:?}", other),
		}
		assert!(start.elapsed() < Duration::from_secs(5));
	}

	#[tokio::test]
	async fn test_stderr_is_merged() {
		let dir = TempDir::new().unwrap();
		let cfg = sh_config(
			&dir,
			"echo 'Current session' 1>&2; echo '45% used' 1>&2; echo 'Current week'; echo '32% used'",
			10,
		);
		match fetch_usage(&cfg).await {
			FetchOutcome::Success(snapshot) => {
				assert_eq!(snapshot.session_percent, Some(45.0));
				assert_eq!(snapshot.weekly_percent, Some(32.0));
			}
			other => panic!("expected Success, got {:?}", other),
		}
	}
}
