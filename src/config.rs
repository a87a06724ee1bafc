use crate::model::DisplayMode;
use crate::runner::{FetchConfig, FETCH_TIMEOUT_SECS};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

const DEFAULT_CONFIG: &str = r#"
[general]
display_mode = "text"            # text | pie | bar
refresh_interval_secs = 300      # 60 | 120 | 300 | 600 | 900 | 1800
logs_dir = "~/.usagebar/logs"

[command]
program = "claude"
args = ["usage"]
"#;

/// The selectable refresh cadences, in seconds.
pub const REFRESH_INTERVALS: &[u64] = &[60, 120, 300, 600, 900, 1800];
pub const DEFAULT_INTERVAL_SECS: u64 = 300;

/// Invalid persisted settings are reported, then replaced with defaults;
/// they never abort startup.
#[derive(Debug, Error)]
pub enum SettingsError {
	#[error("unknown display mode {0:?} (expected text, pie, or bar)")]
	UnknownDisplayMode(String),
	#[error("unsupported refresh interval {0}s (expected one of 60, 120, 300, 600, 900, 1800)")]
	UnsupportedInterval(u64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
	pub general: General,
	#[serde(default)]
	pub command: CommandSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct General {
	pub display_mode: String,
	pub refresh_interval_secs: u64,
	#[serde(default = "default_logs_dir")]
	pub logs_dir: String,
}

/// External CLI invocation. Fixed executable plus subcommand by default; no
/// flags that change the output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSpec {
	pub program: String,
	pub args: Vec<String>,
}

impl Default for CommandSpec {
	fn default() -> Self {
		CommandSpec {
			program: "claude".to_string(),
			args: vec!["usage".to_string()],
		}
	}
}

fn default_logs_dir() -> String {
	"~/.usagebar/logs".to_string()
}

impl Config {
	pub fn display_mode(&self) -> DisplayMode {
		match DisplayMode::parse(&self.general.display_mode) {
			Some(mode) => mode,
			None => {
				warn!(
					"{}",
					SettingsError::UnknownDisplayMode(self.general.display_mode.clone())
				);
				DisplayMode::Text
			}
		}
	}

	pub fn set_display_mode(&mut self, mode: DisplayMode) {
		self.general.display_mode = mode.as_str().to_string();
	}

	pub fn refresh_interval_secs(&self) -> u64 {
		let secs = self.general.refresh_interval_secs;
		if REFRESH_INTERVALS.contains(&secs) {
			secs
		} else {
			warn!("{}", SettingsError::UnsupportedInterval(secs));
			DEFAULT_INTERVAL_SECS
		}
	}

	pub fn refresh_interval(&self) -> Duration {
		Duration::from_secs(self.refresh_interval_secs())
	}

	pub fn set_refresh_interval_secs(&mut self, secs: u64) {
		self.general.refresh_interval_secs = secs;
	}

	/// The next cadence in the fixed cycle, wrapping after 30 minutes.
	pub fn next_refresh_interval_secs(&self) -> u64 {
		let current = self.refresh_interval_secs();
		let idx = REFRESH_INTERVALS
			.iter()
			.position(|&s| s == current)
			.unwrap_or(0);
		REFRESH_INTERVALS[(idx + 1) % REFRESH_INTERVALS.len()]
	}

	pub fn fetch_config(&self) -> Result<FetchConfig> {
		Ok(self.fetch_config_at(&base_dir()?))
	}

	pub fn fetch_config_at(&self, base: &Path) -> FetchConfig {
		FetchConfig {
			program: self.command.program.clone(),
			args: self.command.args.clone(),
			work_dir: base.join("work"),
			timeout_secs: FETCH_TIMEOUT_SECS,
		}
	}

	pub fn save(&self) -> Result<()> {
		self.save_at(&base_dir()?)
	}

	pub fn save_at(&self, base: &Path) -> Result<()> {
		fs::create_dir_all(base)?;
		let content = toml::to_string_pretty(self)?;
		fs::write(base.join("config.toml"), content)?;
		Ok(())
	}
}

pub fn load_or_init() -> Result<Config> {
	load_or_init_at(&base_dir()?)
}

pub fn load_or_init_at(base: &Path) -> Result<Config> {
	if !base.exists() {
		fs::create_dir_all(base)?;
	}

	let config_path = base.join("config.toml");
	if !config_path.exists() {
		fs::write(&config_path, DEFAULT_CONFIG.trim_start())?;
	}
	let content = fs::read_to_string(&config_path)?;
	let mut cfg: Config = toml::from_str(&content)?;
	cfg.general.logs_dir = expand_path(&cfg.general.logs_dir);
	let _ = fs::create_dir_all(Path::new(&cfg.general.logs_dir));
	Ok(cfg)
}

pub fn expand_path(input: &str) -> String {
	if input.starts_with("~/") {
		if let Some(home) = dirs::home_dir() {
			return home
				.join(input.trim_start_matches("~/"))
				.to_string_lossy()
				.into_owned();
		}
	}
	input.to_string()
}

pub fn base_dir() -> Result<PathBuf> {
	dirs::home_dir()
		.map(|p| p.join(".usagebar"))
		.ok_or_else(|| anyhow::anyhow!("Failed to resolve home directory"))
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn test_init_writes_defaults() {
		let dir = TempDir::new().unwrap();
		let cfg = load_or_init_at(dir.path()).unwrap();
		assert!(dir.path().join("config.toml").exists());
		assert_eq!(cfg.display_mode(), DisplayMode::Text);
		assert_eq!(cfg.refresh_interval_secs(), 300);
		assert_eq!(cfg.command.program, "claude");
		assert_eq!(cfg.command.args, vec!["usage".to_string()]);
	}

	#[test]
	fn test_unknown_display_mode_falls_back_to_text() {
		let dir = TempDir::new().unwrap();
		let mut cfg = load_or_init_at(dir.path()).unwrap();
		cfg.general.display_mode = "pieChart".to_string();
		assert_eq!(cfg.display_mode(), DisplayMode::Text);
	}

	#[test]
	fn test_unsupported_interval_falls_back_to_default() {
		let dir = TempDir::new().unwrap();
		let mut cfg = load_or_init_at(dir.path()).unwrap();
		cfg.general.refresh_interval_secs = 42;
		assert_eq!(cfg.refresh_interval_secs(), DEFAULT_INTERVAL_SECS);
	}

	#[test]
	fn test_settings_roundtrip() {
		let dir = TempDir::new().unwrap();
		let mut cfg = load_or_init_at(dir.path()).unwrap();
		cfg.set_display_mode(DisplayMode::Bar);
		cfg.set_refresh_interval_secs(900);
		cfg.save_at(dir.path()).unwrap();

		let reloaded = load_or_init_at(dir.path()).unwrap();
		assert_eq!(reloaded.display_mode(), DisplayMode::Bar);
		assert_eq!(reloaded.refresh_interval_secs(), 900);
	}

	#[test]
	fn test_interval_cycle_wraps() {
		let dir = TempDir::new().unwrap();
		let mut cfg = load_or_init_at(dir.path()).unwrap();
		cfg.set_refresh_interval_secs(1800);
		assert_eq!(cfg.next_refresh_interval_secs(), 60);
		cfg.set_refresh_interval_secs(300);
		assert_eq!(cfg.next_refresh_interval_secs(), 600);
	}

	#[test]
	fn test_missing_command_section_uses_default() {
		let dir = TempDir::new().unwrap();
		fs::write(
			dir.path().join("config.toml"),
			"[general]\ndisplay_mode = \"pie\"\nrefresh_interval_secs = 120\n",
		)
		.unwrap();
		let cfg = load_or_init_at(dir.path()).unwrap();
		assert_eq!(cfg.display_mode(), DisplayMode::Pie);
		assert_eq!(cfg.command.program, "claude");
	}

	#[test]
	fn test_fetch_config_points_at_work_dir() {
		let dir = TempDir::new().unwrap();
		let cfg = load_or_init_at(dir.path()).unwrap();
		let fetch = cfg.fetch_config_at(dir.path());
		assert_eq!(fetch.work_dir, dir.path().join("work"));
		assert_eq!(fetch.timeout_secs, FETCH_TIMEOUT_SECS);
	}

	#[test]
	fn test_expand_path_home_prefix() {
		let home = dirs::home_dir().unwrap();
		assert_eq!(
			expand_path("~/.usagebar/logs"),
			home.join(".usagebar/logs").to_string_lossy()
		);
		assert_eq!(expand_path("/tmp/x"), "/tmp/x");
	}
}
