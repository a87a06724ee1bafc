use serde::{Deserialize, Serialize};

/// One parsed usage reading from the external CLI.
///
/// Constructed only when at least one of the two percentages was found;
/// output containing neither yields no snapshot at all, never a zeroed one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSnapshot {
	/// Session usage, 0-100. Absent if not present in the output.
	pub session_percent: Option<f64>,
	/// Weekly usage, 0-100. Absent if not present in the output.
	pub weekly_percent: Option<f64>,
	/// Free-text reset label, e.g. "3pm (Australia/Melbourne)".
	pub session_reset: Option<String>,
}

impl UsageSnapshot {
	/// Both percentages present. Used by the runner to finish a refresh
	/// before the child process exits.
	pub fn is_complete(&self) -> bool {
		self.session_percent.is_some() && self.weekly_percent.is_some()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
	Text,
	Pie,
	Bar,
}

impl DisplayMode {
	pub fn parse(s: &str) -> Option<DisplayMode> {
		match s {
			"text" => Some(DisplayMode::Text),
			"pie" => Some(DisplayMode::Pie),
			"bar" => Some(DisplayMode::Bar),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			DisplayMode::Text => "text",
			DisplayMode::Pie => "pie",
			DisplayMode::Bar => "bar",
		}
	}

	pub fn cycle(self) -> DisplayMode {
		match self {
			DisplayMode::Text => DisplayMode::Pie,
			DisplayMode::Pie => DisplayMode::Bar,
			DisplayMode::Bar => DisplayMode::Text,
		}
	}
}

/// Color tier shared by all three display modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageTier {
	Nominal,
	Warning,
	Alert,
}

impl UsageTier {
	/// Lower bounds are inclusive: exactly 70 is Warning, exactly 90 is Alert.
	pub fn for_percent(percent: f64) -> UsageTier {
		if percent >= 90.0 {
			UsageTier::Alert
		} else if percent >= 70.0 {
			UsageTier::Warning
		} else {
			UsageTier::Nominal
		}
	}
}
