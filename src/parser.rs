//! Extract session/weekly usage percentages from raw CLI output.

use crate::model::UsageSnapshot;
use once_cell::sync::Lazy;
use regex::Regex;

const SESSION_MARKER: &str = "Current session";
const WEEKLY_MARKER: &str = "Current week";

// First "digits%" token within a section.
static PERCENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)%").unwrap());

// "Resets <label>": the label stops at an opening parenthesis or newline,
// then optionally picks up one complete parenthesized group so a trailing
// timezone like "(Australia/Melbourne)" stays part of the label.
static RESETS_RE: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"Resets([^(\n]*(?:\([^)\n]*\))?)").unwrap());

/// Parse usage output into a snapshot.
///
/// The output may contain echoed earlier report blocks (retried prompts,
/// scrollback), so only the bottom-most occurrence of each marker is
/// authoritative. Returns `None` when neither percentage is present.
pub fn parse_usage(raw: &str) -> Option<UsageSnapshot> {
	if raw.is_empty() {
		return None;
	}

	let (session_percent, session_reset) = match raw.rfind(SESSION_MARKER) {
		Some(idx) => {
			let rest = &raw[idx + SESSION_MARKER.len()..];
			// Session section ends at the next weekly marker, if any.
			let section = match rest.find(WEEKLY_MARKER) {
				Some(end) => &rest[..end],
				None => rest,
			};
			(first_percent(section), reset_label(section))
		}
		None => (None, None),
	};

	let weekly_percent = raw
		.rfind(WEEKLY_MARKER)
		.and_then(|idx| first_percent(&raw[idx + WEEKLY_MARKER.len()..]));

	if session_percent.is_none() && weekly_percent.is_none() {
		return None;
	}

	Some(UsageSnapshot {
		session_percent,
		weekly_percent,
		session_reset,
	})
}

fn first_percent(section: &str) -> Option<f64> {
	PERCENT_RE
		.captures(section)
		.and_then(|caps| caps.get(1))
		.and_then(|m| m.as_str().parse::<f64>().ok())
}

fn reset_label(section: &str) -> Option<String> {
	RESETS_RE
		.captures(section)
		.and_then(|caps| caps.get(1))
		.map(|m| m.as_str().trim().to_string())
		.filter(|label| !label.is_empty())
}
