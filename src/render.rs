//! Status-bar glyph rendering for the three display modes.
//!
//! The three-tier color mapping is a shared contract: every mode goes
//! through [`UsageTier::for_percent`] so thresholds cannot drift apart.

use crate::model::{DisplayMode, UsageSnapshot, UsageTier};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

/// Fill steps for pie mode, empty to full.
const PIE_GLYPHS: [char; 5] = ['○', '◔', '◑', '◕', '●'];

/// Cell count for bar mode.
pub const BAR_WIDTH: usize = 5;

pub fn tier_color(tier: UsageTier) -> Color {
	match tier {
		UsageTier::Nominal => Color::Green,
		UsageTier::Warning => Color::Yellow,
		UsageTier::Alert => Color::Red,
	}
}

fn tier_style(percent: f64) -> Style {
	Style::default().fg(tier_color(UsageTier::for_percent(percent)))
}

fn dim() -> Style {
	Style::default().fg(Color::DarkGray)
}

/// Nearest pie glyph for a percentage (clamped to 0-100).
pub fn pie_glyph(percent: f64) -> char {
	let clamped = percent.clamp(0.0, 100.0);
	let step = (clamped / 100.0 * (PIE_GLYPHS.len() - 1) as f64).round() as usize;
	PIE_GLYPHS[step.min(PIE_GLYPHS.len() - 1)]
}

/// Mini bar of `width` cells, filled proportionally (clamped to 0-100).
pub fn bar_string(percent: f64, width: usize) -> String {
	let clamped = percent.clamp(0.0, 100.0);
	let filled = (clamped / 100.0 * width as f64).round() as usize;
	let filled = filled.min(width);
	let mut bar = String::with_capacity(width * 3);
	for _ in 0..filled {
		bar.push('▰');
	}
	for _ in filled..width {
		bar.push('▱');
	}
	bar
}

fn metric_spans(label: &str, percent: Option<f64>, mode: DisplayMode) -> Vec<Span<'static>> {
	let mut spans = vec![Span::styled(format!("{label} "), dim())];
	match percent {
		Some(p) => {
			let style = tier_style(p);
			match mode {
				DisplayMode::Text => {
					spans.push(Span::styled(format!("{:.0}%", p), style));
				}
				DisplayMode::Pie => {
					spans.push(Span::styled(format!("{} ", pie_glyph(p)), style));
					spans.push(Span::styled(format!("{:.0}%", p), style));
				}
				DisplayMode::Bar => {
					spans.push(Span::styled(bar_string(p, BAR_WIDTH), style));
				}
			}
		}
		None => spans.push(Span::styled("–", dim())),
	}
	spans
}

/// The compact one-line indicator, the terminal stand-in for a menu-bar glyph.
///
/// Before the first successful refresh this is a placeholder; afterwards it
/// always shows the last-known-good reading, stale or not.
pub fn status_line(snapshot: Option<&UsageSnapshot>, mode: DisplayMode) -> Line<'static> {
	let Some(snapshot) = snapshot else {
		return Line::from(vec![
			Span::styled("usage ", Style::default().add_modifier(Modifier::BOLD)),
			Span::styled("–", dim()),
		]);
	};

	let mut spans = vec![Span::styled(
		"usage ",
		Style::default().add_modifier(Modifier::BOLD),
	)];
	spans.extend(metric_spans("S", snapshot.session_percent, mode));
	spans.push(Span::styled(" · ", dim()));
	spans.extend(metric_spans("W", snapshot.weekly_percent, mode));
	Line::from(spans)
}

/// Human label for a refresh interval, e.g. 300 -> "5m".
pub fn format_interval(secs: u64) -> String {
	if secs % 60 == 0 && secs >= 60 {
		format!("{}m", secs / 60)
	} else {
		format!("{}s", secs)
	}
}
