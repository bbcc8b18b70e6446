//! Identifiers and payload value types shared by host and surfaces.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque handle for one attached display surface.
///
/// Handles are allocated monotonically by the host and never reused, so a
/// detached handle can never alias a later surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SurfaceId(pub u64);

impl fmt::Display for SurfaceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "surface#{}", self.0)
	}
}

/// Role of a display surface. No uniqueness constraint applies to kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceKind {
	/// The main feature panel.
	Primary,
	/// A sidebar dashboard.
	Secondary,
	/// An editor overlay.
	Overlay,
}

impl SurfaceKind {
	/// Returns the lowercase wire name.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Primary => "primary",
			Self::Secondary => "secondary",
			Self::Overlay => "overlay",
		}
	}
}

impl fmt::Display for SurfaceKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Error returned when parsing an unknown surface kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown surface kind `{0}` (expected primary, secondary or overlay)")]
pub struct UnknownSurfaceKind(pub String);

impl FromStr for SurfaceKind {
	type Err = UnknownSurfaceKind;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"primary" => Ok(Self::Primary),
			"secondary" => Ok(Self::Secondary),
			"overlay" => Ok(Self::Overlay),
			other => Err(UnknownSurfaceKind(other.to_string())),
		}
	}
}

/// Identifier of a feature a surface can display (`commit`, `chat`, `quiz-js-easy`, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(String);

impl FeatureId {
	/// Wraps a feature name.
	pub fn new(name: impl Into<String>) -> Self {
		Self(name.into())
	}

	/// Returns the feature name.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for FeatureId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for FeatureId {
	fn from(name: &str) -> Self {
		Self::new(name)
	}
}

/// Colour theme category reported by the host, encoded as an integer on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ThemeKind {
	/// Light theme (`1`).
	Light,
	/// Dark theme (`2`).
	#[default]
	Dark,
	/// High contrast dark theme (`3`).
	HighContrast,
	/// High contrast light theme (`4`).
	HighContrastLight,
}

impl From<ThemeKind> for u8 {
	fn from(kind: ThemeKind) -> Self {
		match kind {
			ThemeKind::Light => 1,
			ThemeKind::Dark => 2,
			ThemeKind::HighContrast => 3,
			ThemeKind::HighContrastLight => 4,
		}
	}
}

/// Error returned for an out-of-range theme code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown theme kind {0}")]
pub struct UnknownThemeKind(pub u8);

impl TryFrom<u8> for ThemeKind {
	type Error = UnknownThemeKind;

	fn try_from(code: u8) -> Result<Self, Self::Error> {
		match code {
			1 => Ok(Self::Light),
			2 => Ok(Self::Dark),
			3 => Ok(Self::HighContrast),
			4 => Ok(Self::HighContrastLight),
			other => Err(UnknownThemeKind(other)),
		}
	}
}

/// Quiz identifier, e.g. `quiz-css-hard`.
pub type QuizId = String;

/// Last recorded attempt of one quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizScore {
	/// Correct answers.
	pub score: u32,
	/// Number of questions.
	pub total: u32,
	/// Milliseconds since the Unix epoch.
	#[serde(rename = "lastAttempt")]
	pub last_attempt: u64,
}

/// Zero-based line/character position inside a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
	/// Zero-based line index.
	pub line: u32,
	/// Zero-based character offset within the line.
	pub character: u32,
}

impl Position {
	/// Creates a position.
	pub const fn new(line: u32, character: u32) -> Self {
		Self { line, character }
	}
}

/// Half-open range between two positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
	/// Inclusive start.
	pub start: Position,
	/// Exclusive end.
	pub end: Position,
}

impl Range {
	/// Creates a range.
	pub const fn new(start: Position, end: Position) -> Self {
		Self { start, end }
	}

	/// Returns true when `start` does not come after `end`.
	pub fn is_ordered(&self) -> bool {
		self.start <= self.end
	}
}

/// One structural replacement inside a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextEdit {
	/// Replaced range.
	pub range: Range,
	/// Replacement text.
	#[serde(default)]
	pub new_text: String,
}

/// Snapshot of the document in the active editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorSnapshot {
	/// Document URI.
	pub uri: String,
	/// Full document text.
	pub text: String,
	/// Language identifier (`rust`, `typescript`, ...).
	pub language_id: String,
	/// Base name of the document file.
	pub file_name: String,
	/// Number of lines.
	pub line_count: u32,
}

/// One selection in an editor, with the selected text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
	/// Selection anchor start.
	pub start: Position,
	/// Selection end.
	pub end: Position,
	/// Selected text.
	pub text: String,
}

/// A marker comment found by the source scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
	/// Base name of the file containing the marker.
	pub file: String,
	/// One-based line number.
	pub line: u32,
	/// Trimmed line text.
	pub text: String,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn theme_kind_round_trips_as_integer() {
		assert_eq!(serde_json::to_string(&ThemeKind::Light).unwrap(), "1");
		assert_eq!(serde_json::from_str::<ThemeKind>("4").unwrap(), ThemeKind::HighContrastLight);
		assert!(serde_json::from_str::<ThemeKind>("9").is_err());
	}

	#[test]
	fn surface_kind_parses_wire_names() {
		assert_eq!("overlay".parse::<SurfaceKind>(), Ok(SurfaceKind::Overlay));
		assert_eq!(
			"panel".parse::<SurfaceKind>(),
			Err(UnknownSurfaceKind("panel".to_string()))
		);
	}

	#[test]
	fn positions_order_by_line_then_character() {
		assert!(Position::new(1, 9) < Position::new(2, 0));
		assert!(Position::new(2, 1) > Position::new(2, 0));
		assert!(!Range::new(Position::new(3, 0), Position::new(2, 5)).is_ordered());
	}

	#[test]
	fn quiz_score_uses_last_attempt_field() {
		let score = QuizScore {
			score: 3,
			total: 5,
			last_attempt: 1_700_000_000_000,
		};
		let json = serde_json::to_value(score).unwrap();
		assert_eq!(json["lastAttempt"], 1_700_000_000_000u64);
	}
}
