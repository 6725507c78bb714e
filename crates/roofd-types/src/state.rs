//! Roof and heartbeat state enumerations with their display tables.
//!
//! Labels and emphasis come from fixed per-state `match` tables, so adding a
//! state without a label is a compile error.  Raw integers received from an
//! older or newer peer are rendered through [`RoofState::label_for`] /
//! [`HeartbeatState::label_for`], which fall back to an `UNKNOWN` label styled
//! as an error instead of failing.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Label used for any state value outside the defined range.
pub const UNKNOWN_LABEL: &str = "UNKNOWN";

// ────────────────────────────────────────────────────────────────────────────
// Display emphasis
// ────────────────────────────────────────────────────────────────────────────

/// Terminal colour used to emphasise a state label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Default,
    Red,
    Green,
    Yellow,
    Cyan,
}

impl Color {
    /// Markup tag name, `None` for the terminal's default colour.
    pub const fn tag(self) -> Option<&'static str> {
        match self {
            Color::Default => None,
            Color::Red => Some("red"),
            Color::Green => Some("green"),
            Color::Yellow => Some("yellow"),
            Color::Cyan => Some("cyan"),
        }
    }
}

/// Colour and weight applied to a label when formatting is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Emphasis {
    pub color: Color,
    pub bold: bool,
}

impl Emphasis {
    /// Emphasis of the `UNKNOWN` label.
    pub const ERROR: Emphasis = Emphasis::bold(Color::Red);

    pub const fn bold(color: Color) -> Self {
        Self { color, bold: true }
    }

    /// Wrap `label` in `[b]`/`[color]` markup tags.
    pub fn wrap(self, label: &str) -> String {
        let mut out = String::with_capacity(label.len() + 24);
        if self.bold {
            out.push_str("[b]");
        }
        if let Some(tag) = self.color.tag() {
            out.push_str(&format!("[{tag}]{label}[/{tag}]"));
        } else {
            out.push_str(label);
        }
        if self.bold {
            out.push_str("[/b]");
        }
        out
    }
}

fn render(label: &'static str, emphasis: Emphasis, formatted: bool) -> Cow<'static, str> {
    if formatted {
        Cow::Owned(emphasis.wrap(label))
    } else {
        Cow::Borrowed(label)
    }
}

fn render_unknown(formatted: bool) -> Cow<'static, str> {
    render(UNKNOWN_LABEL, Emphasis::ERROR, formatted)
}

// ────────────────────────────────────────────────────────────────────────────
// RoofState
// ────────────────────────────────────────────────────────────────────────────

/// Logical position of the rolling roof.
///
/// `Open` and `Closed` are the terminal states of a motion cycle; `Opening`
/// and `Closing` are transient.  `PartiallyOpen` means the physical position
/// is not confirmed (interrupted or unacknowledged motion).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum RoofState {
    PartiallyOpen = 0,
    Closed = 1,
    Open = 2,
    Closing = 3,
    Opening = 4,
}

impl RoofState {
    pub const ALL: [RoofState; 5] = [
        RoofState::PartiallyOpen,
        RoofState::Closed,
        RoofState::Open,
        RoofState::Closing,
        RoofState::Opening,
    ];

    pub fn from_raw(raw: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| *s as i64 == raw)
    }

    /// `true` while a motion is in flight.
    pub const fn is_moving(self) -> bool {
        matches!(self, RoofState::Opening | RoofState::Closing)
    }

    pub const fn text(self) -> &'static str {
        match self {
            RoofState::PartiallyOpen => "PARTIALLY OPEN",
            RoofState::Closed => "CLOSED",
            RoofState::Open => "OPEN",
            RoofState::Closing => "CLOSING",
            RoofState::Opening => "OPENING",
        }
    }

    pub const fn emphasis(self) -> Emphasis {
        match self {
            RoofState::PartiallyOpen => Emphasis::bold(Color::Cyan),
            RoofState::Closed => Emphasis::bold(Color::Red),
            RoofState::Open => Emphasis::bold(Color::Green),
            RoofState::Closing | RoofState::Opening => Emphasis::bold(Color::Yellow),
        }
    }

    /// Uppercase label, wrapped in emphasis markup when `formatted`.
    pub fn label(self, formatted: bool) -> Cow<'static, str> {
        render(self.text(), self.emphasis(), formatted)
    }

    /// Label for a raw wire value; out-of-range values render as `UNKNOWN`.
    pub fn label_for(raw: i64, formatted: bool) -> Cow<'static, str> {
        match Self::from_raw(raw) {
            Some(state) => state.label(formatted),
            None => render_unknown(formatted),
        }
    }
}

impl From<RoofState> for u8 {
    fn from(state: RoofState) -> Self {
        state as u8
    }
}

impl TryFrom<u8> for RoofState {
    type Error = String;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        RoofState::from_raw(raw.into()).ok_or_else(|| format!("unknown roof state {raw}"))
    }
}

impl fmt::Display for RoofState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// HeartbeatState
// ────────────────────────────────────────────────────────────────────────────

/// State of the heartbeat deadman switch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum HeartbeatState {
    #[default]
    Disabled = 0,
    Active = 1,
    TimedOut = 2,
}

impl HeartbeatState {
    pub const ALL: [HeartbeatState; 3] = [
        HeartbeatState::Disabled,
        HeartbeatState::Active,
        HeartbeatState::TimedOut,
    ];

    pub fn from_raw(raw: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| *s as i64 == raw)
    }

    pub const fn text(self) -> &'static str {
        match self {
            HeartbeatState::Disabled => "DISABLED",
            HeartbeatState::Active => "ACTIVE",
            HeartbeatState::TimedOut => "TIMED OUT",
        }
    }

    pub const fn emphasis(self) -> Emphasis {
        match self {
            HeartbeatState::Disabled => Emphasis::bold(Color::Default),
            HeartbeatState::Active => Emphasis::bold(Color::Green),
            HeartbeatState::TimedOut => Emphasis::bold(Color::Red),
        }
    }

    pub fn label(self, formatted: bool) -> Cow<'static, str> {
        render(self.text(), self.emphasis(), formatted)
    }

    pub fn label_for(raw: i64, formatted: bool) -> Cow<'static, str> {
        match Self::from_raw(raw) {
            Some(state) => state.label(formatted),
            None => render_unknown(formatted),
        }
    }
}

impl From<HeartbeatState> for u8 {
    fn from(state: HeartbeatState) -> Self {
        state as u8
    }
}

impl TryFrom<u8> for HeartbeatState {
    type Error = String;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        HeartbeatState::from_raw(raw.into()).ok_or_else(|| format!("unknown heartbeat state {raw}"))
    }
}

impl fmt::Display for HeartbeatState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}
