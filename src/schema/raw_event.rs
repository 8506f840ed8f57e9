//! Session label log line schema
//!
//! Each line of a session log is `<channel-facet> <timestamp>`, for example
//! `gesture_1_s 12.35`. The channel part is resolved through a static table
//! that knows the experiment vocabulary:
//!
//! - canonical channels (`command`, `prompt`, `reward`, `abort`, `response`)
//! - `noise_0` / `noise_1`, aliases of `command` / `prompt`
//! - `audio_0/1`, `gesture_0/1`, redundant response sub-channels
//!
//! Collision rules: an alias shares the columns of the channel it aliases and a
//! later write wins; every response sub-channel shares the `response` columns
//! and is reconciled with min (starts) / max (ends) by the normalizer.

use crate::types::{Event, Facet, FacetKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Current log line format identifier
pub const LOG_FORMAT: &str = "itbn.label_line.v1";

/// Instance index of a redundant sensory channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubChannel {
    /// `_0`: first instance
    Zero,
    /// `_1`: second instance
    One,
}

impl SubChannel {
    pub fn suffix(&self) -> &'static str {
        match self {
            SubChannel::Zero => "_0",
            SubChannel::One => "_1",
        }
    }
}

/// A channel as written in the raw log, before aliasing and merging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawChannel {
    /// Already canonical
    Canonical(Event),
    /// `noise_0` / `noise_1`
    Noise(SubChannel),
    /// `audio_0` / `audio_1`
    Audio(SubChannel),
    /// `gesture_0` / `gesture_1`
    Gesture(SubChannel),
}

/// Raw channel name → channel
const CHANNEL_TABLE: &[(&str, RawChannel)] = &[
    ("command", RawChannel::Canonical(Event::Command)),
    ("prompt", RawChannel::Canonical(Event::Prompt)),
    ("reward", RawChannel::Canonical(Event::Reward)),
    ("abort", RawChannel::Canonical(Event::Abort)),
    ("response", RawChannel::Canonical(Event::Response)),
    ("noise_0", RawChannel::Noise(SubChannel::Zero)),
    ("noise_1", RawChannel::Noise(SubChannel::One)),
    ("audio_0", RawChannel::Audio(SubChannel::Zero)),
    ("audio_1", RawChannel::Audio(SubChannel::One)),
    ("gesture_0", RawChannel::Gesture(SubChannel::Zero)),
    ("gesture_1", RawChannel::Gesture(SubChannel::One)),
];

impl RawChannel {
    /// Look up a raw channel name in the vocabulary
    pub fn resolve(name: &str) -> Option<RawChannel> {
        CHANNEL_TABLE
            .iter()
            .find(|(raw, _)| *raw == name)
            .map(|(_, channel)| *channel)
    }

    /// Every raw channel name in the vocabulary
    pub fn names() -> impl Iterator<Item = &'static str> {
        CHANNEL_TABLE.iter().map(|(raw, _)| *raw)
    }

    pub fn name(&self) -> &'static str {
        CHANNEL_TABLE
            .iter()
            .find(|(_, channel)| channel == self)
            .map(|(raw, _)| *raw)
            .unwrap_or("unknown")
    }

    /// The canonical event this channel's facets are stored under
    pub fn target(&self) -> Event {
        match self {
            RawChannel::Canonical(event) => *event,
            RawChannel::Noise(SubChannel::Zero) => Event::Command,
            RawChannel::Noise(SubChannel::One) => Event::Prompt,
            RawChannel::Audio(_) | RawChannel::Gesture(_) => Event::Response,
        }
    }

    /// Sub-channel instance of a redundant sensory channel, if any
    pub fn sub_channel(&self) -> Option<SubChannel> {
        match self {
            RawChannel::Audio(sub) | RawChannel::Gesture(sub) => Some(*sub),
            _ => None,
        }
    }
}

impl fmt::Display for RawChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One `(channel-facet, timestamp)` line of a session log
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawEventRecord {
    /// 1-based line number in the source log
    pub line: usize,
    pub channel: RawChannel,
    pub kind: FacetKind,
    pub timestamp: f64,
}

impl RawEventRecord {
    pub fn new(line: usize, channel: RawChannel, kind: FacetKind, timestamp: f64) -> Self {
        Self {
            line,
            channel,
            kind,
            timestamp,
        }
    }

    /// Parse one non-blank log line
    pub fn parse(line: usize, text: &str) -> Result<Self, ValidationError> {
        let mut fields = text.split_whitespace();
        let (label, value) = match (fields.next(), fields.next(), fields.next()) {
            (Some(label), Some(value), None) => (label, value),
            _ => {
                return Err(ValidationError::FieldCount {
                    found: text.split_whitespace().count(),
                })
            }
        };

        let (channel_name, kind) = FacetKind::split(label);
        let channel = RawChannel::resolve(channel_name)
            .ok_or_else(|| ValidationError::UnknownChannel(label.to_string()))?;

        let timestamp = value
            .parse::<f64>()
            .map_err(|_| ValidationError::InvalidTimestamp(value.to_string()))?;

        Ok(Self::new(line, channel, kind, timestamp))
    }

    /// The facet this record lands on after aliasing/merging
    pub fn target_facet(&self) -> Facet {
        Facet::new(self.channel.target(), self.kind)
    }

    /// Render back into log line form
    pub fn label(&self) -> String {
        format!("{}{}", self.channel.name(), self.kind.suffix())
    }
}

/// Validation errors for log lines
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("expected '<facet> <timestamp>', found {found} field(s)")]
    FieldCount { found: usize },

    #[error("unknown channel facet '{0}'")]
    UnknownChannel(String),

    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sub_channel_line() {
        let record = RawEventRecord::parse(3, "gesture_1_s 12.35").unwrap();
        assert_eq!(record.line, 3);
        assert_eq!(record.channel, RawChannel::Gesture(SubChannel::One));
        assert_eq!(record.kind, FacetKind::Start);
        assert!((record.timestamp - 12.35).abs() < 1e-12);
        assert_eq!(record.target_facet(), Event::Response.start());
        assert_eq!(record.label(), "gesture_1_s");
    }

    #[test]
    fn test_noise_aliases() {
        let command = RawEventRecord::parse(1, "noise_0_e 4").unwrap();
        assert_eq!(command.target_facet(), Event::Command.end());

        let prompt = RawEventRecord::parse(1, "noise_1 1").unwrap();
        assert_eq!(prompt.target_facet(), Event::Prompt.occurrence());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            RawEventRecord::parse(1, "reward_s"),
            Err(ValidationError::FieldCount { found: 1 })
        );
        assert_eq!(
            RawEventRecord::parse(1, "reward_s 1.0 2.0"),
            Err(ValidationError::FieldCount { found: 3 })
        );
        assert_eq!(
            RawEventRecord::parse(1, "smell_0_s 1.0"),
            Err(ValidationError::UnknownChannel("smell_0_s".to_string()))
        );
        assert_eq!(
            RawEventRecord::parse(1, "reward_s abc"),
            Err(ValidationError::InvalidTimestamp("abc".to_string()))
        );
    }

    #[test]
    fn test_every_name_resolves_to_itself() {
        for name in RawChannel::names() {
            let channel = RawChannel::resolve(name).unwrap();
            assert_eq!(channel.name(), name);
        }
    }
}
