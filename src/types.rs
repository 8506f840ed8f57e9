//! Core types for the ITBN feature pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: canonical events and facets, correction policies, session keys and
//! the per-session canonical event table.

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Canonical event family, in feature column order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Event {
    Command,
    Prompt,
    Reward,
    Abort,
    Response,
}

impl Event {
    /// All canonical events in column order
    pub const ALL: [Event; 5] = [
        Event::Command,
        Event::Prompt,
        Event::Reward,
        Event::Abort,
        Event::Response,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Event::Command => "command",
            Event::Prompt => "prompt",
            Event::Reward => "reward",
            Event::Abort => "abort",
            Event::Response => "response",
        }
    }

    pub fn from_name(name: &str) -> Option<Event> {
        Event::ALL.into_iter().find(|event| event.as_str() == name)
    }

    /// Position of this event family in [`Event::ALL`]
    pub fn ordinal(&self) -> usize {
        *self as usize
    }

    pub fn start(self) -> Facet {
        Facet::new(self, FacetKind::Start)
    }

    pub fn end(self) -> Facet {
        Facet::new(self, FacetKind::End)
    }

    pub fn occurrence(self) -> Facet {
        Facet::new(self, FacetKind::Occurrence)
    }
}

/// Observable aspect of an event channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacetKind {
    /// `<channel>_s`
    Start,
    /// `<channel>_e`
    End,
    /// bare `<channel>`
    Occurrence,
}

impl FacetKind {
    pub const ALL: [FacetKind; 3] = [FacetKind::Start, FacetKind::End, FacetKind::Occurrence];

    /// Suffix appended to the channel name
    pub fn suffix(&self) -> &'static str {
        match self {
            FacetKind::Start => "_s",
            FacetKind::End => "_e",
            FacetKind::Occurrence => "",
        }
    }

    /// Split a raw facet name into its channel part and facet kind.
    ///
    /// `reward_s` -> (`reward`, Start), `audio_0` -> (`audio_0`, Occurrence).
    pub fn split(name: &str) -> (&str, FacetKind) {
        if let Some(channel) = name.strip_suffix("_s") {
            (channel, FacetKind::Start)
        } else if let Some(channel) = name.strip_suffix("_e") {
            (channel, FacetKind::End)
        } else {
            (name, FacetKind::Occurrence)
        }
    }
}

/// A canonical facet such as `reward_s`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Facet {
    pub event: Event,
    pub kind: FacetKind,
}

impl Facet {
    pub const fn new(event: Event, kind: FacetKind) -> Self {
        Self { event, kind }
    }

    /// Every canonical facet in column order
    pub fn all() -> impl Iterator<Item = Facet> {
        Event::ALL
            .into_iter()
            .flat_map(|event| FacetKind::ALL.into_iter().map(move |kind| Facet::new(event, kind)))
    }

    pub fn is_start(&self) -> bool {
        self.kind == FacetKind::Start
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.event.as_str(), self.kind.suffix())
    }
}

/// Error returned when a string does not name a canonical facet
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown canonical facet '{0}'")]
pub struct UnknownFacet(pub String);

impl FromStr for Facet {
    type Err = UnknownFacet;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (channel, kind) = FacetKind::split(s);
        Event::from_name(channel)
            .map(|event| Facet::new(event, kind))
            .ok_or_else(|| UnknownFacet(s.to_string()))
    }
}

impl From<Facet> for String {
    fn from(facet: Facet) -> Self {
        facet.to_string()
    }
}

impl TryFrom<String> for Facet {
    type Error = UnknownFacet;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Structural correction applied to a whole session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrectionPolicy {
    #[default]
    None,
    /// Pull the reward window back so it starts at the prompt
    Shorten,
    /// Drop the spurious pre-prompt `_0` response channels
    Correct,
}

impl CorrectionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrectionPolicy::None => "none",
            CorrectionPolicy::Shorten => "shorten",
            CorrectionPolicy::Correct => "correct",
        }
    }
}

/// Identity of one session log: its experiment group and base name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    /// Experiment batch identifier, e.g. `01`
    pub group: String,
    /// Log file name without extension, e.g. `za0`
    pub name: String,
}

impl SessionKey {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }

    /// Derive the key from a log path such as `labels/subject_01/za0.txt`.
    ///
    /// The group is the second `_`-separated field of the containing directory
    /// name; a directory without one yields an empty group.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let group = path
            .parent()
            .and_then(Path::file_name)
            .and_then(|dir| dir.to_str())
            .and_then(|dir| dir.split('_').nth(1))
            .unwrap_or_default()
            .to_string();
        Self { group, name }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.name)
    }
}

/// Per-session output: canonical facet → timestamp (or occurrence indicator).
///
/// Facets keep the position of their first write, so iteration replays the
/// session in the order its facets appeared. Overwriting a facet updates its
/// value in place. Equality ignores that order.
#[derive(Debug, Clone, Default)]
pub struct CanonicalEventTable {
    entries: Vec<(Facet, f64)>,
}

impl CanonicalEventTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, facet: Facet) -> Option<&mut f64> {
        self.entries
            .iter_mut()
            .find(|(existing, _)| *existing == facet)
            .map(|(_, value)| value)
    }

    /// Write a value, overwriting any previous value for the facet
    pub fn record(&mut self, facet: Facet, value: f64) {
        match self.slot(facet) {
            Some(slot) => *slot = value,
            None => self.entries.push((facet, value)),
        }
    }

    /// Write the minimum of `value` and the previously recorded value
    pub fn record_min(&mut self, facet: Facet, value: f64) {
        let merged = self.get(facet).map_or(value, |previous| previous.min(value));
        self.record(facet, merged);
    }

    /// Write the maximum of `value` and the previously recorded value
    pub fn record_max(&mut self, facet: Facet, value: f64) {
        let merged = self.get(facet).map_or(value, |previous| previous.max(value));
        self.record(facet, merged);
    }

    pub fn get(&self, facet: Facet) -> Option<f64> {
        self.entries
            .iter()
            .find(|(existing, _)| *existing == facet)
            .map(|(_, value)| *value)
    }

    pub fn contains(&self, facet: Facet) -> bool {
        self.get(facet).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in first-write order
    pub fn iter(&self) -> impl Iterator<Item = (Facet, f64)> + '_ {
        self.entries.iter().copied()
    }
}

impl PartialEq for CanonicalEventTable {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(facet, value)| other.get(facet) == Some(value))
    }
}

impl FromIterator<(Facet, f64)> for CanonicalEventTable {
    fn from_iter<I: IntoIterator<Item = (Facet, f64)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (facet, value) in iter {
            table.record(facet, value);
        }
        table
    }
}

impl Serialize for CanonicalEventTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(facet, value)| (facet, value)))
    }
}

impl<'de> Deserialize<'de> for CanonicalEventTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = CanonicalEventTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of canonical facets to numbers")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut table = CanonicalEventTable::new();
                while let Some((facet, value)) = map.next_entry::<Facet, f64>()? {
                    table.record(facet, value);
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_facet_display_and_parse() {
        let facet: Facet = "reward_s".parse().unwrap();
        assert_eq!(facet, Event::Reward.start());
        assert_eq!(Event::Response.end().to_string(), "response_e");
        assert_eq!("abort".parse::<Facet>().unwrap(), Event::Abort.occurrence());
        let err = "audio_0_s".parse::<Facet>().unwrap_err();
        assert_eq!(err.to_string(), "unknown canonical facet 'audio_0_s'");
    }

    #[test]
    fn test_facet_order_matches_columns() {
        let names: Vec<String> = Facet::all().map(|f| f.to_string()).collect();
        assert_eq!(names.len(), 15);
        assert_eq!(names[0], "command_s");
        assert_eq!(names[5], "prompt");
        assert_eq!(names[14], "response");
    }

    #[test]
    fn test_merge_min_max_any_order() {
        let mut forward = CanonicalEventTable::new();
        forward.record_min(Event::Response.start(), 1.0);
        forward.record_min(Event::Response.start(), 2.0);
        forward.record_max(Event::Response.end(), 1.0);
        forward.record_max(Event::Response.end(), 2.0);

        let mut backward = CanonicalEventTable::new();
        backward.record_min(Event::Response.start(), 2.0);
        backward.record_min(Event::Response.start(), 1.0);
        backward.record_max(Event::Response.end(), 2.0);
        backward.record_max(Event::Response.end(), 1.0);

        assert_eq!(forward, backward);
        assert_eq!(forward.get(Event::Response.start()), Some(1.0));
        assert_eq!(forward.get(Event::Response.end()), Some(2.0));
    }

    #[test]
    fn test_session_key_from_path() {
        let key = SessionKey::from_path(&PathBuf::from("../labels/subject_01/za0.txt"));
        assert_eq!(key, SessionKey::new("01", "za0"));

        let key = SessionKey::from_path(&PathBuf::from("labels/za0.txt"));
        assert_eq!(key.group, "");
    }

    #[test]
    fn test_table_serializes_as_named_map() {
        let mut table = CanonicalEventTable::new();
        table.record(Event::Reward.start(), 5.0);
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, r#"{"reward_s":5.0}"#);

        let back: CanonicalEventTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_table_keeps_first_write_order() {
        let mut table = CanonicalEventTable::new();
        table.record(Event::Abort.occurrence(), 0.0);
        table.record(Event::Abort.start(), 1.0);
        table.record(Event::Abort.occurrence(), 0.5);

        let facets: Vec<Facet> = table.iter().map(|(facet, _)| facet).collect();
        assert_eq!(facets, vec![Event::Abort.occurrence(), Event::Abort.start()]);
        assert_eq!(table.get(Event::Abort.occurrence()), Some(0.5));
        assert_eq!(table.len(), 2);

        let reordered: CanonicalEventTable = vec![
            (Event::Abort.start(), 1.0),
            (Event::Abort.occurrence(), 0.5),
        ]
        .into_iter()
        .collect();
        assert_eq!(table, reordered);
    }

    #[test]
    fn test_table_deserializes_in_document_order() {
        let table: CanonicalEventTable =
            serde_json::from_str(r#"{"reward_e": 9.0, "reward_s": 5.0}"#).unwrap();
        let facets: Vec<Facet> = table.iter().map(|(facet, _)| facet).collect();
        assert_eq!(facets, vec![Event::Reward.end(), Event::Reward.start()]);
        assert!(serde_json::from_str::<CanonicalEventTable>(r#"{"audio_0": 1.0}"#).is_err());
    }
}
