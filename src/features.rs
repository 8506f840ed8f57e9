//! Feature matrix assembly
//!
//! Lays canonical session tables out as a fixed-width numeric matrix:
//! - one row per session, one column per canonical facet (5 events × 3 facets)
//! - absent facets hold the [`ABSENT`] sentinel
//! - a recorded start facet also marks its event's occurrence column [`PRESENT`]

use crate::types::{CanonicalEventTable, Event, Facet, FacetKind, SessionKey};
use serde::{Deserialize, Serialize};

/// Number of feature columns
pub const COLUMN_COUNT: usize = Event::ALL.len() * FacetKind::ALL.len();

/// Cell value for a facet never observed in the session.
///
/// Timestamps are non-negative elapsed seconds, so a negative value cannot
/// collide with a real observation.
pub const ABSENT: f64 = -1.0;

/// Occurrence column value for an event that started in the session
pub const PRESENT: f64 = 1.0;

/// One matrix row
pub type FeatureRow = [f64; COLUMN_COUNT];

/// Column index of a canonical facet
pub fn column_of(facet: Facet) -> usize {
    let kind = match facet.kind {
        FacetKind::Start => 0,
        FacetKind::End => 1,
        FacetKind::Occurrence => 2,
    };
    facet.event.ordinal() * FacetKind::ALL.len() + kind
}

/// Canonical facet stored in a column
pub fn facet_of(column: usize) -> Option<Facet> {
    if column >= COLUMN_COUNT {
        return None;
    }
    let event = Event::ALL[column / FacetKind::ALL.len()];
    let kind = FacetKind::ALL[column % FacetKind::ALL.len()];
    Some(Facet::new(event, kind))
}

/// Column names in order
pub fn column_names() -> Vec<String> {
    Facet::all().map(|facet| facet.to_string()).collect()
}

/// Whether a cell holds the absent sentinel
pub fn is_absent(value: f64) -> bool {
    value == ABSENT
}

/// Encode one session table into a row.
///
/// Cells are written in the table's first-write order, so an occurrence value
/// recorded before its start facet is overwritten by the derived flag, and
/// one recorded after it is kept.
pub fn encode_row(table: &CanonicalEventTable) -> FeatureRow {
    let mut row = [ABSENT; COLUMN_COUNT];
    for (facet, value) in table.iter() {
        row[column_of(facet)] = value;
        if facet.is_start() {
            row[column_of(facet.event.occurrence())] = PRESENT;
        }
    }
    row
}

/// Decode a row back into a table of its non-absent cells.
///
/// Occurrence flags derived from start facets are cells like any other, so
/// they come back as occurrence entries alongside the recorded ones.
pub fn decode_row(row: &FeatureRow) -> CanonicalEventTable {
    row.iter()
        .enumerate()
        .filter(|(_, value)| !is_absent(**value))
        .filter_map(|(column, value)| facet_of(column).map(|facet| (facet, *value)))
        .collect()
}

/// Occurrence label handed to the learner for an event column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OccurrenceLabel {
    #[serde(rename = "Y")]
    Present,
    #[serde(rename = "N")]
    Absent,
}

impl OccurrenceLabel {
    /// Discretize an occurrence cell; any other value is unlabeled
    pub fn from_cell(value: f64) -> Option<Self> {
        if value == PRESENT {
            Some(OccurrenceLabel::Present)
        } else if is_absent(value) {
            Some(OccurrenceLabel::Absent)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OccurrenceLabel::Present => "Y",
            OccurrenceLabel::Absent => "N",
        }
    }
}

/// Sessions laid out as rows of fixed facet columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMatrix {
    sessions: Vec<SessionKey>,
    rows: Vec<FeatureRow>,
}

impl FeatureMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Matrix sized for a known number of sessions
    pub fn with_capacity(sessions: usize) -> Self {
        Self {
            sessions: Vec::with_capacity(sessions),
            rows: Vec::with_capacity(sessions),
        }
    }

    /// Assemble a matrix from finished session tables
    pub fn assemble<'a, I>(tables: I) -> Self
    where
        I: IntoIterator<Item = (&'a SessionKey, &'a CanonicalEventTable)>,
    {
        let mut matrix = Self::new();
        for (session, table) in tables {
            matrix.push(session.clone(), table);
        }
        matrix
    }

    /// Append one session row
    pub fn push(&mut self, session: SessionKey, table: &CanonicalEventTable) {
        self.sessions.push(session);
        self.rows.push(encode_row(table));
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn sessions(&self) -> &[SessionKey] {
        &self.sessions
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn get(&self, row: usize, facet: Facet) -> Option<f64> {
        self.rows.get(row).map(|cells| cells[column_of(facet)])
    }

    /// Row of a session, if present
    pub fn row_of(&self, session: &SessionKey) -> Option<&FeatureRow> {
        self.sessions
            .iter()
            .position(|key| key == session)
            .map(|idx| &self.rows[idx])
    }

    /// Decode a row back into its session table
    pub fn decode(&self, row: usize) -> Option<CanonicalEventTable> {
        self.rows.get(row).map(decode_row)
    }

    /// Occurrence columns discretized into Y/N labels, one vector per row
    pub fn occurrence_labels(&self) -> Vec<Vec<Option<OccurrenceLabel>>> {
        self.rows
            .iter()
            .map(|row| {
                Event::ALL
                    .iter()
                    .map(|event| OccurrenceLabel::from_cell(row[column_of(event.occurrence())]))
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_table() -> CanonicalEventTable {
        let mut table = CanonicalEventTable::new();
        table.record(Event::Command.start(), 0.0);
        table.record(Event::Command.end(), 1.5);
        table.record(Event::Reward.start(), 5.0);
        table.record(Event::Reward.end(), 9.5);
        table.record(Event::Response.start(), 2.0);
        table
    }

    #[test]
    fn test_column_layout() {
        assert_eq!(COLUMN_COUNT, 15);
        assert_eq!(column_of(Event::Command.start()), 0);
        assert_eq!(column_of(Event::Prompt.occurrence()), 5);
        assert_eq!(column_of(Event::Response.end()), 13);
        for column in 0..COLUMN_COUNT {
            assert_eq!(column_of(facet_of(column).unwrap()), column);
        }
        assert_eq!(facet_of(COLUMN_COUNT), None);
        assert_eq!(column_names()[9], "abort_s");
    }

    #[test]
    fn test_encode_sets_sentinel_and_flags() {
        let row = encode_row(&sample_table());
        assert_eq!(row[column_of(Event::Command.start())], 0.0);
        assert_eq!(row[column_of(Event::Command.occurrence())], PRESENT);
        assert_eq!(row[column_of(Event::Reward.occurrence())], PRESENT);
        assert_eq!(row[column_of(Event::Response.occurrence())], PRESENT);
        assert_eq!(row[column_of(Event::Prompt.start())], ABSENT);
        assert_eq!(row[column_of(Event::Prompt.occurrence())], ABSENT);
        assert_eq!(row[column_of(Event::Abort.end())], ABSENT);
        // response_e never observed
        assert_eq!(row[column_of(Event::Response.end())], ABSENT);
    }

    #[test]
    fn test_end_without_start_sets_no_flag() {
        let mut table = CanonicalEventTable::new();
        table.record(Event::Abort.end(), 4.0);
        let row = encode_row(&table);
        assert_eq!(row[column_of(Event::Abort.occurrence())], ABSENT);
    }

    #[test]
    fn test_start_after_bare_occurrence_keeps_flag() {
        let mut table = CanonicalEventTable::new();
        table.record(Event::Abort.occurrence(), 0.0);
        table.record(Event::Abort.start(), 1.0);
        let row = encode_row(&table);
        assert_eq!(row[column_of(Event::Abort.start())], 1.0);
        assert_eq!(row[column_of(Event::Abort.occurrence())], PRESENT);

        let mut table = CanonicalEventTable::new();
        table.record(Event::Abort.start(), 1.0);
        table.record(Event::Abort.occurrence(), 0.0);
        let row = encode_row(&table);
        assert_eq!(row[column_of(Event::Abort.occurrence())], 0.0);
    }

    #[test]
    fn test_round_trip_recovers_table() {
        let table = sample_table();
        let decoded = decode_row(&encode_row(&table));

        // decoding adds the derived occurrence flags and nothing else
        for (facet, value) in table.iter() {
            assert_eq!(decoded.get(facet), Some(value));
        }
        let extra: Vec<Facet> = decoded
            .iter()
            .map(|(facet, _)| facet)
            .filter(|facet| !table.contains(*facet))
            .collect();
        assert_eq!(
            extra,
            vec![
                Event::Command.occurrence(),
                Event::Reward.occurrence(),
                Event::Response.occurrence()
            ]
        );
    }

    #[test]
    fn test_matrix_rows_and_labels() {
        let a = SessionKey::new("01", "a0");
        let b = SessionKey::new("01", "g0");
        let empty = CanonicalEventTable::new();
        let tables = vec![(a.clone(), sample_table()), (b.clone(), empty)];

        let matrix = FeatureMatrix::assemble(tables.iter().map(|(k, t)| (k, t)));
        assert_eq!(matrix.len(), 2);
        assert!(matrix.row_of(&b).unwrap().iter().all(|v| is_absent(*v)));
        assert_eq!(matrix.get(0, Event::Reward.end()), Some(9.5));
        assert_eq!(matrix.decode(1), Some(CanonicalEventTable::new()));

        let labels = matrix.occurrence_labels();
        assert_eq!(
            labels[0],
            vec![
                Some(OccurrenceLabel::Present),
                Some(OccurrenceLabel::Absent),
                Some(OccurrenceLabel::Present),
                Some(OccurrenceLabel::Absent),
                Some(OccurrenceLabel::Present),
            ]
        );
        assert!(labels[1]
            .iter()
            .all(|label| *label == Some(OccurrenceLabel::Absent)));
    }
}
