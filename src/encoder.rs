//! Feature matrix encoding
//!
//! This module renders an assembled feature matrix for the structure learner:
//! - CSV with one column per canonical facet
//! - JSON with producer metadata
//! - CSV of discretized Y/N occurrence labels

use crate::error::ComputeError;
use crate::features::{column_names, FeatureMatrix, ABSENT};
use crate::types::{Event, SessionKey};
use crate::{PRODUCER_NAME, VERSION};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use uuid::Uuid;

/// Current matrix payload schema version
pub const MATRIX_SCHEMA_VERSION: &str = "itbn.feature_matrix.v1";

/// Producer metadata embedded in JSON payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// One session row in a JSON payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixRecord {
    pub session: SessionKey,
    pub values: Vec<f64>,
}

/// JSON rendering of a feature matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixPayload {
    pub schema_version: String,
    pub producer: MatrixProducer,
    /// RFC 3339 UTC timestamp
    pub computed_at: String,
    pub columns: Vec<String>,
    pub absent_sentinel: f64,
    pub rows: Vec<MatrixRecord>,
}

/// Encoder for feature matrix exports
pub struct MatrixEncoder {
    instance_id: String,
}

impl Default for MatrixEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MatrixEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    /// Build the JSON payload
    pub fn encode(&self, matrix: &FeatureMatrix) -> MatrixPayload {
        let rows = matrix
            .sessions()
            .iter()
            .zip(matrix.rows())
            .map(|(session, row)| MatrixRecord {
                session: session.clone(),
                values: row.to_vec(),
            })
            .collect();

        MatrixPayload {
            schema_version: MATRIX_SCHEMA_VERSION.to_string(),
            producer: MatrixProducer {
                name: PRODUCER_NAME.to_string(),
                version: VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at: Utc::now().to_rfc3339(),
            columns: column_names(),
            absent_sentinel: ABSENT,
            rows,
        }
    }

    /// Encode to pretty JSON string
    pub fn encode_to_json(&self, matrix: &FeatureMatrix) -> Result<String, ComputeError> {
        let payload = self.encode(matrix);
        serde_json::to_string_pretty(&payload).map_err(ComputeError::Json)
    }

    /// Numeric CSV, optionally led by a `session` column
    pub fn encode_csv(&self, matrix: &FeatureMatrix, with_session: bool) -> Result<String, ComputeError> {
        let mut out = String::new();
        let mut header = column_names();
        if with_session {
            header.insert(0, "session".to_string());
        }
        writeln!(out, "{}", header.join(",")).map_err(encoding)?;

        for (session, row) in matrix.sessions().iter().zip(matrix.rows()) {
            let mut cells: Vec<String> = row.iter().map(|value| value.to_string()).collect();
            if with_session {
                cells.insert(0, csv_field(&session.to_string()));
            }
            writeln!(out, "{}", cells.join(",")).map_err(encoding)?;
        }
        Ok(out)
    }

    /// Occurrence columns as Y/N labels; unlabeled cells are left empty
    pub fn encode_labels_csv(&self, matrix: &FeatureMatrix) -> Result<String, ComputeError> {
        let mut out = String::new();
        let mut header = vec!["session".to_string()];
        header.extend(Event::ALL.iter().map(|event| event.as_str().to_string()));
        writeln!(out, "{}", header.join(",")).map_err(encoding)?;

        for (session, labels) in matrix.sessions().iter().zip(matrix.occurrence_labels()) {
            let mut cells = vec![csv_field(&session.to_string())];
            cells.extend(
                labels
                    .iter()
                    .map(|label| label.map(|l| l.as_str()).unwrap_or_default().to_string()),
            );
            writeln!(out, "{}", cells.join(",")).map_err(encoding)?;
        }
        Ok(out)
    }
}

fn encoding(e: std::fmt::Error) -> ComputeError {
    ComputeError::Encoding(e.to_string())
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
