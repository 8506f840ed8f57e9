//! Adapter for reading session label logs into raw event records

use crate::error::ComputeError;
use crate::schema::raw_event::*;

/// Adapter for converting log text into [`RawEventRecord`]s
pub struct LogAdapter;

impl LogAdapter {
    /// Parse a whole session log, failing on the first malformed line.
    ///
    /// Blank lines are skipped; line numbers stay 1-based positions in the text.
    pub fn parse_log(text: &str) -> Result<Vec<RawEventRecord>, ComputeError> {
        let mut records = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record = RawEventRecord::parse(idx + 1, line)
                .map_err(|e| ComputeError::malformed(idx + 1, e.to_string()))?;
            records.push(record);
        }
        Ok(records)
    }

    /// Validate every line of a log, collecting all failures
    pub fn validate_log(text: &str) -> LogValidation {
        let mut validation = LogValidation::default();
        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            validation.total_lines += 1;
            if let Err(error) = RawEventRecord::parse(idx + 1, line) {
                validation.errors.push(LineValidation {
                    line: idx + 1,
                    text: line.to_string(),
                    error,
                });
            }
        }
        validation
    }
}

/// Result of validating one log
#[derive(Debug, Default)]
pub struct LogValidation {
    /// Non-blank lines inspected
    pub total_lines: usize,
    pub errors: Vec<LineValidation>,
}

impl LogValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn valid_lines(&self) -> usize {
        self.total_lines - self.errors.len()
    }
}

/// A rejected log line
#[derive(Debug)]
pub struct LineValidation {
    pub line: usize,
    pub text: String,
    pub error: ValidationError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FacetKind;

    #[test]
    fn test_parse_log_skips_blank_lines() {
        let log = "noise_0_s 1.0\n\nnoise_0_e 2.0\n";
        let records = LogAdapter::parse_log(log).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].line, 3);
        assert_eq!(records[1].kind, FacetKind::End);
    }

    #[test]
    fn test_parse_log_reports_line_number() {
        let log = "reward_s 1.0\nreward_e oops\n";
        match LogAdapter::parse_log(log) {
            Err(ComputeError::MalformedLine { line, reason }) => {
                assert_eq!(line, 2);
                assert!(reason.contains("oops"));
            }
            other => panic!("expected malformed line, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_log_collects_all_errors() {
        let log = "reward_s 1.0\nbogus 2.0\nreward_e\nabort_e 3.0\n";
        let validation = LogAdapter::validate_log(log);
        assert_eq!(validation.total_lines, 4);
        assert_eq!(validation.valid_lines(), 2);
        assert!(!validation.is_valid());
        assert_eq!(validation.errors[0].line, 2);
        assert_eq!(validation.errors[1].line, 3);
    }
}
