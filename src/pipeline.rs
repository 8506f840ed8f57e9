//! Pipeline orchestration
//!
//! This module provides the public API of the crate. It orchestrates the full
//! pipeline from session label logs to the feature matrix.

use crate::config::{CanonicalLines, Config};
use crate::error::ComputeError;
use crate::features::FeatureMatrix;
use crate::normalizer::EventLineNormalizer;
use crate::schema::{LogAdapter, RawEventRecord};
use crate::split::SplitRegistry;
use crate::types::{CanonicalEventTable, CorrectionPolicy, Event, SessionKey};
use std::path::{Path, PathBuf};

/// Folds one session's records into its canonical event table.
///
/// Records must be pushed in log order; nothing is shared between sessions.
#[derive(Debug, Clone)]
pub struct SessionTableBuilder {
    normalizer: EventLineNormalizer,
    table: CanonicalEventTable,
}

impl SessionTableBuilder {
    pub fn new(policy: CorrectionPolicy, canonical_lines: CanonicalLines) -> Self {
        Self {
            normalizer: EventLineNormalizer::new(policy, canonical_lines),
            table: CanonicalEventTable::new(),
        }
    }

    /// Normalize one record into the table
    pub fn push(&mut self, record: &RawEventRecord) -> Result<(), ComputeError> {
        let rewrite = self.normalizer.rewrite(record)?;
        rewrite.apply(&mut self.table);
        Ok(())
    }

    /// Finish the session.
    ///
    /// Fails if a reward window was opened and its end never recorded.
    pub fn finish(self) -> Result<CanonicalEventTable, ComputeError> {
        if self.normalizer.context().is_rewarded() && !self.table.contains(Event::Reward.end()) {
            return Err(ComputeError::UnclosedRewardWindow);
        }
        Ok(self.table)
    }
}

/// Normalize a whole session log into its canonical event table.
///
/// # Arguments
/// * `log` - Session log text, one `<facet> <timestamp>` per line
/// * `policy` - Correction policy of the session
/// * `canonical_lines` - Handling of raw command/prompt lines
///
/// # Example
/// ```ignore
/// let table = normalize_session("reward_s 5.0\nabort_e 9.5\n", CorrectionPolicy::None, CanonicalLines::Record)?;
/// ```
pub fn normalize_session(
    log: &str,
    policy: CorrectionPolicy,
    canonical_lines: CanonicalLines,
) -> Result<CanonicalEventTable, ComputeError> {
    let records = LogAdapter::parse_log(log)?;
    let mut builder = SessionTableBuilder::new(policy, canonical_lines);
    for record in &records {
        builder.push(record)?;
    }
    builder.finish()
}

/// A session left out of the matrix, with the reason
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSession {
    pub session: SessionKey,
    pub path: Option<PathBuf>,
    pub reason: String,
}

/// Summary of one processing run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessReport {
    /// Logs found but not listed in the training split
    pub excluded: usize,
    /// Sessions that produced a row
    pub processed: usize,
    /// Rows per policy: none, shorten, correct
    pub policies: [usize; 3],
    pub skipped: Vec<SkippedSession>,
}

impl ProcessReport {
    fn count_policy(&mut self, policy: CorrectionPolicy) {
        let slot = match policy {
            CorrectionPolicy::None => 0,
            CorrectionPolicy::Shorten => 1,
            CorrectionPolicy::Correct => 2,
        };
        self.policies[slot] += 1;
    }
}

/// Result of a processing run
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub matrix: FeatureMatrix,
    pub report: ProcessReport,
}

/// Processor holding the static configuration for a run.
pub struct FeatureProcessor {
    config: Config,
}

impl Default for FeatureProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureProcessor {
    /// Create a processor with the reference configuration
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Create a processor with a specific configuration
    pub fn with_config(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Policy of a session under the configured tables
    pub fn policy_for(&self, session: &SessionKey) -> CorrectionPolicy {
        self.config.corrections.resolve(session)
    }

    /// Normalize one session log, resolving its policy from the session key
    pub fn process_log(
        &self,
        session: &SessionKey,
        log: &str,
    ) -> Result<CanonicalEventTable, ComputeError> {
        normalize_session(log, self.policy_for(session), self.config.canonical_lines)
    }

    /// Process in-memory session logs.
    ///
    /// Sessions failing with a session-local error are skipped and reported;
    /// they never produce a row. Any other error aborts the run.
    pub fn process_sessions<I>(&self, sessions: I) -> Result<ProcessOutput, ComputeError>
    where
        I: IntoIterator<Item = (SessionKey, String)>,
    {
        let mut matrix = FeatureMatrix::new();
        let mut report = ProcessReport::default();

        for (session, log) in sessions {
            self.fold_session(&mut matrix, &mut report, session, None, &log)?;
        }

        Ok(ProcessOutput { matrix, report })
    }

    /// Process every training-split log found under `labels_root`.
    ///
    /// Log references are `labels_root` joined with the relative log path, so
    /// the root must be spelled the way the manifest rewrites produce it.
    pub fn process_dir(
        &self,
        labels_root: &Path,
        registry: &SplitRegistry,
    ) -> Result<ProcessOutput, ComputeError> {
        let logs = self.list_logs(labels_root)?;
        tracing::info!(
            root = %labels_root.display(),
            logs = logs.len(),
            training = registry.training_count(),
            "processing label directory"
        );

        let mut matrix = FeatureMatrix::with_capacity(registry.training_count());
        let mut report = ProcessReport::default();

        for path in logs {
            let reference = path.to_string_lossy();
            if !registry.is_training(&reference) {
                report.excluded += 1;
                continue;
            }

            let session = SessionKey::from_path(&path);
            match std::fs::read_to_string(&path) {
                Ok(log) => {
                    self.fold_session(&mut matrix, &mut report, session, Some(path), &log)?
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "cannot read session log");
                    report.skipped.push(SkippedSession {
                        session,
                        path: Some(path),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            processed = report.processed,
            skipped = report.skipped.len(),
            excluded = report.excluded,
            "label directory processed"
        );
        Ok(ProcessOutput { matrix, report })
    }

    fn fold_session(
        &self,
        matrix: &mut FeatureMatrix,
        report: &mut ProcessReport,
        session: SessionKey,
        path: Option<PathBuf>,
        log: &str,
    ) -> Result<(), ComputeError> {
        let policy = self.policy_for(&session);
        match normalize_session(log, policy, self.config.canonical_lines) {
            Ok(table) => {
                tracing::debug!(%session, policy = policy.as_str(), facets = table.len(), "session normalized");
                matrix.push(session, &table);
                report.processed += 1;
                report.count_policy(policy);
                Ok(())
            }
            Err(e) if e.is_session_local() => {
                tracing::warn!(%session, policy = policy.as_str(), error = %e, "skipping session");
                report.skipped.push(SkippedSession {
                    session,
                    path,
                    reason: e.to_string(),
                });
                Ok(())
            }
            Err(e) => {
                tracing::error!(%session, error = %e, "aborting run");
                Err(e)
            }
        }
    }

    /// Recursively list session logs under a root, sorted by path
    pub fn list_logs(&self, root: &Path) -> Result<Vec<PathBuf>, ComputeError> {
        let mut logs = Vec::new();
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            for entry in std::fs::read_dir(&dir)? {
                let entry = entry?;
                let path = entry.path();
                // symlinked directories are not followed
                if entry.file_type()?.is_dir() {
                    pending.push(path);
                } else if self.config.log_extension.matches(&path) {
                    logs.push(path);
                }
            }
        }

        logs.sort();
        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{ABSENT, PRESENT};
    use crate::types::Facet;

    fn shorten_session_log() -> &'static str {
        "noise_0_s 1.0\nnoise_0_e 2.0\nreward_s 15.0\nreward_e 16.0\nabort_s 16.5\nabort_e 17.0\nnoise_1_s 10.0\nnoise_1_e 11.0\naudio_0_s 3.0\naudio_1_s 2.5\n"
    }

    #[test]
    fn test_normalize_session_reward_fixture() {
        let table = normalize_session(
            "reward_s 5.0\nabort_s 6.0\nabort_e 9.5\n",
            CorrectionPolicy::None,
            CanonicalLines::Record,
        )
        .unwrap();
        let entries: Vec<(Facet, f64)> = table.iter().collect();
        assert_eq!(
            entries,
            vec![(Event::Reward.start(), 5.0), (Event::Reward.end(), 9.5)]
        );
    }

    #[test]
    fn test_unclosed_reward_window() {
        let result = normalize_session(
            "reward_s 5.0\nreward_e 6.0\n",
            CorrectionPolicy::None,
            CanonicalLines::Record,
        );
        assert!(matches!(result, Err(ComputeError::UnclosedRewardWindow)));
    }

    #[test]
    fn test_reward_end_before_start_is_closed() {
        let table = normalize_session(
            "reward_e 6.0\nreward_s 5.0\n",
            CorrectionPolicy::None,
            CanonicalLines::Record,
        )
        .unwrap();
        assert_eq!(table.get(Event::Reward.end()), Some(6.0));
    }

    #[test]
    fn test_process_log_resolves_policy() {
        let processor = FeatureProcessor::new();
        let shortened = processor
            .process_log(&SessionKey::new("01", "za0"), shorten_session_log())
            .unwrap();
        assert_eq!(shortened.get(Event::Reward.start()), Some(10.0));
        assert_eq!(shortened.get(Event::Reward.end()), Some(12.0));
        // audio_1 dropped under shorten
        assert_eq!(shortened.get(Event::Response.start()), Some(3.0));

        let plain = processor
            .process_log(&SessionKey::new("09", "za0"), shorten_session_log())
            .unwrap();
        assert_eq!(plain.get(Event::Response.start()), Some(2.5));
        assert_eq!(plain.get(Event::Prompt.start()), Some(10.0));
    }

    #[test]
    fn test_process_sessions_isolates_failures() {
        let processor = FeatureProcessor::new();
        let output = processor.process_sessions(vec![
            (SessionKey::new("01", "a0"), shorten_session_log().to_string()),
            (SessionKey::new("05", "bad"), "reward_s five\n".to_string()),
            (SessionKey::new("05", "empty"), String::new()),
        ])
        .unwrap();

        assert_eq!(output.report.processed, 2);
        assert_eq!(output.report.policies, [1, 1, 0]);
        assert_eq!(output.report.skipped.len(), 1);
        assert_eq!(output.report.skipped[0].session.name, "bad");

        assert_eq!(output.matrix.len(), 2);
        let empty_row = output
            .matrix
            .row_of(&SessionKey::new("05", "empty"))
            .unwrap();
        assert!(empty_row.iter().all(|v| *v == ABSENT));

        let row = output.matrix.row_of(&SessionKey::new("01", "a0")).unwrap();
        assert_eq!(row[crate::features::column_of(Event::Reward.occurrence())], PRESENT);
    }

    #[test]
    fn test_session_local_errors_are_skippable() {
        let malformed = normalize_session("reward_s five\n", CorrectionPolicy::None, CanonicalLines::Record)
            .unwrap_err();
        assert!(malformed.is_session_local());

        let unclosed = normalize_session("reward_s 5.0\n", CorrectionPolicy::None, CanonicalLines::Record)
            .unwrap_err();
        assert!(matches!(unclosed, ComputeError::UnclosedRewardWindow));
        assert!(unclosed.is_session_local());

        assert!(!ComputeError::Config("bad table".to_string()).is_session_local());
        assert!(!ComputeError::Manifest("missing".to_string()).is_session_local());
    }
}
