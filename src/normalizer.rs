//! Event line normalization
//!
//! This module rewrites raw log records into canonical table writes. Rules are
//! applied in priority order and the first matching rule decides the line:
//!
//! 1. raw `command` / `prompt` lines bypass every other rule
//! 2. `noise_0` / `noise_1` are read as `command` / `prompt`
//! 3. shorten policy: reward window realigned to the prompt
//! 4. correct policy: `_0` response sub-channels dropped
//! 5. response sub-channels merged (earliest start, latest end)
//! 6. open reward window: `abort_e` becomes `reward_e`
//! 7. anything else is recorded as-is

use crate::config::CanonicalLines;
use crate::context::SessionContext;
use crate::error::ComputeError;
use crate::schema::{RawChannel, RawEventRecord, SubChannel};
use crate::types::{CanonicalEventTable, CorrectionPolicy, Event, Facet, FacetKind};

/// Outcome of normalizing one line
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rewrite {
    /// Line is suppressed
    Drop,
    /// Write the value, overwriting
    Record(Facet, f64),
    /// Write the minimum of the value and any previous value
    RecordMin(Facet, f64),
    /// Write the maximum of the value and any previous value
    RecordMax(Facet, f64),
    /// Synthesized reward interval
    RewardWindow { start: f64, end: f64 },
}

impl Rewrite {
    /// Apply this rewrite to a session table
    pub fn apply(self, table: &mut CanonicalEventTable) {
        match self {
            Rewrite::Drop => {}
            Rewrite::Record(facet, t) => table.record(facet, t),
            Rewrite::RecordMin(facet, t) => table.record_min(facet, t),
            Rewrite::RecordMax(facet, t) => table.record_max(facet, t),
            Rewrite::RewardWindow { start, end } => {
                table.record(Event::Reward.start(), start);
                table.record(Event::Reward.end(), end);
            }
        }
    }
}

/// Stateful per-session line rewriter
#[derive(Debug, Clone)]
pub struct EventLineNormalizer {
    context: SessionContext,
    canonical_lines: CanonicalLines,
}

impl EventLineNormalizer {
    pub fn new(policy: CorrectionPolicy, canonical_lines: CanonicalLines) -> Self {
        Self {
            context: SessionContext::new(policy),
            canonical_lines,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Normalize one record. Must be called in log order.
    pub fn rewrite(&mut self, record: &RawEventRecord) -> Result<Rewrite, ComputeError> {
        let facet = record.target_facet();
        let t = record.timestamp;

        if let RawChannel::Canonical(Event::Command | Event::Prompt) = record.channel {
            return Ok(match self.canonical_lines {
                CanonicalLines::Record => Rewrite::Record(facet, t),
                CanonicalLines::Discard => Rewrite::Drop,
            });
        }

        match self.context.policy() {
            CorrectionPolicy::Shorten => {
                if let Some(rewrite) = self.shorten(record, facet)? {
                    return Ok(rewrite);
                }
            }
            CorrectionPolicy::Correct => {
                if record.channel.sub_channel() == Some(SubChannel::Zero) {
                    return Ok(Rewrite::Drop);
                }
            }
            CorrectionPolicy::None => {}
        }

        if record.channel.sub_channel().is_some() {
            return Ok(merge_response(record.kind, t));
        }

        Ok(self.reinterpret_reward(facet, t))
    }

    /// Shorten policy rules; `None` means the line falls through
    fn shorten(
        &mut self,
        record: &RawEventRecord,
        facet: Facet,
    ) -> Result<Option<Rewrite>, ComputeError> {
        let t = record.timestamp;

        if facet == Event::Prompt.start() {
            let duration = self.context.scratch().reward_duration().ok_or_else(|| {
                ComputeError::malformed(
                    record.line,
                    "prompt start seen before the original reward_s and abort_e",
                )
            })?;
            self.context.capture_prompt_start(t);
            tracing::trace!(start = t, duration, "realigned reward window to prompt");
            return Ok(Some(Rewrite::RewardWindow {
                start: t,
                end: t + duration,
            }));
        }

        if record.channel.sub_channel() == Some(SubChannel::One)
            || facet == Event::Reward.end()
            || facet == Event::Abort.start()
            || facet == Event::Prompt.end()
        {
            return Ok(Some(Rewrite::Drop));
        }

        if facet == Event::Reward.start() {
            self.context.capture_reward_start(t);
            return Ok(Some(Rewrite::Drop));
        }

        if facet == Event::Abort.end() {
            self.context.capture_reward_end(t);
            return Ok(Some(Rewrite::Drop));
        }

        Ok(None)
    }

    fn reinterpret_reward(&mut self, facet: Facet, t: f64) -> Rewrite {
        if facet == Event::Reward.start() {
            self.context.mark_rewarded();
            return Rewrite::Record(facet, t);
        }

        if self.context.is_rewarded() {
            if facet == Event::Reward.end() || facet == Event::Abort.start() {
                return Rewrite::Drop;
            }
            if facet == Event::Abort.end() {
                return Rewrite::Record(Event::Reward.end(), t);
            }
        }

        Rewrite::Record(facet, t)
    }
}

/// Fold a response sub-channel line into the canonical response facets
fn merge_response(kind: FacetKind, t: f64) -> Rewrite {
    match kind {
        FacetKind::Start => Rewrite::RecordMin(Event::Response.start(), t),
        // bare sub-channel lines count as ends
        FacetKind::End | FacetKind::Occurrence => Rewrite::RecordMax(Event::Response.end(), t),
    }
}
