//! Per-session normalization context
//!
//! Carries the state the line rewrite rules need across lines of one session:
//! scratch timestamps for the shorten policy's reward window, and the
//! "currently rewarded" flag. A fresh context is created for every session.

use crate::types::CorrectionPolicy;

/// Intermediate timestamps used only to recompute a shortened reward window
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScratchTimes {
    /// First original `reward_s`
    pub reward_start: Option<f64>,
    /// `abort_e`, the true end of the original reward
    pub reward_end: Option<f64>,
    /// Aliased `prompt_s`, the new reward start
    pub prompt_start: Option<f64>,
}

impl ScratchTimes {
    /// Duration of the original reward window, once both ends are known
    pub fn reward_duration(&self) -> Option<f64> {
        match (self.reward_start, self.reward_end) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

/// Mutable working set for one session
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    policy: CorrectionPolicy,
    scratch: ScratchTimes,
    rewarded: bool,
}

impl SessionContext {
    /// Create a context; the policy is fixed for the session's lifetime
    pub fn new(policy: CorrectionPolicy) -> Self {
        Self {
            policy,
            scratch: ScratchTimes::default(),
            rewarded: false,
        }
    }

    pub fn policy(&self) -> CorrectionPolicy {
        self.policy
    }

    pub fn scratch(&self) -> &ScratchTimes {
        &self.scratch
    }

    /// Whether a reward window is open
    pub fn is_rewarded(&self) -> bool {
        self.rewarded
    }

    /// Open the reward window. Never closes again within the session.
    pub(crate) fn mark_rewarded(&mut self) {
        self.rewarded = true;
    }

    /// Capture the original reward start; later starts are ignored
    pub(crate) fn capture_reward_start(&mut self, t: f64) {
        if self.scratch.reward_start.is_none() {
            self.scratch.reward_start = Some(t);
        }
    }

    pub(crate) fn capture_reward_end(&mut self, t: f64) {
        self.scratch.reward_end = Some(t);
    }

    pub(crate) fn capture_prompt_start(&mut self, t: f64) {
        self.scratch.prompt_start = Some(t);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_is_clean() {
        let context = SessionContext::new(CorrectionPolicy::Shorten);
        assert_eq!(context.policy(), CorrectionPolicy::Shorten);
        assert!(!context.is_rewarded());
        assert_eq!(*context.scratch(), ScratchTimes::default());
    }

    #[test]
    fn test_first_reward_start_wins() {
        let mut context = SessionContext::new(CorrectionPolicy::Shorten);
        context.capture_reward_start(15.0);
        context.capture_reward_start(16.0);
        assert_eq!(context.scratch().reward_start, Some(15.0));
    }

    #[test]
    fn test_reward_duration_needs_both_ends() {
        let mut context = SessionContext::new(CorrectionPolicy::Shorten);
        context.capture_reward_end(17.0);
        assert_eq!(context.scratch().reward_duration(), None);
        context.capture_reward_start(15.0);
        assert_eq!(context.scratch().reward_duration(), Some(2.0));
    }
}
