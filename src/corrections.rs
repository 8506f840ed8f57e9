//! Correction policy resolution
//!
//! Some recorded sessions need a structural fix before they can be learned
//! from. Sessions in the shorten table deliver the reward after a correct
//! response, so the reward window is pulled back to start at the prompt.
//! Sessions in the correct table carry a correct response before the prompt,
//! so their `_0` response channels are dropped.

use crate::error::ComputeError;
use crate::types::{CorrectionPolicy, SessionKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const SHORTEN_ALL: [&str; 6] = ["a0", "g0", "ga0", "za0", "zg0", "zga0"];
const SHORTEN_NO_GESTURE: [&str; 5] = ["a0", "ga0", "za0", "zg0", "zga0"];
const CORRECT_ALL: [&str; 6] = ["a1", "g1", "ga1", "za1", "zg1", "zga1"];

/// Static per-group session tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCorrectionTables")]
pub struct CorrectionTables {
    shorten: BTreeMap<String, Vec<String>>,
    correct: BTreeMap<String, Vec<String>>,
}

#[derive(Deserialize)]
struct RawCorrectionTables {
    #[serde(default)]
    shorten: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    correct: BTreeMap<String, Vec<String>>,
}

impl TryFrom<RawCorrectionTables> for CorrectionTables {
    type Error = ComputeError;

    fn try_from(raw: RawCorrectionTables) -> Result<Self, Self::Error> {
        CorrectionTables::new(raw.shorten, raw.correct)
    }
}

impl Default for CorrectionTables {
    fn default() -> Self {
        fn group(names: &[&str]) -> Vec<String> {
            names.iter().map(|name| name.to_string()).collect()
        }

        let shorten = BTreeMap::from([
            ("01".to_string(), group(&SHORTEN_ALL)),
            ("02".to_string(), group(&SHORTEN_ALL)),
            ("03".to_string(), group(&SHORTEN_NO_GESTURE)),
            ("04".to_string(), group(&SHORTEN_ALL)),
        ]);
        let correct = BTreeMap::from([
            ("01".to_string(), group(&CORRECT_ALL)),
            ("02".to_string(), group(&CORRECT_ALL)),
        ]);

        Self { shorten, correct }
    }
}

impl CorrectionTables {
    /// Build tables, rejecting any session listed under both policies
    pub fn new(
        shorten: BTreeMap<String, Vec<String>>,
        correct: BTreeMap<String, Vec<String>>,
    ) -> Result<Self, ComputeError> {
        for (group, names) in &shorten {
            let Some(corrected) = correct.get(group) else {
                continue;
            };
            if let Some(name) = names.iter().find(|name| corrected.contains(name)) {
                return Err(ComputeError::PolicyConflict {
                    group: group.clone(),
                    name: name.clone(),
                });
            }
        }
        Ok(Self { shorten, correct })
    }

    /// Tables with no corrections at all
    pub fn empty() -> Self {
        Self {
            shorten: BTreeMap::new(),
            correct: BTreeMap::new(),
        }
    }

    /// Resolve the policy for a session.
    ///
    /// A group missing from both tables is not an error and yields `None`.
    pub fn resolve(&self, key: &SessionKey) -> CorrectionPolicy {
        let listed = |table: &BTreeMap<String, Vec<String>>| {
            table
                .get(&key.group)
                .is_some_and(|names| names.iter().any(|name| *name == key.name))
        };

        if listed(&self.shorten) {
            CorrectionPolicy::Shorten
        } else if listed(&self.correct) {
            CorrectionPolicy::Correct
        } else {
            CorrectionPolicy::None
        }
    }

    /// Number of (group, session) entries per policy
    pub fn counts(&self) -> (usize, usize) {
        let count = |table: &BTreeMap<String, Vec<String>>| table.values().map(Vec::len).sum();
        (count(&self.shorten), count(&self.correct))
    }
}
