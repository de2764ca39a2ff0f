//! Trigger predicates for hook subscriptions.

use std::fmt;
use std::str::FromStr;

use tarry_cache::HookState;
use tarry_common::ContentHash;

use crate::error::TarryError;

/// When a subscription fires its hook.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TriggerCondition {
    /// Fire when the result differs from the one that last triggered.
    #[default]
    DifferentFromLast,
    /// Fire when the result has never triggered before.
    DifferentFromAll,
}

impl TriggerCondition {
    /// Returns the identifier of the predicate.
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerCondition::DifferentFromLast => "different_from_last",
            TriggerCondition::DifferentFromAll => "different_from_all",
        }
    }

    /// Evaluates the predicate for a result delivered to `arg`.
    ///
    /// An argument without any history always fires.
    pub fn is_triggered(&self, state: &HookState, arg: &str, hash: &ContentHash) -> bool {
        let Some(arg_state) = state.arg_states.get(arg) else {
            return true;
        };
        match self {
            TriggerCondition::DifferentFromLast => {
                arg_state.last_result_hash.as_ref() != Some(hash)
            }
            TriggerCondition::DifferentFromAll => !arg_state.all_result_hashes.contains(hash),
        }
    }
}

impl fmt::Display for TriggerCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerCondition {
    type Err = TarryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "different_from_last" => Ok(TriggerCondition::DifferentFromLast),
            "different_from_all" => Ok(TriggerCondition::DifferentFromAll),
            other => Err(TarryError::UnknownCondition {
                name: other.to_string(),
            }),
        }
    }
}
