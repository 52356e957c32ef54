//! Transfer Lifecycle State Definitions
//!
//! State names match the `state` column of the `transfer` table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Transfer lifecycle states
///
/// ```text
/// PROCESSING ──┬──> COMPLETED
///              └──> FAILED
/// ```
///
/// Terminal states: COMPLETED, FAILED. A terminal state is set exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferState {
    /// Intent recorded, accounts not yet (or currently) locked
    Processing,

    /// Terminal: balances committed together with the record
    Completed,

    /// Terminal: rejected or aborted, no balance changed
    Failed,
}

impl TransferState {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Completed | TransferState::Failed)
    }

    /// Only PROCESSING may move, and only to a terminal state
    #[inline]
    pub fn can_transition_to(&self, next: TransferState) -> bool {
        *self == TransferState::Processing && next.is_terminal()
    }

    /// Get the storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::Processing => "PROCESSING",
            TransferState::Completed => "COMPLETED",
            TransferState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransferState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROCESSING" => Ok(TransferState::Processing),
            "COMPLETED" => Ok(TransferState::Completed),
            "FAILED" => Ok(TransferState::Failed),
            other => Err(format!("Invalid transfer state: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(TransferState::Completed.is_terminal());
        assert!(TransferState::Failed.is_terminal());
        assert!(!TransferState::Processing.is_terminal());
    }

    #[test]
    fn test_transitions() {
        assert!(TransferState::Processing.can_transition_to(TransferState::Completed));
        assert!(TransferState::Processing.can_transition_to(TransferState::Failed));
        assert!(!TransferState::Processing.can_transition_to(TransferState::Processing));

        // Terminal states never move again
        assert!(!TransferState::Completed.can_transition_to(TransferState::Failed));
        assert!(!TransferState::Failed.can_transition_to(TransferState::Completed));
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            "COMPLETED".parse::<TransferState>().unwrap(),
            TransferState::Completed
        );
        assert!("ROLLED_BACK".parse::<TransferState>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(TransferState::Processing.to_string(), "PROCESSING");
        assert_eq!(TransferState::Failed.to_string(), "FAILED");
    }
}
