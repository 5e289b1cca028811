//! Session phases

use std::fmt;

use serde::{Deserialize, Serialize};

/// Linear, strictly monotonic session phase
///
/// Declaration order is the progression order; `Ord` follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionPhase {
    Fresh,
    CodebasePacked,
    ChatInitialized,
    Planning,
    GenerationReady,
    Completed,
}

impl SessionPhase {
    /// The phase entered after this one, if any
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Fresh => Some(Self::CodebasePacked),
            Self::CodebasePacked => Some(Self::ChatInitialized),
            Self::ChatInitialized => Some(Self::Planning),
            Self::Planning => Some(Self::GenerationReady),
            Self::GenerationReady => Some(Self::Completed),
            Self::Completed => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::CodebasePacked => "codebase-packed",
            Self::ChatInitialized => "chat-initialized",
            Self::Planning => "planning",
            Self::GenerationReady => "generation-ready",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_walks_declaration_order() {
        let mut phase = SessionPhase::Fresh;
        let mut seen = vec![phase];
        while let Some(next) = phase.next() {
            assert!(next > phase);
            seen.push(next);
            phase = next;
        }
        assert_eq!(seen.len(), 6);
        assert_eq!(phase, SessionPhase::Completed);
    }

    #[test]
    fn test_serde_matches_display() {
        let json = serde_json::to_string(&SessionPhase::GenerationReady).unwrap();
        assert_eq!(json, "\"generation-ready\"");
        assert_eq!(SessionPhase::GenerationReady.to_string(), "generation-ready");
    }
}
