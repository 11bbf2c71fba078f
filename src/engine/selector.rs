//! Jump selection.

use super::scoring::ScoredPair;

/// Result of scanning one coin's scores.
#[derive(Debug, Clone, Copy, Default)]
pub struct JumpDecision<'a> {
    /// Highest score of any sign, for logging.
    pub best_overall: Option<&'a ScoredPair>,
    /// Highest strictly positive score, if any.
    pub chosen: Option<&'a ScoredPair>,
}

/// Pick the candidate to jump to.
///
/// Ties keep the earliest entry, so the outcome only depends on the
/// order the scores were produced in.
pub fn select_jump(scores: &[ScoredPair]) -> JumpDecision<'_> {
    let best_overall = scores
        .iter()
        .reduce(|best, s| if s.score > best.score { s } else { best });

    let chosen = scores
        .iter()
        .filter(|s| s.score > 0.0)
        .reduce(|best, s| if s.score > best.score { s } else { best });

    JumpDecision {
        best_overall,
        chosen,
    }
}
