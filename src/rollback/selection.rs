// ABOUTME: Parses the answer to the interactive rollback prompt.

use super::RollbackError;

const CANCEL_TOKENS: &[&str] = &["q", "quit", "cancel"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    /// 1-based index into the listed releases.
    Pick(usize),
    Cancel,
}

/// Accept `1..=listed`, or a cancel token (`q`, `quit`, `cancel`, empty input).
pub fn parse_selection(input: &str, listed: usize) -> Result<Choice, RollbackError> {
    let input = input.trim();
    if input.is_empty() || CANCEL_TOKENS.iter().any(|t| input.eq_ignore_ascii_case(t)) {
        return Ok(Choice::Cancel);
    }
    match input.parse::<usize>() {
        Ok(n) if (1..=listed).contains(&n) => Ok(Choice::Pick(n)),
        _ => Err(RollbackError::InvalidSelection(input.to_string())),
    }
}
