use thiserror::Error;

/// Why a source scan was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("unmatched closing brace at line {line}")]
    UnmatchedClose { line: usize },

    #[error("`{name}` opened at line {line} is never closed")]
    Unterminated { name: String, line: usize },
}
