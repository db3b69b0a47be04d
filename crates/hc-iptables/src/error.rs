use thiserror::Error;

/// Configuration errors that abort compilation of a rule list.
///
/// None of these are recoverable per entry: a single bad entry fails the
/// whole step.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FirewallError {
    #[error("{list} entry {index}: source and port are both 'any', refusing to match everything")]
    MatchesEverything { list: String, index: usize },

    #[error("{list} entry {index}: empty source")]
    EmptySource { list: String, index: usize },

    #[error("{list} entry {index}: source '{name}' has no port value")]
    MissingPort {
        list: String,
        index: usize,
        name: String,
    },

    #[error("{list} entry {index}: empty port in '{spec}'")]
    EmptyPort {
        list: String,
        index: usize,
        spec: String,
    },
}
