use thiserror::Error;

/// Failures the tracker itself can report.
///
/// Producer failures are not in here: a rejected load is just a settled load.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("invalid tracker config: {field} {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: &'static str,
    },

    #[error("failed to parse tracker config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("tracker driver stopped")]
    Closed,

    #[error("tracked load was dropped before it finished")]
    Abandoned,
}
