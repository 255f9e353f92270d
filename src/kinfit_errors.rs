use thiserror::Error;

use crate::fit_config::annealing::ParseStageError;

#[derive(Error, Debug)]
pub enum KinFitError {
    #[error("Invalid fit parameter: {0}")]
    InvalidFitParameter(String),

    #[error("Malformed annealing schedule record at line {line}: {source}")]
    ParseStage {
        line: usize,
        source: ParseStageError,
    },

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),
}

impl PartialEq for KinFitError {
    fn eq(&self, other: &Self) -> bool {
        use KinFitError::*;
        match (self, other) {
            (InvalidFitParameter(a), InvalidFitParameter(b)) => a == b,
            (
                ParseStage {
                    line: la,
                    source: sa,
                },
                ParseStage {
                    line: lb,
                    source: sb,
                },
            ) => la == lb && sa == sb,

            // I/O errors are not comparable: equal if same variant
            (IoError(_), IoError(_)) => true,

            _ => false,
        }
    }
}
