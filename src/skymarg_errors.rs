use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum SkyMargError {
    #[error("Detector network must contain at least one detector")]
    EmptyDetectorNetwork,

    #[error("Detector appears more than once in the network: {0}")]
    DuplicateDetector(char),

    #[error("Unknown detector identifier: {0}")]
    UnknownDetector(String),

    #[error("Invalid sky dictionary configuration: {0}")]
    InvalidConfig(String),

    #[error("Delay matrix has {got} rows, expected {expected} (n_det - 1)")]
    DelayShapeMismatch { expected: usize, got: usize },

    #[error("`times` is incommensurate with `f_sampling`: expected spacing {expected} s, got {got} s")]
    IncommensurateSampling { expected: f64, got: f64 },

    #[error("Invalid timeseries: {0}")]
    InvalidTimeseries(String),

    #[error("Invalid window parameter: {0}")]
    InvalidWindow(String),
}

impl PartialEq for SkyMargError {
    fn eq(&self, other: &Self) -> bool {
        use SkyMargError::*;
        match (self, other) {
            (DuplicateDetector(a), DuplicateDetector(b)) => a == b,
            (UnknownDetector(a), UnknownDetector(b)) => a == b,
            (InvalidConfig(a), InvalidConfig(b)) => a == b,
            (
                DelayShapeMismatch {
                    expected: e1,
                    got: g1,
                },
                DelayShapeMismatch {
                    expected: e2,
                    got: g2,
                },
            ) => e1 == e2 && g1 == g2,
            (InvalidTimeseries(a), InvalidTimeseries(b)) => a == b,
            (InvalidWindow(a), InvalidWindow(b)) => a == b,

            // float payloads: same variant is enough
            (IncommensurateSampling { .. }, IncommensurateSampling { .. }) => true,

            (EmptyDetectorNetwork, EmptyDetectorNetwork) => true,

            _ => false,
        }
    }
}
