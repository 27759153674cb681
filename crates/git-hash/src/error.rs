#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("'{character}' at position {position} is not a hex digit")]
    InvalidHex { position: usize, character: char },

    #[error("object id hex must be {expected} characters, got {actual}")]
    InvalidHexLength { expected: usize, actual: usize },

    #[error("object id must be 20 bytes, got {0}")]
    InvalidLength(usize),

    #[error("fan-out entry {index} is smaller than the one before it")]
    NonMonotonicFanout { index: usize },

    #[error("fan-out table needs 1024 bytes, got {0}")]
    TruncatedFanout(usize),

    #[error("input is a SHA-1 collision attack")]
    Sha1Collision,
}
