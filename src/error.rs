use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed encoding at offset {offset}: {reason}")]
    MalformedEncoding { offset: usize, reason: String },

    #[error("unexpected token {token:?} at offset {offset}")]
    UnexpectedToken { offset: usize, token: char },

    #[error("byte string at offset {offset} declares {declared} bytes but only {available} remain")]
    TruncatedInput {
        offset: usize,
        declared: usize,
        available: usize,
    },

    #[error("dict key at offset {0} is not a byte string")]
    InvalidKeyType(usize),

    #[error("unsupported value: {0}")]
    UnsupportedValue(String),

    #[error("missing or invalid field: {0}")]
    MissingField(&'static str),

    #[error("pieces length {0} is not a multiple of 20")]
    MalformedPieceList(usize),

    #[error("tracker unreachable: {0}")]
    TrackerUnreachable(String),

    #[error("tracker rejected request: {0}")]
    TrackerRejected(String),

    #[error("peers length {0} is not a multiple of 6")]
    MalformedPeerList(usize),

    #[error("handshake incomplete: {0}")]
    HandshakeIncomplete(String),
}
