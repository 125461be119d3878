use thiserror::Error;

/// Errors raised while decoding a VDS record
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The input is not a structurally valid VDS record.
    #[error("Malformed VDS record: {0}")]
    MalformedRecord(#[source] serde_json::Error),
}

/// Convenient Result type alias
pub type DecodeResult<T> = Result<T, DecodeError>;
