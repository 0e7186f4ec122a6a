use thiserror::Error;

/// The result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while encoding or decoding wire frames.
#[derive(Debug, Error)]
pub enum Error {
    /// Frame could not be serialized to CBOR.
    #[error(transparent)]
    Encode(#[from] ciborium::ser::Error<std::io::Error>),

    /// Frame could not be deserialized from CBOR.
    #[error(transparent)]
    Decode(#[from] ciborium::de::Error<std::io::Error>),
}
