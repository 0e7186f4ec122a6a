use thiserror::Error as ThisError;

/// Errors that can occur while running the server.
#[derive(Debug, ThisError)]
pub enum Error {
    /// The server has already been started.
    #[error("The server has already been started")]
    AlreadyStarted,

    /// Failed to bind to the listen address.
    #[error("Failed to bind to address: {0}")]
    Bind(#[from] std::io::Error),
}
