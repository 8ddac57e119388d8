/// Core error type for the auto-reply service.
///
/// Adapter crates map their specific errors into this type so the pipeline
/// can tell a failed completion from a failed reply or a broken session.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("completion error: {0}")]
    Completion(String),

    #[error("messaging error: {0}")]
    Messaging(String),

    #[error("connector error: {0}")]
    Connector(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
