use thiserror::Error;

/// Everything a handler can fail with. The dispatcher logs these; user-facing
/// fallout is handled locally where it matters.
#[derive(Debug, Error)]
pub enum Error {
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("telegram request failed: {0}")]
    Request(#[from] teloxide::RequestError),
}

pub type HandlerResult = Result<(), Error>;
