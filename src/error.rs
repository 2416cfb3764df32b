use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClipError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("clipboard error: {0}")]
    Clipboard(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("hotkey error: {0}")]
    Hotkey(String),

    #[error("input injection error: {0}")]
    Input(String),
}

impl From<arboard::Error> for ClipError {
    fn from(value: arboard::Error) -> Self {
        ClipError::Clipboard(value.to_string())
    }
}

impl From<global_hotkey::Error> for ClipError {
    fn from(value: global_hotkey::Error) -> Self {
        ClipError::Hotkey(value.to_string())
    }
}

impl From<winit::error::EventLoopError> for ClipError {
    fn from(value: winit::error::EventLoopError) -> Self {
        ClipError::Hotkey(value.to_string())
    }
}

pub type ClipResult<T> = Result<T, ClipError>;
