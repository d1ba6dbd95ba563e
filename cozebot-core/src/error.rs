use thiserror::Error;

#[derive(Error, Debug)]
pub enum CozebotError {
    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Decorator error: {0}")]
    Decorator(#[from] DecoratorError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

#[derive(Error, Debug)]
pub enum DecoratorError {
    #[error("Extraction failed: {0}")]
    Extraction(String),
}

pub type Result<T> = std::result::Result<T, CozebotError>;
