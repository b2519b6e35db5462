use thiserror::Error;

#[derive(Error, Debug)]
pub enum DropshipError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("watch error: {0}")]
    Watch(String),

    #[error("archive failed: {0}")]
    Archive(String),
}

pub type Result<T> = std::result::Result<T, DropshipError>;
