use thiserror::Error;

#[derive(Error, Debug)]
pub enum PassForgeError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pass Catalog Error: {0}")]
    Catalog(String),

    #[error("Worker Manifest Error: {0}")]
    Manifest(String),
}

pub type PfResult<T> = Result<T, PassForgeError>;
