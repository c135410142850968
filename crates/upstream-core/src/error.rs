//! Error types for upstream

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not connect to server: {0}")]
    Connect(String),

    #[error("File error: {0}")]
    File(String),

    #[error("Malformed descriptor: {0}")]
    DescriptorFormat(String),

    #[error("Descriptor error: {0}")]
    Descriptor(String),

    #[error("{message}")]
    Response { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Invalid size: {0}")]
    InvalidSize(String),

    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),
}

impl Error {
    /// HTTP status carried by a response error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Response { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
