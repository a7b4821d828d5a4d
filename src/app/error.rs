use thiserror::Error;

#[derive(Error, Debug)]
pub enum HysError {
    #[error("network error: {0}")]
    Network(String),

    #[error("http status {0}")]
    Http(u16),

    #[error("invalid utf-8 in response body")]
    InvalidUtf8,

    #[error("response exceeds the configured size cap")]
    FileTooLarge,

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("feed parse error: {0}")]
    Parse(String),

    #[error("invalid group name: {0}")]
    InvalidGroupName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, HysError>;
