use thiserror::Error;

#[derive(Error, Debug)]
pub enum MysqlTestError {
    #[error("Failed to launch container: {0}")]
    Launch(String),

    #[error("Failed to inspect container: {0}")]
    Inspect(String),

    #[error("timeout: failed to connect mysqld after {0}s")]
    Timeout(u64),

    #[error("Failed to open client connection: {0}")]
    ProbeOpen(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MysqlTestError>;
