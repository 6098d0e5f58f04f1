use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("graph must contain at least one node")]
    EmptyGraph,
    #[error("duplicate node id '{0}'")]
    DuplicateNodeId(String),
    #[error("node id must not be empty")]
    EmptyNodeId,
    #[error("scenario duration must be > 0 (got {0}s)")]
    InvalidDuration(u64),
    #[error("scenario '{0}' has non-positive load multiplier {1}")]
    InvalidLoadMultiplier(String, f64),
    #[error("simulation host is not running")]
    HostStopped,
    #[error("simulation host dropped its reply channel")]
    HostReplyDropped,
    #[error("{0}")]
    ConfigIo(String),
    #[error("{0}")]
    ConfigParse(String),
    #[error("unsupported config format '{0}'")]
    UnsupportedConfigFormat(String),
    #[error("{0}")]
    Cli(String),
}

pub type Result<T> = std::result::Result<T, Error>;
