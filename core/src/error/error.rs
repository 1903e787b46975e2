use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("wrapper failed: {0}")]
    Wrap(#[from] WrapError),
    #[error("config error: {0}")]
    Config(String),
    #[error("No command provided to run.")]
    MissingCommand,
}

#[derive(Error, Debug)]
pub enum WrapError {
    #[error("config error: {0}")]
    Config(String),
    #[error("spawn failed: {0}")]
    Spawn(String),
    #[error("stream io error: {stream} {source}")]
    StreamIo {
        stream: &'static str,
        source: std::io::Error,
    },
    #[error("signal error: {0}")]
    Signal(String),
}
