use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReadoutError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Pulse shape is singular: risetime and falltime must differ")]
    SingularPulseShape,

    #[error("Quantum efficiency table error: {0}")]
    QeTable(String),

    #[error("Pixel gain table error: {0}")]
    GainTable(String),

    #[error("Failed to parse {path}:{line}: {message}")]
    Parse {
        path: String,
        line: usize,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output sink error: {0}")]
    Sink(String),
}

pub type Result<T> = std::result::Result<T, ReadoutError>;
