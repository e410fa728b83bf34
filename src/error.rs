//! Error types for rill.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RillError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Construction-time mismatches between collaborators
    #[error("Vocabulary size mismatch: engine outputs {engine} symbols, table has {table}")]
    VocabSizeMismatch { engine: usize, table: usize },

    // Inference failures (fatal to the current session)
    #[error("Encoder forward pass failed: {message}")]
    Engine { message: String },

    #[error("Rescoring pass failed: {message}")]
    Rescore { message: String },

    // Symbol table errors
    #[error("Failed to parse symbol table: {message}")]
    SymbolTable { message: String },

    #[error("Unknown symbol id {id} (vocabulary size {size})")]
    UnknownSymbol { id: u32, size: usize },

    // API misuse (programming errors, surfaced immediately)
    #[error("Decoder misuse: {message}")]
    Misuse { message: String },

    // Audio input errors
    #[error("Failed to read audio: {message}")]
    AudioRead { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RillError {
    /// Shorthand for a misuse error with the given message.
    pub fn misuse(message: impl Into<String>) -> Self {
        RillError::Misuse {
            message: message.into(),
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, RillError>;
