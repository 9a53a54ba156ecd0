use thiserror::Error;

#[derive(Debug, Error)]
pub enum SynthflowError {
    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Flow definition errors
    #[error("Flow definition error: {0}")]
    Definition(String),

    #[error("Flow definition not found: {0}")]
    DefinitionNotFound(String),

    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("Edge {edge} references unknown node: {node}")]
    UnknownNode { edge: String, node: String },

    #[error("Flow definition has no nodes")]
    EmptyFlow,

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SynthflowError>;
