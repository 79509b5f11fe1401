use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown model kind: {0}")]
    UnknownModelKind(String),

    #[error("Random connectivity requires a connection probability")]
    MissingProbability,

    #[error("Invalid integration parameters: dt {dt_ms} ms, duration {duration_ms} ms")]
    InvalidIntegrationParameters { dt_ms: f64, duration_ms: f64 },

    #[error("A network needs at least one neuron")]
    EmptyNetwork,

    #[error("Unknown stimulus kind: {0}")]
    UnknownStimulusKind(String),

    #[error("Unknown synapse kind: {0}")]
    UnknownSynapseKind(String),

    #[error("Unknown connectivity policy: {0}")]
    UnknownConnectivity(String),

    #[error("Unknown sweep parameter: {0}")]
    UnknownSweepParameter(String),

    #[error("Invalid stimulus: {0}")]
    InvalidStimulus(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
