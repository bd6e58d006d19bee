use ulr_workflow::WorkflowError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Rejected locally; nothing was sent.
    #[error(transparent)]
    Validation(#[from] WorkflowError),

    /// Transport failure or a failure envelope from the server, message verbatim.
    #[error("{0}")]
    NetworkOrServer(String),

    #[error("server returned no data")]
    EmptyResponse,

    #[error("failed to build HTTP client: {0}")]
    Build(reqwest::Error),
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
