use ulr_workflow::WorkflowError;

#[derive(Debug, thiserror::Error)]
pub enum AttentionError {
    /// A workflow rule rejected the operation.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("clinical attention not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to read attention record: {0}")]
    Record(#[from] records::RecordsError),

    #[error("failed to create attention directory: {0}")]
    AttentionDirCreation(std::io::Error),
    #[error(
        "initialise failed and cleanup also failed (path: {path}): init={init_error}; cleanup={cleanup_error}",
        path = path.display()
    )]
    CleanupAfterInitialiseFailed {
        path: std::path::PathBuf,
        #[source]
        init_error: Box<AttentionError>,
        cleanup_error: std::io::Error,
    },
    #[error("failed to write attention file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read attention file: {0}")]
    FileRead(std::io::Error),

    #[error("failed to initialise git repository: {0}")]
    GitInit(git2::Error),
    #[error("failed to open git repository: {0}")]
    GitOpen(git2::Error),
    #[error("failed to access git index: {0}")]
    GitIndex(git2::Error),
    #[error("failed to add file to git index: {0}")]
    GitAdd(git2::Error),
    #[error("failed to write git tree: {0}")]
    GitWriteTree(git2::Error),
    #[error("failed to find git tree: {0}")]
    GitFindTree(git2::Error),
    #[error("failed to create git signature: {0}")]
    GitSignature(git2::Error),
    #[error("failed to create git commit: {0}")]
    GitCommit(git2::Error),
    #[error("failed to get git head: {0}")]
    GitHead(git2::Error),
    #[error("failed to set git head: {0}")]
    GitSetHead(git2::Error),
    #[error("failed to peel git commit: {0}")]
    GitPeel(git2::Error),
    #[error("failed to walk git history: {0}")]
    GitRevwalk(git2::Error),

    #[error("invalid Care-Location")]
    InvalidCareLocation,
    #[error("missing Care-Location")]
    MissingCareLocation,
    #[error("Actor-* and Care-Location trailer keys are reserved")]
    ReservedTrailerKey,
}

impl AttentionError {
    /// The workflow rejection behind this error, if any.
    pub fn as_workflow(&self) -> Option<&WorkflowError> {
        match self {
            Self::Workflow(e) => Some(e),
            _ => None,
        }
    }
}

pub type AttentionResult<T> = std::result::Result<T, AttentionError>;
