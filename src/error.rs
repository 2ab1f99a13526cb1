use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    System(#[from] SystemError),
}

/// Errors surfaced by the external learning-agent boundary.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent exited with non-zero status: {0}")]
    Execution(i32),

    #[error("agent failed to start: {0}")]
    Spawn(String),

    #[error("agent did not produce a proposal: {0}")]
    MissingProposal(String),
}

/// Proposal/validator errors (real-mode gate, `spec.md` §4.7).
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("unrecognized chain/network: {0}")]
    UnknownNetwork(String),

    #[error("malformed pool address: {0}")]
    MalformedPoolAddress(String),

    #[error("{field} out of bounds: {value} not in [{min}, {max}]")]
    OutOfBounds {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("numeric field '{0}' is NaN or null")]
    NotANumber(String),

    #[error("missing required field: {0}")]
    MissingField(String),
}

/// Harness/executor errors (`spec.md` §4.6, §7).
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("executor exceeded its deadline after {0:?}")]
    Timeout(std::time::Duration),

    #[error("quote simulation reverted: {0}")]
    Revert(String),

    #[error("safety block: {0}")]
    SafetyBlock(String),

    #[error("live executor unavailable and degrade-to-mock is disabled")]
    NoExecutorAvailable,

    #[error("gateway health check failed")]
    UnhealthyGateway,
}

/// Artifact/filesystem errors. Fatal to the current episode, never silently dropped.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("io operation failed")]
    Io(#[from] std::io::Error),

    #[error("serialization failed")]
    Json(#[from] serde_json::Error),

    #[error("failed to create writer: {0}")]
    WriterCreation(String),

    #[error("failed to rename temp file into place: {0}")]
    AtomicRename(String),

    #[error("failed to acquire append-log lock: {0}")]
    LogLock(String),

    #[error("file system error: {0}")]
    FileSystem(String),
}

/// Background scheduler errors. Local to a worker/tick, never fatal to the process.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("analytics backend call failed: {0}")]
    BackendFailure(String),

    #[error("trigger log entry malformed, skipped: {0}")]
    MalformedTrigger(String),

    #[error("worker job timed out after {0:?}")]
    JobTimeout(std::time::Duration),
}

/// A typed payload failed to validate against its declared shape.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("artifact '{artifact}' failed schema validation: {reason}")]
    Invalid { artifact: String, reason: String },
}

/// Internal invariants and process-level faults.
#[derive(Debug, Error)]
pub enum SystemError {
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("registry entry not found for query: {0}")]
    UnknownQuery(String),

    #[error("clock error: {0}")]
    Clock(String),
}
