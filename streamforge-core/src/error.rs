use thiserror::Error;

/// Fatal errors raised while compiling a logical graph into a job graph.
///
/// Compilation has no recoverable-error channel: every variant aborts the
/// whole compilation and the caller is expected to resubmit the job, not to
/// retry internally. The variants keep user misconfiguration apart from
/// compiler bugs.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The submitted graph combines features that cannot be compiled
    /// together. User-fixable.
    #[error("configuration conflict: {0}")]
    ConfigurationConflict(String),

    /// The graph or the compiler itself violated an internal invariant.
    /// Signals a bug, never a user error.
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),

    /// Writing woven constraint metadata into the job configuration failed.
    /// A job graph without its constraints is not valid.
    #[error("latency constraint persistence failed")]
    ConstraintPersistence(#[from] bincode::Error),
}
