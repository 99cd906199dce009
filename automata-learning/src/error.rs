use automata_core::WordError;

/// Errors a learner or its driving loop can surface.
#[derive(Debug, thiserror::Error)]
pub enum LearnerError {
    /// A word referenced a symbol outside the learner's alphabet.
    #[error(transparent)]
    UnknownSymbol(#[from] WordError),

    /// Two oracle answers contradicted each other (e.g. the membership
    /// oracle disagreed with itself across two calls for the same word, or
    /// an equivalence oracle returned a counterexample the hypothesis
    /// already classifies correctly).
    #[error("oracle produced inconsistent answers: {0}")]
    OracleInconsistency(String),

    /// A passive sample set contained two different labels for the same
    /// word.
    #[error("conflicting label for sample word")]
    ConflictingSample,

    /// An operation was attempted on a learner that is not in the required
    /// state (e.g. `refine` before `start`).
    #[error("illegal learner state: {0}")]
    IllegalState(&'static str),

    /// The operation was cancelled via a [`crate::cancel::CancellationToken`].
    #[error("operation was cancelled")]
    Cancelled,
}
