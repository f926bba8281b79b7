//! Resolver error types.

use thiserror::Error;

/// Errors that can abort an ordering-resolution pass.
///
/// Configuration problems (unknown task names in op keys, missing expansion
/// targets) are deliberately *not* represented here: the resolver logs them
/// and proceeds with the unexpanded action, so one malformed action cannot
/// deny the whole cluster a decision.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResolverError {
    /// The entry action id does not belong to this scheduler context.
    #[error("unknown action id {id} (context has {len} actions)")]
    UnknownAction {
        /// The offending raw id.
        id: usize,
        /// Number of actions in the context.
        len: usize,
    },

    /// An operation key did not match `<resource>_<task>_<interval-ms>`.
    #[error("malformed operation key: {key}")]
    MalformedOpKey {
        /// The key that failed to parse.
        key: String,
    },

    /// A task name is not part of the closed task vocabulary.
    #[error("unknown task name: {value}")]
    UnknownTask {
        /// The unrecognized task text.
        value: String,
    },

    /// The fixed point was not reached within the sanity bound.
    ///
    /// Flag propagation is monotone, so a legitimate pass always converges
    /// well inside the bound; hitting it indicates a bug in the caller-built
    /// graph (or in the resolver itself) and aborts the pass.
    #[error("ordering fixed point not reached after {visits} action passes (budget {budget})")]
    ConvergenceBudgetExceeded {
        /// Number of per-action passes executed.
        visits: usize,
        /// The computed pass budget.
        budget: usize,
    },
}
