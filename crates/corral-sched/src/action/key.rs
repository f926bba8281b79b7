//! Operation-key grammar.
//!
//! Every action is identified by an *op key*. The plain form is
//! `<resource>_<task>_<interval-ms>`; notification actions use the notify
//! form `<resource>_<notify-type>_notify_<task>_0` (notify type
//! `confirmed-post` for post-completion confirmation). Resource names may
//! themselves contain underscores, so keys are decomposed from the right.

use crate::error::ResolverError;

/// A decomposed plain-form operation key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpKey {
    /// The resource name segment (may contain underscores).
    pub resource: String,
    /// The task name segment, unparsed.
    pub task: String,
    /// The interval in milliseconds.
    pub interval_ms: u32,
}

/// Builds a plain-form operation key.
#[must_use]
pub fn op_key(resource: &str, task: &str, interval_ms: u32) -> String {
    format!("{resource}_{task}_{interval_ms}")
}

/// Builds a notify-form operation key.
///
/// The `_notify_` infix is what [`crate::resolver`] keys off when deciding
/// that an action must not be expanded, so every notify-form key contains it.
#[must_use]
pub fn notify_key(resource: &str, notify_type: &str, task: &str) -> String {
    format!("{resource}_{notify_type}_notify_{task}_0")
}

/// Decomposes a plain-form operation key into `(resource, task, interval)`.
///
/// # Errors
///
/// Returns [`ResolverError::MalformedOpKey`] when the key has fewer than
/// three segments, an empty resource or task segment, or a non-numeric
/// interval.
pub fn parse_op_key(key: &str) -> Result<OpKey, ResolverError> {
    let malformed = || ResolverError::MalformedOpKey {
        key: key.to_string(),
    };

    let (rest, interval) = key.rsplit_once('_').ok_or_else(|| malformed())?;
    let interval_ms: u32 = interval.parse().map_err(|_| malformed())?;
    let (resource, task) = rest.rsplit_once('_').ok_or_else(|| malformed())?;
    if resource.is_empty() || task.is_empty() {
        return Err(malformed());
    }

    Ok(OpKey {
        resource: resource.to_string(),
        task: task.to_string(),
        interval_ms,
    })
}
