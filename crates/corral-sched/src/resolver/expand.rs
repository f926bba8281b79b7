//! Virtual-action expansion.
//!
//! Ordering constraints are written against a collective resource's `start`
//! or `stop`, but what a dependent action must actually wait for is the
//! post-completion event (`running`, `stopped`, ...). Expansion maps the
//! former to the latter by rewriting the op key and looking the result up in
//! the resource's action list. Failure to expand is a configuration problem,
//! not a fatal one: the original action is used and an error is logged.

use tracing::{error, trace};

use crate::action::key::{notify_key, op_key, parse_op_key};
use crate::action::{ActionId, Task};
use crate::resource::{Resource, ResourceFlag, ResourceVariant};
use crate::scheduler::Scheduler;

/// The notify type of post-completion confirmation events.
const CONFIRMED_POST: &str = "confirmed-post";

/// Maps a collective action to its post-completion peer.
///
/// Returns the same action for primitives, notification actions, recurring
/// operations, primitive events (`monitor`, `shutdown`, `fence`, `reload`),
/// and whenever the expansion target is missing from the resource's action
/// list. Repeated expansion is idempotent: an already-expanded action maps
/// to itself.
#[must_use]
pub fn expand_action(sched: &Scheduler, action: ActionId) -> ActionId {
    let Some(rsc_id) = sched.action(action).resource() else {
        return action;
    };
    let rsc = sched.resource(rsc_id);
    if !rsc.variant().is_collective() {
        return action;
    }

    // Only outermost resources have notification actions; the exception is
    // clones directly inside bundles.
    let allow_notify = match rsc.parent() {
        None => rsc.flags().contains(ResourceFlag::Notify),
        Some(parent) => {
            rsc.variant() == ResourceVariant::Clone
                && sched.resource(parent).variant() == ResourceVariant::Bundle
                && rsc.flags().contains(ResourceFlag::Notify)
        }
    };

    let uuid = sched.action(action).uuid();
    let Some(expanded) = convert_collective_key(rsc, uuid, allow_notify) else {
        return action;
    };

    match sched.find_first_action(rsc.actions(), Some(&expanded), None, None) {
        Some(found) => {
            trace!(from = %uuid, to = %expanded, "expanded collective action");
            found
        }
        None => {
            error!(
                from = %uuid,
                to = %expanded,
                resource = %rsc.name(),
                "expansion target not found; using the original action"
            );
            action
        }
    }
}

/// Rewrites a collective op key to its post-completion form.
///
/// `None` means "no conversion": the caller keeps the original key.
fn convert_collective_key(rsc: &Resource, uuid: &str, allow_notify: bool) -> Option<String> {
    if uuid.contains("notify") {
        return None;
    }

    let parsed = match parse_op_key(uuid) {
        Ok(parsed) => parsed,
        Err(err) => {
            error!(key = %uuid, %err, "unparseable op key; not expanding");
            return None;
        }
    };
    if parsed.interval_ms > 0 {
        return None;
    }

    let task = match Task::parse(&parsed.task) {
        Ok(task) => task,
        Err(err) => {
            error!(key = %uuid, %err, "unknown task in op key; not expanding");
            return None;
        }
    };
    let completed = task.completed()?;

    let expanded = if allow_notify {
        notify_key(&parsed.resource, CONFIRMED_POST, completed.as_str())
    } else {
        op_key(&parsed.resource, completed.as_str(), 0)
    };
    trace!(from = %uuid, to = %expanded, resource = %rsc.name(), "converted collective op key");
    Some(expanded)
}
