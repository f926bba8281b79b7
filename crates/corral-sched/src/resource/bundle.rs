//! Bundle-resource callbacks.
//!
//! A bundle behaves like a clone of its contained resources for ordering
//! purposes: runnable anywhere counts, and changes cascade into the
//! replicas.

use crate::action::{ActionFlags, ActionId};
use crate::node::NodeId;
use crate::ordering::{ChangeSet, OrderingKind};
use crate::scheduler::Scheduler;

use super::{cascade_update, CloneOps, VariantOps};

/// [`VariantOps`] for [`ResourceVariant::Bundle`](super::ResourceVariant::Bundle).
pub struct BundleOps;

impl VariantOps for BundleOps {
    fn action_flags(
        &self,
        sched: &Scheduler,
        action: ActionId,
        node: Option<NodeId>,
    ) -> ActionFlags {
        CloneOps.action_flags(sched, action, node)
    }

    fn update_ordered_actions(
        &self,
        sched: &mut Scheduler,
        first: ActionId,
        then: ActionId,
        node: Option<NodeId>,
        first_flags: ActionFlags,
        filter: ActionFlags,
        kind: OrderingKind,
    ) -> ChangeSet {
        cascade_update(sched, first, then, node, first_flags, filter, kind)
    }
}
