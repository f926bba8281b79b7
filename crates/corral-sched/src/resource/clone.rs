//! Clone-resource callbacks.

use crate::action::{ActionFlag, ActionFlags, ActionId};
use crate::node::NodeId;
use crate::ordering::{ChangeSet, OrderingKind};
use crate::scheduler::Scheduler;

use super::{cascade_update, VariantOps};

/// [`VariantOps`] for [`ResourceVariant::Clone`](super::ResourceVariant::Clone).
pub struct CloneOps;

impl VariantOps for CloneOps {
    /// Aggregates over the instances: the collective action is runnable if
    /// *any* instance action is (on the given node when one is supplied),
    /// and optional only while every instance action is.
    ///
    /// The any-instance runnable view is what lets
    /// `flags_for_ordering` treat "runnable anywhere" as the predicate that
    /// matters for clone orderings.
    fn action_flags(
        &self,
        sched: &Scheduler,
        action: ActionId,
        node: Option<NodeId>,
    ) -> ActionFlags {
        let Some(rsc) = sched.action(action).resource() else {
            return sched.action(action).flags();
        };
        let task = sched.action(action).task();

        let mut flags = sched
            .action(action)
            .flags()
            .with(ActionFlag::Optional)
            .without(ActionFlag::Runnable);
        let mut found_any = false;
        let mut any_runnable = false;

        for &child in sched.resource(rsc).children() {
            let Some(child_action) =
                sched.find_first_action(sched.resource(child).actions(), None, Some(task), node)
            else {
                continue;
            };
            found_any = true;

            let child_variant = sched.resource(child).variant();
            let child_flags = child_variant.ops().action_flags(sched, child_action, node);
            if !child_flags.contains(ActionFlag::Optional) {
                flags = flags.without(ActionFlag::Optional);
            }
            if child_flags.contains(ActionFlag::Runnable) {
                any_runnable = true;
            }
        }

        if !found_any {
            return sched.action(action).flags();
        }
        if any_runnable {
            flags = flags.with(ActionFlag::Runnable);
        }
        flags
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
