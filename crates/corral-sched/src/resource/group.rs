//! Group-resource callbacks.

use crate::action::{ActionFlag, ActionFlags, ActionId};
use crate::node::NodeId;
use crate::ordering::{ChangeSet, OrderingKind};
use crate::scheduler::Scheduler;

use super::{cascade_update, VariantOps};

/// [`VariantOps`] for [`ResourceVariant::Group`](super::ResourceVariant::Group).
pub struct GroupOps;

impl VariantOps for GroupOps {
    /// Aggregates over the members: any required member makes the collective
    /// action required, any unrunnable member makes it unrunnable.
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
            .with(ActionFlag::Runnable);
        let mut found_any = false;

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
            if !child_flags.contains(ActionFlag::Runnable) {
                flags = flags.without(ActionFlag::Runnable);
            }
        }

        if found_any {
            flags
        } else {
            sched.action(action).flags()
        }
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
