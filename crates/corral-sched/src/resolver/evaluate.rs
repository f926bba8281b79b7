//! Per-edge propagation.
//!
//! [`evaluate_edge`] applies each ordering kind carried by one predecessor
//! edge, in vocabulary order, against the effective flags of its endpoints.
//! Resource-ful `then` actions delegate the detailed decision to the
//! variant dispatcher; resource-less actions use the fallback rules inline.

use tracing::trace;

use crate::action::{ActionFlag, ActionFlags, ActionId, Task};
use crate::node::NodeId;
use crate::ordering::{Change, ChangeSet, OrderingKind, OrderingSet};
use crate::resource::{ResourceFlag, ResourceVariant};
use crate::scheduler::Scheduler;

/// The action flags relevant to ordering constraints.
///
/// For a clone action evaluated against a peer on a specific node, the
/// node-specific "runnable" does not matter — what matters is whether the
/// action is runnable *anywhere* — so a globally-runnable clone action keeps
/// `runnable` even when it cannot run on the peer's node. This asymmetric
/// rule applies only to `runnable` and only to ordering; other subsystems
/// must not use it.
#[must_use]
pub fn flags_for_ordering(
    sched: &Scheduler,
    action: ActionId,
    node: Option<NodeId>,
) -> ActionFlags {
    let Some(rsc) = sched.action(action).resource() else {
        return sched.action(action).flags();
    };
    let variant = sched.resource(rsc).variant();

    let flags = variant.ops().action_flags(sched, action, None);
    if node.is_none() || variant != ResourceVariant::Clone {
        return flags;
    }

    let runnable_anywhere = flags.contains(ActionFlag::Runnable);
    let mut flags = variant.ops().action_flags(sched, action, node);
    if runnable_anywhere && !flags.contains(ActionFlag::Runnable) {
        flags.insert(ActionFlag::Runnable);
    }
    flags
}

/// Applies every kind carried by `then.predecessors[edge_index]`.
///
/// `first_flags` and `then_flags` are the effective flags computed by the
/// driver; `first` must be the (possibly expanded) concrete action the edge
/// now refers to.
pub(crate) fn evaluate_edge(
    sched: &mut Scheduler,
    first: ActionId,
    then: ActionId,
    edge_index: usize,
    first_flags: ActionFlags,
    then_flags: ActionFlags,
) -> ChangeSet {
    let mut changed = ChangeSet::NONE;
    let mut kinds = sched.action(then).predecessors()[edge_index].kinds;
    let mut node = sched.action(then).node();

    if kinds.contains(OrderingKind::ImpliesThenOnNode) {
        /* The whole 'then' collective normally restarts with 'first', so the
         * peer node is then's. To limit the effect to instances on the node
         * 'first' runs on (unfencing), swap in first's node and treat the
         * edge as a plain implies-then from here on.
         */
        kinds = kinds
            .without(OrderingKind::ImpliesThenOnNode)
            .with(OrderingKind::ImpliesThen);
        node = sched.action(first).node();
        trace!(
            first = %sched.action(first).uuid(),
            then = %sched.action(then).uuid(),
            "mapped implies-then-on-node to implies-then on first's node"
        );
    }

    let optional_only = ActionFlags::from(ActionFlag::Optional);

    if kinds.contains(OrderingKind::ImpliesThen) {
        if sched.action(then).resource().is_some() {
            changed |= delegate_to_then(
                sched,
                first,
                then,
                node,
                first_flags.retain(optional_only),
                optional_only,
                OrderingKind::ImpliesThen,
            );
        } else if !first_flags.contains(ActionFlag::Optional)
            && sched.clear_flag(then, ActionFlag::Optional)
        {
            changed |= Change::UpdatedThen;
        }
    }

    if kinds.contains(OrderingKind::Restart) && sched.action(then).resource().is_some() {
        changed |= delegate_to_then(
            sched,
            first,
            then,
            node,
            first_flags,
            ActionFlag::Optional | ActionFlag::Runnable,
            OrderingKind::Restart,
        );
    }

    if kinds.contains(OrderingKind::ImpliesFirst) {
        if let Some(first_rsc) = sched.action(first).resource() {
            let variant = sched.resource(first_rsc).variant();
            changed |= variant.ops().update_ordered_actions(
                sched,
                first,
                then,
                node,
                first_flags,
                optional_only,
                OrderingKind::ImpliesFirst,
            );
        } else if !first_flags.contains(ActionFlag::Optional)
            && sched.flags(first).contains(ActionFlag::Runnable)
            && sched.clear_flag(first, ActionFlag::Runnable)
        {
            changed |= Change::UpdatedFirst;
        }
    }

    if kinds.contains(OrderingKind::PromotedImpliesFirst)
        && sched.action(then).resource().is_some()
    {
        changed |= delegate_to_then(
            sched,
            first,
            then,
            node,
            first_flags.retain(optional_only),
            optional_only,
            OrderingKind::PromotedImpliesFirst,
        );
    }

    if kinds.contains(OrderingKind::OneOrMore) {
        if sched.action(then).resource().is_some() {
            changed |= delegate_to_then(
                sched,
                first,
                then,
                node,
                first_flags,
                ActionFlags::from(ActionFlag::Runnable),
                OrderingKind::OneOrMore,
            );
        } else if first_flags.contains(ActionFlag::Runnable) {
            // One more runnable instance of 'first'.
            let (seen, required) = sched.bump_runnable_before(then);
            if seen >= required && sched.set_flag(then, ActionFlag::Runnable) {
                changed |= Change::UpdatedThen;
            }
        }
    }

    if sched.action(then).resource().is_some() && kinds.contains(OrderingKind::Probe) {
        let first_rsc = sched.action(first).resource();
        let stopping = !first_flags.contains(ActionFlag::Runnable)
            && first_rsc.is_some_and(|rsc| !sched.resource(rsc).running_on().is_empty());

        if stopping {
            /* The cluster is tearing 'first' down; the probe must not block
             * 'then'. Drop the edge for good.
             */
            trace!(
                first = %sched.action(first).uuid(),
                then = %sched.action(then).uuid(),
                "ignoring probe ordering because first is stopping"
            );
            kinds = OrderingSet::NONE;
            sched.action_mut(then).predecessors[edge_index].kinds = OrderingSet::NONE;
        } else {
            changed |= delegate_to_then(
                sched,
                first,
                then,
                node,
                first_flags,
                ActionFlags::from(ActionFlag::Runnable),
                OrderingKind::RunnableLeft,
            );
        }
    }

    if kinds.contains(OrderingKind::RunnableLeft) {
        if sched.action(then).resource().is_some() {
            changed |= delegate_to_then(
                sched,
                first,
                then,
                node,
                first_flags,
                ActionFlags::from(ActionFlag::Runnable),
                OrderingKind::RunnableLeft,
            );
        } else if !first_flags.contains(ActionFlag::Runnable)
            && sched.clear_flag(then, ActionFlag::Runnable)
        {
            changed |= Change::UpdatedThen;
        }
    }

    if kinds.contains(OrderingKind::ImpliesFirstMigratable)
        && sched.action(then).resource().is_some()
    {
        changed |= delegate_to_then(
            sched,
            first,
            then,
            node,
            first_flags,
            optional_only,
            OrderingKind::ImpliesFirstMigratable,
        );
    }

    if kinds.contains(OrderingKind::PseudoLeft) && sched.action(then).resource().is_some() {
        changed |= delegate_to_then(
            sched,
            first,
            then,
            node,
            first_flags,
            optional_only,
            OrderingKind::PseudoLeft,
        );
    }

    if kinds.contains(OrderingKind::Optional) && sched.action(then).resource().is_some() {
        changed |= delegate_to_then(
            sched,
            first,
            then,
            node,
            first_flags,
            ActionFlags::from(ActionFlag::Runnable),
            OrderingKind::Optional,
        );
    }

    if kinds.contains(OrderingKind::Asymmetrical) && sched.action(then).resource().is_some() {
        changed |= delegate_to_then(
            sched,
            first,
            then,
            node,
            first_flags,
            ActionFlags::from(ActionFlag::Runnable),
            OrderingKind::Asymmetrical,
        );
    }

    // Print-always marking never reopens the fixed point.
    if kinds.contains(OrderingKind::ImpliesThenPrinted)
        && sched.flags(first).contains(ActionFlag::Runnable)
        && !first_flags.contains(ActionFlag::Optional)
    {
        sched.set_flag(then, ActionFlag::PrintAlways);
    }
    if kinds.contains(OrderingKind::ImpliesFirstPrinted)
        && !then_flags.contains(ActionFlag::Optional)
    {
        sched.set_flag(first, ActionFlag::PrintAlways);
    }

    changed |= blocked_stop_propagation(sched, first, then, kinds);

    trace!(
        first = %sched.action(first).uuid(),
        then = %sched.action(then).uuid(),
        kinds = %kinds,
        changed = ?changed,
        "edge evaluated"
    );
    changed
}

/// Delegates a kind to the variant callbacks of `then`'s resource.
fn delegate_to_then(
    sched: &mut Scheduler,
    first: ActionId,
    then: ActionId,
    node: Option<NodeId>,
    first_flags: ActionFlags,
    filter: ActionFlags,
    kind: OrderingKind,
) -> ChangeSet {
    let Some(rsc) = sched.action(then).resource() else {
        return ChangeSet::NONE;
    };
    let variant = sched.resource(rsc).variant();
    variant
        .ops()
        .update_ordered_actions(sched, first, then, node, first_flags, filter, kind)
}

/// The cluster cannot stop a blocked, unmanaged resource, so nothing that
/// depends on that stop can run.
fn blocked_stop_propagation(
    sched: &mut Scheduler,
    first: ActionId,
    then: ActionId,
    kinds: OrderingSet,
) -> ChangeSet {
    let mut changed = ChangeSet::NONE;
    let stop_dependent =
        OrderingKind::ImpliesThen | OrderingKind::ImpliesFirst | OrderingKind::Restart;
    if !kinds.intersects(stop_dependent) {
        return changed;
    }

    let Some(rsc) = sched.action(first).resource() else {
        return changed;
    };
    let rsc_flags = sched.resource(rsc).flags();
    if sched.action(first).task() == Task::Stop
        && !rsc_flags.contains(ResourceFlag::Managed)
        && rsc_flags.contains(ResourceFlag::Blocked)
        && !sched.flags(first).contains(ActionFlag::Runnable)
        && sched.clear_flag(then, ActionFlag::Runnable)
    {
        trace!(
            first = %sched.action(first).uuid(),
            then = %sched.action(then).uuid(),
            "first is a blocked, unmanaged, unrunnable stop"
        );
        changed |= Change::UpdatedThen;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionSpec;
    use crate::resource::{ResourceSpec, ResourceVariant};

    // ========================================================================
    // Effective-Flag Tests
    // ========================================================================

    #[test]
    fn test_resourceless_action_flags_verbatim() {
        let mut sched = Scheduler::new();
        let a = sched.add_action(ActionSpec::new("alpha_fence_0", Task::Fence));
        assert_eq!(flags_for_ordering(&sched, a, None), sched.flags(a));
    }

    #[test]
    fn test_clone_keeps_runnable_anywhere() {
        let mut sched = Scheduler::new();
        let n1 = sched.add_node("alpha");
        let n2 = sched.add_node("beta");
        let clone = sched.add_resource(ResourceSpec::new("web-clone", ResourceVariant::Clone));
        let i0 =
            sched.add_resource(ResourceSpec::new("web:0", ResourceVariant::Primitive).parent(clone));
        let i1 =
            sched.add_resource(ResourceSpec::new("web:1", ResourceVariant::Primitive).parent(clone));
        let clone_start =
            sched.add_action(ActionSpec::new("web-clone_start_0", Task::Start).resource(clone));
        let i0_start =
            sched.add_action(ActionSpec::new("web:0_start_0", Task::Start).resource(i0).node(n1));
        let _i1_start =
            sched.add_action(ActionSpec::new("web:1_start_0", Task::Start).resource(i1).node(n2));

        // Not runnable on n1, but runnable on n2: the ordering view keeps
        // runnable when asked about n1.
        sched.clear_flag(i0_start, ActionFlag::Runnable);
        let flags = flags_for_ordering(&sched, clone_start, Some(n1));
        assert!(flags.contains(ActionFlag::Runnable));
    }

    #[test]
    fn test_group_gets_no_runnable_restore() {
        let mut sched = Scheduler::new();
        let n1 = sched.add_node("alpha");
        let group = sched.add_resource(ResourceSpec::new("grp", ResourceVariant::Group));
        let m1 =
            sched.add_resource(ResourceSpec::new("m1", ResourceVariant::Primitive).parent(group));
        let grp_start =
            sched.add_action(ActionSpec::new("grp_start_0", Task::Start).resource(group));
        let m1_start =
            sched.add_action(ActionSpec::new("m1_start_0", Task::Start).resource(m1).node(n1));

        sched.clear_flag(m1_start, ActionFlag::Runnable);
        let flags = flags_for_ordering(&sched, grp_start, Some(n1));
        assert!(!flags.contains(ActionFlag::Runnable));
    }

    // ========================================================================
    // Fallback-Rule Tests (resource-less endpoints)
    // ========================================================================

    fn ordered_pair(
        sched: &mut Scheduler,
        kinds: impl Into<OrderingSet>,
    ) -> (ActionId, ActionId) {
        let first = sched.add_action(ActionSpec::new("first_start_0", Task::Start));
        let then = sched.add_action(ActionSpec::new("then_start_0", Task::Start));
        assert!(sched.order_actions(first, then, kinds));
        (first, then)
    }

    #[test]
    fn test_implies_then_fallback() {
        let mut sched = Scheduler::new();
        let (first, then) = ordered_pair(&mut sched, OrderingKind::ImpliesThen);
        sched.clear_flag(first, ActionFlag::Optional);

        let ff = flags_for_ordering(&sched, first, None);
        let tf = flags_for_ordering(&sched, then, None);
        let changed = evaluate_edge(&mut sched, first, then, 0, ff, tf);

        assert!(changed.contains(Change::UpdatedThen));
        assert!(!sched.flags(then).contains(ActionFlag::Optional));
    }

    #[test]
    fn test_runnable_left_fallback() {
        let mut sched = Scheduler::new();
        let (first, then) = ordered_pair(&mut sched, OrderingKind::RunnableLeft);
        sched.clear_flag(first, ActionFlag::Runnable);

        let ff = flags_for_ordering(&sched, first, None);
        let tf = flags_for_ordering(&sched, then, None);
        let changed = evaluate_edge(&mut sched, first, then, 0, ff, tf);

        assert!(changed.contains(Change::UpdatedThen));
        assert!(!sched.flags(then).contains(ActionFlag::Runnable));
    }

    #[test]
    fn test_one_or_more_fallback_counts_runnable_firsts() {
        let mut sched = Scheduler::new();
        let (first, then) = ordered_pair(&mut sched, OrderingKind::OneOrMore);
        sched.set_required_runnable_before(then, 1);
        sched.clear_flag(then, ActionFlag::Runnable);

        let ff = flags_for_ordering(&sched, first, None);
        let tf = flags_for_ordering(&sched, then, None);
        let changed = evaluate_edge(&mut sched, first, then, 0, ff, tf);

        assert!(changed.contains(Change::UpdatedThen));
        assert_eq!(sched.action(then).runnable_before(), 1);
        assert!(sched.flags(then).contains(ActionFlag::Runnable));
    }

    #[test]
    fn test_print_always_reports_no_change() {
        let mut sched = Scheduler::new();
        let (first, then) = ordered_pair(&mut sched, OrderingKind::ImpliesThenPrinted);
        sched.clear_flag(first, ActionFlag::Optional);

        let ff = flags_for_ordering(&sched, first, None);
        let tf = flags_for_ordering(&sched, then, None);
        let changed = evaluate_edge(&mut sched, first, then, 0, ff, tf);

        assert!(changed.is_none());
        assert!(sched.flags(then).contains(ActionFlag::PrintAlways));
    }

    #[test]
    fn test_optional_kind_propagates_nothing() {
        let mut sched = Scheduler::new();
        let (first, then) = ordered_pair(&mut sched, OrderingKind::Optional);
        sched.clear_flag(first, ActionFlag::Optional);
        sched.clear_flag(first, ActionFlag::Runnable);

        let ff = flags_for_ordering(&sched, first, None);
        let tf = flags_for_ordering(&sched, then, None);
        let changed = evaluate_edge(&mut sched, first, then, 0, ff, tf);

        assert!(changed.is_none());
        assert!(sched.flags(then).contains(ActionFlag::Optional));
        assert!(sched.flags(then).contains(ActionFlag::Runnable));
    }
}
