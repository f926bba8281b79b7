//! Primitive-resource callbacks.
//!
//! Primitives carry the detailed per-kind propagation rules; the collective
//! variants reuse them and add instance cascading on top.

use tracing::trace;

use crate::action::{ActionFlag, ActionFlags, ActionId};
use crate::node::NodeId;
use crate::ordering::{Change, ChangeSet, OrderingKind};
use crate::scheduler::Scheduler;

use super::VariantOps;

/// [`VariantOps`] for [`ResourceVariant::Primitive`](super::ResourceVariant::Primitive).
pub struct PrimitiveOps;

impl VariantOps for PrimitiveOps {
    fn action_flags(
        &self,
        sched: &Scheduler,
        action: ActionId,
        _node: Option<NodeId>,
    ) -> ActionFlags {
        sched.action(action).flags()
    }

    /// The per-kind decision table.
    ///
    /// `ImpliesFirstMigratable` is opaque in the ordering vocabulary; its
    /// behavior here is normative: when `then` is not both `runnable` and
    /// `migrate-runnable`, the pending live migration is off and `first`
    /// (the stop on the migration source) loses `optional` so the full
    /// stop/start path runs.
    fn update_ordered_actions(
        &self,
        sched: &mut Scheduler,
        first: ActionId,
        then: ActionId,
        _node: Option<NodeId>,
        first_flags: ActionFlags,
        filter: ActionFlags,
        kind: OrderingKind,
    ) -> ChangeSet {
        let mut changed = ChangeSet::NONE;

        match kind {
            OrderingKind::ImpliesThen => {
                if filter.contains(ActionFlag::Optional)
                    && !first_flags.contains(ActionFlag::Optional)
                    && sched.clear_flag(then, ActionFlag::Optional)
                {
                    changed |= Change::UpdatedThen;
                }
            }

            OrderingKind::Restart => {
                // 'first' is the stop half of a restart, 'then' the start
                // half. Required-ness propagates forward, and an unrunnable
                // stop blocks the start.
                if !first_flags.contains(ActionFlag::Optional) {
                    if filter.contains(ActionFlag::Optional)
                        && sched.clear_flag(then, ActionFlag::Optional)
                    {
                        changed |= Change::UpdatedThen;
                    }
                    if filter.contains(ActionFlag::Runnable)
                        && !first_flags.contains(ActionFlag::Runnable)
                        && sched.clear_flag(then, ActionFlag::Runnable)
                    {
                        changed |= Change::UpdatedThen;
                    }
                }
                // A required start keeps its stop in the graph.
                if !sched.flags(then).contains(ActionFlag::Optional)
                    && sched.clear_flag(first, ActionFlag::Optional)
                {
                    changed |= Change::UpdatedFirst;
                }
            }

            // The promoted-role variant carries the same propagation rule;
            // the scoping lives in which edges the kind is attached to.
            OrderingKind::ImpliesFirst | OrderingKind::PromotedImpliesFirst => {
                if !sched.flags(then).contains(ActionFlag::Optional)
                    && sched.clear_flag(first, ActionFlag::Optional)
                {
                    changed |= Change::UpdatedFirst;
                }
            }

            OrderingKind::OneOrMore => {
                if first_flags.contains(ActionFlag::Runnable) {
                    let (seen, required) = sched.bump_runnable_before(then);
                    if seen >= required && sched.set_flag(then, ActionFlag::Runnable) {
                        changed |= Change::UpdatedThen;
                    }
                }
            }

            OrderingKind::RunnableLeft => {
                if !first_flags.contains(ActionFlag::Runnable)
                    && sched.clear_flag(then, ActionFlag::Runnable)
                {
                    changed |= Change::UpdatedThen;
                }
            }

            OrderingKind::ImpliesFirstMigratable => {
                let then_flags = sched.flags(then);
                let migratable = then_flags.contains(ActionFlag::Runnable)
                    && then_flags.contains(ActionFlag::MigrateRunnable);
                if !migratable && sched.clear_flag(first, ActionFlag::Optional) {
                    trace!(
                        first = %sched.action(first).uuid(),
                        then = %sched.action(then).uuid(),
                        "migration is off, stop on the source is required"
                    );
                    changed |= Change::UpdatedFirst;
                }
            }

            OrderingKind::PseudoLeft => {
                if !first_flags.contains(ActionFlag::Runnable)
                    && sched.flags(then).contains(ActionFlag::Pseudo)
                    && sched.clear_flag(then, ActionFlag::Runnable)
                {
                    changed |= Change::UpdatedThen;
                }
            }

            OrderingKind::Asymmetrical => {
                if !first_flags.contains(ActionFlag::Runnable)
                    && sched.clear_flag(then, ActionFlag::Runnable)
                {
                    changed |= Change::UpdatedThen;
                }
            }

            // Documents order only.
            OrderingKind::Optional => {}

            // Rewritten or fully handled by the evaluator/driver before the
            // dispatch reaches a variant.
            OrderingKind::ImpliesThenOnNode
            | OrderingKind::Probe
            | OrderingKind::ImpliesThenPrinted
            | OrderingKind::ImpliesFirstPrinted
            | OrderingKind::ThenCancelsFirst
            | OrderingKind::SameNode => {}
        }

        changed
    }
}
