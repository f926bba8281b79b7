//! The fixed-point driver.
//!
//! [`Scheduler::update_action`] reprocesses an action's predecessor edges
//! and propagates any resulting flag change to its neighborhood until
//! nothing moves. Propagation is naturally recursive but runs off an
//! explicit de-duplicated work queue, since graphs can hold thousands of
//! actions and stack depth would otherwise be unbounded. Flags travel
//! monotonically (optional strictly down except for explicit cancellation,
//! runnable down except through a bounded one-or-more threshold, edges only
//! ever disabled), so the fixed point is independent of visit order and the
//! queue always drains.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, trace};

use crate::action::{ActionFlag, ActionId, Task};
use crate::error::ResolverError;
use crate::ordering::{Change, ChangeSet, OrderingKind, OrderingSet};
use crate::resource::{ResourceFlag, ResourceVariant};
use crate::scheduler::Scheduler;

use super::evaluate::{evaluate_edge, flags_for_ordering};
use super::expand::expand_action;

impl Scheduler {
    /// Resolves ordering constraints for `then`'s neighborhood.
    ///
    /// Returns once the fixed point is reached; idempotent at the fixed
    /// point. Skipped or unexpandable edges are logged, not errors.
    ///
    /// # Errors
    ///
    /// [`ResolverError::UnknownAction`] when `then` is not from this
    /// context, and [`ResolverError::ConvergenceBudgetExceeded`] when the
    /// pass fails to converge within the sanity bound (a caller or resolver
    /// bug; the pass is abandoned).
    pub fn update_action(&mut self, then: ActionId) -> Result<(), ResolverError> {
        if then.index() >= self.action_count() {
            return Err(ResolverError::UnknownAction {
                id: then.index(),
                len: self.action_count(),
            });
        }

        let budget = self.convergence_budget();
        let mut queue = VecDeque::from([then]);
        let mut queued: HashSet<ActionId> = queue.iter().copied().collect();
        let mut visits = 0usize;

        while let Some(action) = queue.pop_front() {
            queued.remove(&action);
            visits += 1;
            if visits > budget {
                return Err(ResolverError::ConvergenceBudgetExceeded { visits, budget });
            }

            for next in self.process_action(action) {
                if queued.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        debug!(
            action = %self.action(then).uuid(),
            visits,
            "ordering fixed point reached"
        );
        Ok(())
    }

    /// One pass over `then`'s predecessor edges.
    ///
    /// Returns the actions whose neighborhoods must be reprocessed, in
    /// visit order.
    fn process_action(&mut self, then: ActionId) -> Vec<ActionId> {
        let mut resched = Vec::new();
        let last_flags = self.flags(then);

        trace!(
            action = %self.action(then).uuid(),
            flags = %last_flags,
            "processing action"
        );

        // The counter is recomputed from scratch on every pass.
        self.action_mut(then).runnable_before = 0;

        if last_flags.contains(ActionFlag::RequiresAny) {
            // Back-compat default for configurations that only set the flag.
            if self.action(then).required_runnable_before() == 0 {
                self.set_required_runnable_before(then, 1);
            }
            // One-or-more processing below is responsible for restoring it.
            self.clear_flag(then, ActionFlag::Runnable);
        }

        let mut changed = ChangeSet::NONE;
        let edge_total = self.predecessors(then).len();

        for index in 0..edge_total {
            let edge = self.predecessors(then)[index];
            if edge.is_disabled() {
                continue;
            }
            let first_raw = edge.peer;
            let kinds = edge.kinds;

            let first_node = self.ordering_node(first_raw);
            let then_node = self.ordering_node(then);

            // An edge valid only on a shared node dies once the endpoints
            // land apart.
            if kinds.contains(OrderingKind::SameNode) {
                if let (Some(first_on), Some(then_on)) = (first_node, then_node) {
                    if first_on != then_on {
                        trace!(
                            first = %self.action(first_raw).uuid(),
                            then = %self.action(then).uuid(),
                            "disabled same-node ordering: endpoints on different nodes"
                        );
                        self.action_mut(then).predecessors[index].kinds = OrderingSet::NONE;
                        continue;
                    }
                }
            }

            changed.remove(Change::UpdatedFirst);

            if self.action(first_raw).resource().is_some()
                && kinds.contains(OrderingKind::ThenCancelsFirst)
                && !self.flags(then).contains(ActionFlag::Optional)
            {
                /* 'then' is required, so 'first' must be abandoned (e.g. a
                 * required stop cancels any agent reload).
                 */
                self.set_flag(first_raw, ActionFlag::Optional);
                if self.action(first_raw).task() == Task::Reload {
                    if let Some(rsc) = self.action(first_raw).resource() {
                        self.clear_resource_flag(rsc, ResourceFlag::Reload);
                    }
                }
            }

            let mut first = first_raw;
            if let (Some(first_rsc), Some(then_rsc)) = (
                self.action(first_raw).resource(),
                self.action(then).resource(),
            ) {
                if first_rsc != then_rsc && !self.is_ancestor(then_rsc, first_rsc) {
                    first = expand_action(self, first_raw);
                }
            }
            if first != first_raw {
                trace!(
                    then = %self.action(then).uuid(),
                    first = %self.action(first).uuid(),
                    original = %self.action(first_raw).uuid(),
                    "ordering against the expanded action"
                );
            }

            let first_flags = flags_for_ordering(self, first, then_node);
            let then_flags = flags_for_ordering(self, then, first_node);

            if first == first_raw {
                changed |= evaluate_edge(self, first, then, index, first_flags, then_flags);
            } else if self.order_actions(first, then, kinds) {
                /* First time 'first' and 'then' were associated: retire the
                 * edge to the virtual action and start over against the new
                 * predecessor list.
                 */
                changed |= Change::UpdatedThen;
                changed |= Change::Disable;
            }

            if changed.contains(Change::Disable) {
                trace!(
                    first = %self.action(first_raw).uuid(),
                    then = %self.action(then).uuid(),
                    "ordering disabled"
                );
                changed.remove(Change::Disable);
                self.action_mut(then).predecessors[index].kinds = OrderingSet::NONE;
            }

            if changed.contains(Change::UpdatedFirst) {
                // Upstream changes may shadow later edges; requeue first's
                // whole neighborhood before moving on.
                for successor in self.successors(first) {
                    resched.push(successor.peer);
                }
                resched.push(first);
            }
        }

        if self.flags(then).contains(ActionFlag::RequiresAny) {
            if last_flags == self.flags(then) {
                changed.remove(Change::UpdatedThen);
            } else {
                changed |= Change::UpdatedThen;
            }
        }

        if changed.contains(Change::UpdatedThen) {
            if last_flags.contains(ActionFlag::Runnable)
                && !self.flags(then).contains(ActionFlag::Runnable)
            {
                debug!(
                    action = %self.action(then).uuid(),
                    "action lost runnable; colocated starts must be blocked"
                );
                self.push_colocation_block(then);
            }
            resched.push(then);
            for successor in self.successors(then) {
                resched.push(successor.peer);
            }
        }

        resched
    }

    /// The node an action participates in orderings from.
    ///
    /// A group's `start` is not bound to a concrete node even after the
    /// group has a home; its effective location substitutes.
    fn ordering_node(&self, action: ActionId) -> Option<crate::node::NodeId> {
        let node = self.action(action).node();
        let Some(rsc) = self.action(action).resource() else {
            return node;
        };
        if self.resource(rsc).variant() == ResourceVariant::Group
            && self.action(action).task() == Task::Start
        {
            let located = self.resource_location(rsc, false);
            if located.is_some() {
                trace!(
                    action = %self.action(action).uuid(),
                    "using the group's effective location for ordering"
                );
            }
            return located;
        }
        node
    }

    /// Sanity bound on per-action passes, proportional to
    /// `|actions| × |edges|`. Exceeding it is a bug, not load.
    fn convergence_budget(&self) -> usize {
        8 * (self.action_count() + 1) * (self.edge_count() + 1)
    }
}
