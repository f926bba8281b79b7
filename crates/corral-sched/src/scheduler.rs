//! The scheduler context.
//!
//! One [`Scheduler`] owns every arena the resolver touches — actions,
//! resources, nodes — for the duration of a single decision pass. It is
//! threaded explicitly through every call; nothing in this crate keeps
//! ambient state. The context is not safe for concurrent passes and is
//! discarded after the decision cycle.

use tracing::trace;

use crate::action::{Action, ActionFlag, ActionFlags, ActionId, ActionSpec, Task};
use crate::node::{Node, NodeId};
use crate::ordering::{OrderingEdge, OrderingSet};
use crate::resource::{Resource, ResourceFlag, ResourceId, ResourceSpec};

/// Owner of the action graph for one decision pass.
#[derive(Debug, Default)]
pub struct Scheduler {
    actions: Vec<Action>,
    resources: Vec<Resource>,
    nodes: Vec<Node>,
    colocation_blocks: Vec<ActionId>,
}

impl Scheduler {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Graph construction
    // ------------------------------------------------------------------

    /// Registers a cluster member.
    pub fn add_node(&mut self, name: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            name: name.into(),
        });
        id
    }

    /// Registers a resource and wires it into the composite tree.
    pub fn add_resource(&mut self, spec: ResourceSpec) -> ResourceId {
        let id = ResourceId(self.resources.len());
        if let Some(parent) = spec.parent {
            self.resources[parent.0].children.push(id);
        }
        self.resources.push(Resource {
            id,
            name: spec.name,
            variant: spec.variant,
            flags: spec.flags,
            parent: spec.parent,
            children: Vec::new(),
            actions: Vec::new(),
            assigned_node: spec.assigned_node,
            running_on: spec.running_on,
        });
        id
    }

    /// Registers an action and attaches it to its resource's action list.
    pub fn add_action(&mut self, spec: ActionSpec) -> ActionId {
        let id = ActionId(self.actions.len());
        if let Some(resource) = spec.resource {
            self.resources[resource.0].actions.push(id);
        }
        self.actions.push(Action {
            id,
            uuid: spec.uuid,
            task: spec.task,
            resource: spec.resource,
            node: spec.node,
            flags: spec.flags,
            runnable_before: 0,
            required_runnable_before: spec.required_runnable_before,
            predecessors: Vec::new(),
            successors: Vec::new(),
        });
        id
    }

    /// Attaches an ordering edge `first → then` carrying `kinds`.
    ///
    /// Idempotent: when an edge between the same pair already shares any of
    /// the requested kinds, nothing is attached and `false` is returned.
    /// Empty kind sets and self-edges are rejected the same way.
    pub fn order_actions(
        &mut self,
        first: ActionId,
        then: ActionId,
        kinds: impl Into<OrderingSet>,
    ) -> bool {
        let kinds = kinds.into();
        if kinds.is_none() || first == then {
            return false;
        }

        let duplicate = self.actions[first.index()]
            .successors
            .iter()
            .any(|edge| edge.peer == then && edge.kinds.intersects(kinds));
        if duplicate {
            return false;
        }

        trace!(
            first = %self.actions[first.index()].uuid,
            then = %self.actions[then.index()].uuid,
            kinds = %kinds,
            "ordering attached"
        );
        self.actions[first.index()]
            .successors
            .push(OrderingEdge { peer: then, kinds });
        self.actions[then.index()]
            .predecessors
            .push(OrderingEdge { peer: first, kinds });
        true
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    /// Returns a node record.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this context.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Returns a resource record.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this context.
    #[must_use]
    pub fn resource(&self, id: ResourceId) -> &Resource {
        &self.resources[id.0]
    }

    /// Returns an action record.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this context.
    #[must_use]
    pub fn action(&self, id: ActionId) -> &Action {
        &self.actions[id.index()]
    }

    pub(crate) fn action_mut(&mut self, id: ActionId) -> &mut Action {
        &mut self.actions[id.index()]
    }

    /// Finds the first action in `actions` matching every given filter.
    ///
    /// A `node` filter matches only actions assigned to exactly that node.
    #[must_use]
    pub fn find_first_action(
        &self,
        actions: &[ActionId],
        uuid: Option<&str>,
        task: Option<Task>,
        node: Option<NodeId>,
    ) -> Option<ActionId> {
        actions.iter().copied().find(|&id| {
            let action = &self.actions[id.index()];
            if let Some(uuid) = uuid {
                if action.uuid != uuid {
                    return false;
                }
            }
            if let Some(task) = task {
                if action.task != task {
                    return false;
                }
            }
            if let Some(node) = node {
                if action.node != Some(node) {
                    return false;
                }
            }
            true
        })
    }

    /// The effective location of a resource.
    ///
    /// `current` selects where the resource is active now rather than where
    /// it was assigned. Collectives with no location of their own fall back
    /// to their first located member.
    #[must_use]
    pub fn resource_location(&self, rsc: ResourceId, current: bool) -> Option<NodeId> {
        let resource = &self.resources[rsc.0];
        let own = if current {
            resource.running_on.first().copied()
        } else {
            resource.assigned_node
        };
        if own.is_some() {
            return own;
        }
        if resource.variant.is_collective() {
            for &child in &resource.children {
                if let Some(node) = self.resource_location(child, current) {
                    return Some(node);
                }
            }
        }
        None
    }

    /// Returns true if `maybe_ancestor` is a strict ancestor of `rsc` in the
    /// composite tree.
    #[must_use]
    pub fn is_ancestor(&self, maybe_ancestor: ResourceId, rsc: ResourceId) -> bool {
        let mut cursor = self.resources[rsc.0].parent;
        while let Some(parent) = cursor {
            if parent == maybe_ancestor {
                return true;
            }
            cursor = self.resources[parent.0].parent;
        }
        false
    }

    // ------------------------------------------------------------------
    // Flag mutation
    // ------------------------------------------------------------------

    /// The current flags of `action`.
    ///
    /// # Panics
    ///
    /// Panics if `action` does not belong to this context.
    #[must_use]
    pub fn flags(&self, action: ActionId) -> ActionFlags {
        self.actions[action.index()].flags
    }

    /// Sets `flag` on `action`, returning whether the flag actually changed.
    pub fn set_flag(&mut self, action: ActionId, flag: ActionFlag) -> bool {
        let changed = self.actions[action.index()].flags.insert(flag);
        if changed {
            trace!(
                action = %self.actions[action.index()].uuid,
                flag = flag.as_str(),
                "action flag set"
            );
        }
        changed
    }

    /// Clears `flag` on `action`, returning whether the flag actually
    /// changed.
    pub fn clear_flag(&mut self, action: ActionId, flag: ActionFlag) -> bool {
        let changed = self.actions[action.index()].flags.remove(flag);
        if changed {
            trace!(
                action = %self.actions[action.index()].uuid,
                flag = flag.as_str(),
                "action flag cleared"
            );
        }
        changed
    }

    pub(crate) fn clear_resource_flag(&mut self, rsc: ResourceId, flag: ResourceFlag) -> bool {
        let changed = self.resources[rsc.0].flags.remove(flag);
        if changed {
            trace!(resource = %self.resources[rsc.0].name, flag = ?flag, "resource flag cleared");
        }
        changed
    }

    /// Sets the one-or-more threshold of `action`.
    pub fn set_required_runnable_before(&mut self, action: ActionId, required: u32) {
        self.actions[action.index()].required_runnable_before = required;
    }

    /// Increments `runnable_before`, returning the new count and the
    /// threshold it is measured against.
    pub(crate) fn bump_runnable_before(&mut self, action: ActionId) -> (u32, u32) {
        let action = &mut self.actions[action.index()];
        action.runnable_before += 1;
        (action.runnable_before, action.required_runnable_before)
    }

    // ------------------------------------------------------------------
    // Edge lists
    // ------------------------------------------------------------------

    /// Ordering edges naming `action` as `then`.
    ///
    /// # Panics
    ///
    /// Panics if `action` does not belong to this context.
    #[must_use]
    pub fn predecessors(&self, action: ActionId) -> &[OrderingEdge] {
        &self.actions[action.index()].predecessors
    }

    /// Ordering edges naming `action` as `first`.
    ///
    /// # Panics
    ///
    /// Panics if `action` does not belong to this context.
    #[must_use]
    pub fn successors(&self, action: ActionId) -> &[OrderingEdge] {
        &self.actions[action.index()].successors
    }

    // ------------------------------------------------------------------
    // Pass bookkeeping
    // ------------------------------------------------------------------

    /// Actions that lost `runnable` during resolution, recorded for the
    /// colocation subsystem to block dependent starts after the pass.
    pub fn take_colocation_blocks(&mut self) -> Vec<ActionId> {
        std::mem::take(&mut self.colocation_blocks)
    }

    pub(crate) fn push_colocation_block(&mut self, action: ActionId) {
        self.colocation_blocks.push(action);
    }

    pub(crate) fn action_count(&self) -> usize {
        self.actions.len()
    }

    pub(crate) fn edge_count(&self) -> usize {
        self.actions
            .iter()
            .map(|action| action.predecessors.len())
            .sum()
    }
}
