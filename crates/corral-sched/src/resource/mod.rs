//! Resource model and the per-variant dispatcher.
//!
//! Resources form a composite tree: primitives at the leaves, groups,
//! clones, and bundles above them. The resolver never inspects a resource
//! directly — it goes through the variant's [`VariantOps`] callbacks, which
//! is where composite resources coordinate their instances.

mod bundle;
mod clone;
mod group;
mod primitive;

pub use bundle::BundleOps;
pub use clone::CloneOps;
pub use group::GroupOps;
pub use primitive::PrimitiveOps;

use serde::{Deserialize, Serialize};

use crate::action::{ActionFlags, ActionId};
use crate::node::NodeId;
use crate::ordering::{ChangeSet, OrderingKind};
use crate::scheduler::Scheduler;

/// Identity of a resource within a scheduler context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub(crate) usize);

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rsc#{}", self.0)
    }
}

/// Resource variant, ordered from simple to composite.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ResourceVariant {
    /// A single resource instance.
    Primitive,
    /// An ordered set of member resources.
    Group,
    /// Interchangeable instances across nodes.
    Clone,
    /// A containerized resource with its own inner resources.
    Bundle,
}

impl ResourceVariant {
    /// Returns true for variants with member instances.
    #[must_use]
    pub fn is_collective(self) -> bool {
        self >= Self::Group
    }

    /// Returns the variant's [`VariantOps`] implementation.
    #[must_use]
    pub fn ops(self) -> &'static dyn VariantOps {
        match self {
            Self::Primitive => &PrimitiveOps,
            Self::Group => &GroupOps,
            Self::Clone => &CloneOps,
            Self::Bundle => &BundleOps,
        }
    }
}

/// A single resource flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[repr(u32)]
pub enum ResourceFlag {
    /// The cluster is allowed to act on this resource.
    Managed = 1 << 0,
    /// A failed stop left the resource blocked.
    Blocked = 1 << 1,
    /// Instances are told about each other's lifecycle events.
    Notify  = 1 << 2,
    /// An in-place agent reload is pending.
    Reload  = 1 << 3,
}

/// A set of [`ResourceFlag`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ResourceFlags(u32);

impl ResourceFlags {
    /// The empty set.
    pub const NONE: Self = Self(0);

    /// Returns true if `flag` is in the set.
    #[must_use]
    pub const fn contains(self, flag: ResourceFlag) -> bool {
        self.0 & (flag as u32) != 0
    }

    /// Returns the set with `flag` added.
    #[must_use]
    pub const fn with(self, flag: ResourceFlag) -> Self {
        Self(self.0 | flag as u32)
    }

    /// Returns the set with `flag` removed.
    #[must_use]
    pub const fn without(self, flag: ResourceFlag) -> Self {
        Self(self.0 & !(flag as u32))
    }

    /// Removes `flag` in place, returning whether the set changed.
    pub fn remove(&mut self, flag: ResourceFlag) -> bool {
        let before = self.0;
        self.0 &= !(flag as u32);
        self.0 != before
    }
}

impl From<ResourceFlag> for ResourceFlags {
    fn from(flag: ResourceFlag) -> Self {
        Self(flag as u32)
    }
}

impl std::ops::BitOr for ResourceFlag {
    type Output = ResourceFlags;

    fn bitor(self, rhs: Self) -> ResourceFlags {
        ResourceFlags::from(self).with(rhs)
    }
}

impl std::ops::BitOr<ResourceFlag> for ResourceFlags {
    type Output = Self;

    fn bitor(self, rhs: ResourceFlag) -> Self {
        self.with(rhs)
    }
}

/// A node in the composite resource tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub(crate) id: ResourceId,
    pub(crate) name: String,
    pub(crate) variant: ResourceVariant,
    pub(crate) flags: ResourceFlags,
    pub(crate) parent: Option<ResourceId>,
    pub(crate) children: Vec<ResourceId>,
    pub(crate) actions: Vec<ActionId>,
    pub(crate) assigned_node: Option<NodeId>,
    pub(crate) running_on: Vec<NodeId>,
}

impl Resource {
    /// The configuration name, as used inside op keys.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The resource variant.
    #[must_use]
    pub const fn variant(&self) -> ResourceVariant {
        self.variant
    }

    /// The resource's flags.
    #[must_use]
    pub const fn flags(&self) -> ResourceFlags {
        self.flags
    }

    /// The parent in the composite tree, if any.
    #[must_use]
    pub const fn parent(&self) -> Option<ResourceId> {
        self.parent
    }

    /// Member resources, in configuration order.
    #[must_use]
    pub fn children(&self) -> &[ResourceId] {
        &self.children
    }

    /// Actions owned by this resource.
    #[must_use]
    pub fn actions(&self) -> &[ActionId] {
        &self.actions
    }

    /// The node the resource was assigned to, if any.
    #[must_use]
    pub const fn assigned_node(&self) -> Option<NodeId> {
        self.assigned_node
    }

    /// Nodes the resource is currently active on.
    #[must_use]
    pub fn running_on(&self) -> &[NodeId] {
        &self.running_on
    }
}

/// Specification for a new [`Resource`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub(crate) name: String,
    pub(crate) variant: ResourceVariant,
    pub(crate) flags: ResourceFlags,
    pub(crate) parent: Option<ResourceId>,
    pub(crate) assigned_node: Option<NodeId>,
    pub(crate) running_on: Vec<NodeId>,
}

impl ResourceSpec {
    /// Creates a spec with the default flags (`managed`).
    #[must_use]
    pub fn new(name: impl Into<String>, variant: ResourceVariant) -> Self {
        Self {
            name: name.into(),
            variant,
            flags: ResourceFlags::from(ResourceFlag::Managed),
            parent: None,
            assigned_node: None,
            running_on: Vec::new(),
        }
    }

    /// Replaces the initial flags wholesale.
    #[must_use]
    pub const fn flags(mut self, flags: ResourceFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Adds a flag to the initial set.
    #[must_use]
    pub const fn with_flag(mut self, flag: ResourceFlag) -> Self {
        self.flags = self.flags.with(flag);
        self
    }

    /// Removes a flag from the initial set.
    #[must_use]
    pub const fn without_flag(mut self, flag: ResourceFlag) -> Self {
        self.flags = self.flags.without(flag);
        self
    }

    /// Places the resource under a parent in the composite tree.
    #[must_use]
    pub const fn parent(mut self, parent: ResourceId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Records the node the resource was assigned to.
    #[must_use]
    pub const fn assigned_node(mut self, node: NodeId) -> Self {
        self.assigned_node = Some(node);
        self
    }

    /// Records the nodes the resource is currently active on.
    #[must_use]
    pub fn running_on(mut self, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        self.running_on = nodes.into_iter().collect();
        self
    }
}

/// Per-variant callbacks the resolver dispatches through.
///
/// Implementations are stateless unit structs; all graph state lives in the
/// [`Scheduler`] context passed to every call.
pub trait VariantOps: Sync {
    /// Variant-aware effective flags for `action`.
    ///
    /// With a node, a clone may report "not runnable here" while still being
    /// runnable somewhere; without one, the collective view is returned.
    fn action_flags(
        &self,
        sched: &Scheduler,
        action: ActionId,
        node: Option<NodeId>,
    ) -> ActionFlags;

    /// Variant-aware propagation refinement for one `(first, then)` pair
    /// under `kind`.
    ///
    /// `first_flags` are the (possibly masked) effective flags of `first`;
    /// `filter` masks which of `then`'s properties the kind may touch.
    fn update_ordered_actions(
        &self,
        sched: &mut Scheduler,
        first: ActionId,
        then: ActionId,
        node: Option<NodeId>,
        first_flags: ActionFlags,
        filter: ActionFlags,
        kind: OrderingKind,
    ) -> ChangeSet;
}

/// Shared collective behavior: apply the primitive rule to the collective
/// action, then cascade to each member's matching action through the
/// member's own ops.
pub(crate) fn cascade_update(
    sched: &mut Scheduler,
    first: ActionId,
    then: ActionId,
    node: Option<NodeId>,
    first_flags: ActionFlags,
    filter: ActionFlags,
    kind: OrderingKind,
) -> ChangeSet {
    let mut changed =
        PrimitiveOps.update_ordered_actions(sched, first, then, node, first_flags, filter, kind);

    let Some(rsc) = sched.action(then).resource() else {
        return changed;
    };
    let task = sched.action(then).task();
    let children = sched.resource(rsc).children.clone();

    for child in children {
        let child_actions = sched.resource(child).actions.clone();
        if let Some(child_then) = sched.find_first_action(&child_actions, None, Some(task), node) {
            let child_variant = sched.resource(child).variant;
            changed |= child_variant.ops().update_ordered_actions(
                sched,
                first,
                child_then,
                node,
                first_flags,
                filter,
                kind,
            );
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_order() {
        assert!(ResourceVariant::Primitive < ResourceVariant::Group);
        assert!(ResourceVariant::Group < ResourceVariant::Clone);
        assert!(ResourceVariant::Clone < ResourceVariant::Bundle);

        assert!(!ResourceVariant::Primitive.is_collective());
        assert!(ResourceVariant::Group.is_collective());
        assert!(ResourceVariant::Bundle.is_collective());
    }

    #[test]
    fn test_resource_spec_defaults() {
        let spec = ResourceSpec::new("db", ResourceVariant::Primitive);
        assert!(spec.flags.contains(ResourceFlag::Managed));
        assert!(!spec.flags.contains(ResourceFlag::Blocked));
        assert!(spec.running_on.is_empty());
    }

    #[test]
    fn test_resource_flags_remove_reports_change() {
        let mut flags = ResourceFlag::Managed | ResourceFlag::Reload;
        assert!(flags.remove(ResourceFlag::Reload));
        assert!(!flags.remove(ResourceFlag::Reload));
        assert!(flags.contains(ResourceFlag::Managed));
    }
}
