//! Action model.
//!
//! An action is one unit of work the cluster must perform (start a resource,
//! stop it, probe it, fence a node, ...), optionally tied to a resource and
//! to the node it was assigned to. The resolver reads and mutates action
//! *flags* and the per-action ordering edge lists; it never creates or
//! destroys actions.

pub mod key;

use serde::{Deserialize, Serialize};

use crate::error::ResolverError;
use crate::node::NodeId;
use crate::ordering::OrderingEdge;
use crate::resource::ResourceId;

/// Identity of an action within a scheduler context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionId(pub(crate) usize);

impl ActionId {
    pub(crate) const fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "action#{}", self.0)
    }
}

/// A single action flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[repr(u32)]
pub enum ActionFlag {
    /// The action stands for a logical event, not a real operation.
    Pseudo          = 1 << 0,
    /// The cluster is able to execute the action.
    Runnable        = 1 << 1,
    /// The cluster is allowed to skip the action.
    Optional        = 1 << 2,
    /// Always include the action in graph output, even when optional.
    PrintAlways     = 1 << 3,
    /// The action becomes runnable once enough one-or-more predecessors are.
    RequiresAny     = 1 << 4,
    /// The resource's pending live migration can still proceed.
    MigrateRunnable = 1 << 5,
}

impl ActionFlag {
    /// Returns the flag name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pseudo => "pseudo",
            Self::Runnable => "runnable",
            Self::Optional => "optional",
            Self::PrintAlways => "print-always",
            Self::RequiresAny => "requires-any",
            Self::MigrateRunnable => "migrate-runnable",
        }
    }

    const ALL: [Self; 6] = [
        Self::Pseudo,
        Self::Runnable,
        Self::Optional,
        Self::PrintAlways,
        Self::RequiresAny,
        Self::MigrateRunnable,
    ];
}

/// A set of [`ActionFlag`]s.
///
/// Set and clear report whether the set actually changed; the fixed-point
/// driver relies on that to decide what to reschedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ActionFlags(u32);

impl ActionFlags {
    /// The empty set.
    pub const NONE: Self = Self(0);

    /// Returns true if `flag` is in the set.
    #[must_use]
    pub const fn contains(self, flag: ActionFlag) -> bool {
        self.0 & (flag as u32) != 0
    }

    /// Inserts `flag`, returning whether the set changed.
    pub fn insert(&mut self, flag: ActionFlag) -> bool {
        let before = self.0;
        self.0 |= flag as u32;
        self.0 != before
    }

    /// Removes `flag`, returning whether the set changed.
    pub fn remove(&mut self, flag: ActionFlag) -> bool {
        let before = self.0;
        self.0 &= !(flag as u32);
        self.0 != before
    }

    /// Returns the set with `flag` added.
    #[must_use]
    pub const fn with(self, flag: ActionFlag) -> Self {
        Self(self.0 | flag as u32)
    }

    /// Returns the set with `flag` removed.
    #[must_use]
    pub const fn without(self, flag: ActionFlag) -> Self {
        Self(self.0 & !(flag as u32))
    }

    /// Returns the intersection with `mask`.
    #[must_use]
    pub const fn retain(self, mask: Self) -> Self {
        Self(self.0 & mask.0)
    }
}

impl From<ActionFlag> for ActionFlags {
    fn from(flag: ActionFlag) -> Self {
        Self(flag as u32)
    }
}

impl std::ops::BitOr<ActionFlag> for ActionFlags {
    type Output = Self;

    fn bitor(self, rhs: ActionFlag) -> Self {
        self.with(rhs)
    }
}

impl std::ops::BitOr for ActionFlag {
    type Output = ActionFlags;

    fn bitor(self, rhs: Self) -> ActionFlags {
        ActionFlags::from(self).with(rhs)
    }
}

impl std::fmt::Display for ActionFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for flag in ActionFlag::ALL {
            if self.contains(flag) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{}", flag.as_str())?;
                first = false;
            }
        }
        if first {
            write!(f, "none")?;
        }
        Ok(())
    }
}

/// The closed task vocabulary.
///
/// `Running`, `Stopped`, `Notified`, `Promoted`, and `Demoted` are the
/// post-completion peers of the five active tasks; composite-resource
/// ordering is expressed against them (see [`crate::resolver`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Task {
    /// Start a resource.
    Start,
    /// Stop a resource.
    Stop,
    /// Recurring or one-shot health probe.
    Monitor,
    /// Notify a resource's peers of a lifecycle event.
    Notify,
    /// Promote a promotable instance.
    Promote,
    /// Demote a promotable instance.
    Demote,
    /// Post-completion peer of [`Task::Start`].
    Running,
    /// Post-completion peer of [`Task::Stop`].
    Stopped,
    /// Post-completion peer of [`Task::Notify`].
    Notified,
    /// Post-completion peer of [`Task::Promote`].
    Promoted,
    /// Post-completion peer of [`Task::Demote`].
    Demoted,
    /// Orderly node shutdown.
    Shutdown,
    /// Fence a node.
    Fence,
    /// In-place agent reload.
    Reload,
}

impl Task {
    /// Parses a task from its op-key text.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::UnknownTask`] for text outside the closed
    /// vocabulary.
    pub fn parse(s: &str) -> Result<Self, ResolverError> {
        match s {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "monitor" => Ok(Self::Monitor),
            "notify" => Ok(Self::Notify),
            "promote" => Ok(Self::Promote),
            "demote" => Ok(Self::Demote),
            "running" => Ok(Self::Running),
            "stopped" => Ok(Self::Stopped),
            "notified" => Ok(Self::Notified),
            "promoted" => Ok(Self::Promoted),
            "demoted" => Ok(Self::Demoted),
            "shutdown" => Ok(Self::Shutdown),
            "fence" => Ok(Self::Fence),
            "reload" => Ok(Self::Reload),
            _ => Err(ResolverError::UnknownTask {
                value: s.to_string(),
            }),
        }
    }

    /// Returns the op-key text of this task.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Monitor => "monitor",
            Self::Notify => "notify",
            Self::Promote => "promote",
            Self::Demote => "demote",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Notified => "notified",
            Self::Promoted => "promoted",
            Self::Demoted => "demoted",
            Self::Shutdown => "shutdown",
            Self::Fence => "fence",
            Self::Reload => "reload",
        }
    }

    /// Maps a task to its post-completion peer.
    ///
    /// Active tasks map to their completion events, completion events map to
    /// themselves, and `None` means the task refers to a primitive event that
    /// ordering constraints name directly and must never be expanded.
    #[must_use]
    pub const fn completed(self) -> Option<Self> {
        match self {
            Self::Start | Self::Running => Some(Self::Running),
            Self::Stop | Self::Stopped => Some(Self::Stopped),
            Self::Notify | Self::Notified => Some(Self::Notified),
            Self::Promote | Self::Promoted => Some(Self::Promoted),
            Self::Demote | Self::Demoted => Some(Self::Demoted),
            Self::Monitor | Self::Shutdown | Self::Fence | Self::Reload => None,
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One unit of cluster work.
///
/// Constructed from an [`ActionSpec`] via
/// [`Scheduler::add_action`](crate::scheduler::Scheduler::add_action); all
/// flag mutation goes through the scheduler so changes are observable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub(crate) id: ActionId,
    pub(crate) uuid: String,
    pub(crate) task: Task,
    pub(crate) resource: Option<ResourceId>,
    pub(crate) node: Option<NodeId>,
    pub(crate) flags: ActionFlags,
    pub(crate) runnable_before: u32,
    pub(crate) required_runnable_before: u32,
    pub(crate) predecessors: Vec<OrderingEdge>,
    pub(crate) successors: Vec<OrderingEdge>,
}

impl Action {
    /// The action's stable identifier (its op key).
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// The action's task.
    #[must_use]
    pub const fn task(&self) -> Task {
        self.task
    }

    /// The owning resource, if any.
    #[must_use]
    pub const fn resource(&self) -> Option<ResourceId> {
        self.resource
    }

    /// The assigned node, if any.
    #[must_use]
    pub const fn node(&self) -> Option<NodeId> {
        self.node
    }

    /// The action's current flags.
    #[must_use]
    pub const fn flags(&self) -> ActionFlags {
        self.flags
    }

    /// Count of runnable one-or-more predecessors seen in the current pass.
    #[must_use]
    pub const fn runnable_before(&self) -> u32 {
        self.runnable_before
    }

    /// One-or-more threshold; `0` defaults to `1` at evaluation time.
    #[must_use]
    pub const fn required_runnable_before(&self) -> u32 {
        self.required_runnable_before
    }

    /// Ordering edges naming this action as `then`.
    #[must_use]
    pub fn predecessors(&self) -> &[OrderingEdge] {
        &self.predecessors
    }

    /// Ordering edges naming this action as `first`.
    #[must_use]
    pub fn successors(&self) -> &[OrderingEdge] {
        &self.successors
    }
}

/// Specification for a new [`Action`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSpec {
    pub(crate) uuid: String,
    pub(crate) task: Task,
    pub(crate) resource: Option<ResourceId>,
    pub(crate) node: Option<NodeId>,
    pub(crate) flags: ActionFlags,
    pub(crate) required_runnable_before: u32,
}

impl ActionSpec {
    /// Creates a spec with the default initial flags (`optional|runnable`).
    #[must_use]
    pub fn new(uuid: impl Into<String>, task: Task) -> Self {
        Self {
            uuid: uuid.into(),
            task,
            resource: None,
            node: None,
            flags: ActionFlag::Optional | ActionFlag::Runnable,
            required_runnable_before: 0,
        }
    }

    /// Ties the action to a resource.
    #[must_use]
    pub const fn resource(mut self, resource: ResourceId) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Assigns the action to a node.
    #[must_use]
    pub const fn node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }

    /// Replaces the initial flags wholesale.
    #[must_use]
    pub const fn flags(mut self, flags: ActionFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Adds a flag to the initial set.
    #[must_use]
    pub const fn with_flag(mut self, flag: ActionFlag) -> Self {
        self.flags = self.flags.with(flag);
        self
    }

    /// Removes a flag from the initial set.
    #[must_use]
    pub const fn without_flag(mut self, flag: ActionFlag) -> Self {
        self.flags = self.flags.without(flag);
        self
    }

    /// Marks the action `requires-any` with the given one-or-more threshold.
    #[must_use]
    pub const fn requires_any(mut self, required_runnable_before: u32) -> Self {
        self.flags = self.flags.with(ActionFlag::RequiresAny);
        self.required_runnable_before = required_runnable_before;
        self
    }
}
