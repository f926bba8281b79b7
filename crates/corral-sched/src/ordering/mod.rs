//! Ordering-constraint vocabulary.
//!
//! Edges between actions carry one or more *ordering kinds*; each kind has
//! its own propagation rule, applied by [`crate::resolver`] in the
//! declaration order below. An edge whose kind set is empty is disabled and
//! ignored everywhere.

use serde::{Deserialize, Serialize};

use crate::action::ActionId;

/// A single ordering kind.
///
/// Discriminants are declared in evaluation order; [`ImpliesThenOnNode`]
/// is rewritten to [`ImpliesThen`] (with the peer node swapped to `first`'s
/// node) before the latter is applied.
///
/// [`ImpliesThenOnNode`]: Self::ImpliesThenOnNode
/// [`ImpliesThen`]: Self::ImpliesThen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[repr(u32)]
pub enum OrderingKind {
    /// A non-optional `first` makes `then` non-optional.
    ImpliesThen           = 1 << 0,
    /// [`Self::ImpliesThen`] evaluated on `first`'s node.
    ImpliesThenOnNode     = 1 << 1,
    /// A non-optional `then` pulls `first` into the graph ("if you must do
    /// X, you must first do Y").
    ImpliesFirst          = 1 << 2,
    /// [`Self::ImpliesFirst`] scoped to the promoted role.
    PromotedImpliesFirst  = 1 << 3,
    /// Stop/start pairing of a restart: required-ness and unrunnability
    /// both propagate from `first` to `then`.
    Restart               = 1 << 4,
    /// Each runnable `first` raises `then.runnable_before`; reaching the
    /// threshold makes `then` runnable.
    OneOrMore             = 1 << 5,
    /// Probe ordering; self-disables while the probed resource is being
    /// torn down so the probe cannot block `then`.
    Probe                 = 1 << 6,
    /// An unrunnable `first` makes `then` unrunnable.
    RunnableLeft          = 1 << 7,
    /// Refinement of [`Self::ImpliesFirst`] for live-migratable instances;
    /// opaque at this layer, defined by the primitive callback.
    ImpliesFirstMigratable = 1 << 8,
    /// [`Self::RunnableLeft`] scoped to pseudo-actions.
    PseudoLeft            = 1 << 9,
    /// Documents order only; no propagation.
    Optional              = 1 << 10,
    /// One-way runnable propagation.
    Asymmetrical          = 1 << 11,
    /// A runnable, non-optional `first` marks `then` print-always.
    ImpliesThenPrinted    = 1 << 12,
    /// A non-optional `then` marks `first` print-always.
    ImpliesFirstPrinted   = 1 << 13,
    /// A non-optional `then` renders `first` optional (and cancels a
    /// pending reload when `first` is one).
    ThenCancelsFirst      = 1 << 14,
    /// Valid only while both endpoints share a node; otherwise the edge is
    /// permanently disabled.
    SameNode              = 1 << 15,
}

impl OrderingKind {
    /// Every kind, in evaluation order.
    pub const ALL: [Self; 16] = [
        Self::ImpliesThen,
        Self::ImpliesThenOnNode,
        Self::ImpliesFirst,
        Self::PromotedImpliesFirst,
        Self::Restart,
        Self::OneOrMore,
        Self::Probe,
        Self::RunnableLeft,
        Self::ImpliesFirstMigratable,
        Self::PseudoLeft,
        Self::Optional,
        Self::Asymmetrical,
        Self::ImpliesThenPrinted,
        Self::ImpliesFirstPrinted,
        Self::ThenCancelsFirst,
        Self::SameNode,
    ];

    /// Returns the kind name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ImpliesThen => "implies-then",
            Self::ImpliesThenOnNode => "implies-then-on-node",
            Self::ImpliesFirst => "implies-first",
            Self::PromotedImpliesFirst => "promoted-implies-first",
            Self::Restart => "restart",
            Self::OneOrMore => "one-or-more",
            Self::Probe => "probe",
            Self::RunnableLeft => "runnable-left",
            Self::ImpliesFirstMigratable => "implies-first-migratable",
            Self::PseudoLeft => "pseudo-left",
            Self::Optional => "optional",
            Self::Asymmetrical => "asymmetrical",
            Self::ImpliesThenPrinted => "implies-then-printed",
            Self::ImpliesFirstPrinted => "implies-first-printed",
            Self::ThenCancelsFirst => "then-cancels-first",
            Self::SameNode => "same-node",
        }
    }
}

/// A set of [`OrderingKind`]s carried by one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct OrderingSet(u32);

impl OrderingSet {
    /// The empty (disabled) set.
    pub const NONE: Self = Self(0);

    /// Returns true if `kind` is in the set.
    #[must_use]
    pub const fn contains(self, kind: OrderingKind) -> bool {
        self.0 & (kind as u32) != 0
    }

    /// Returns true if no kind is set (the edge is disabled).
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Returns true if the set shares at least one kind with `other`.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns the set with `kind` added.
    #[must_use]
    pub const fn with(self, kind: OrderingKind) -> Self {
        Self(self.0 | kind as u32)
    }

    /// Returns the set with `kind` removed.
    #[must_use]
    pub const fn without(self, kind: OrderingKind) -> Self {
        Self(self.0 & !(kind as u32))
    }
}

impl From<OrderingKind> for OrderingSet {
    fn from(kind: OrderingKind) -> Self {
        Self(kind as u32)
    }
}

impl std::ops::BitOr<OrderingKind> for OrderingSet {
    type Output = Self;

    fn bitor(self, rhs: OrderingKind) -> Self {
        self.with(rhs)
    }
}

impl std::ops::BitOr for OrderingKind {
    type Output = OrderingSet;

    fn bitor(self, rhs: Self) -> OrderingSet {
        OrderingSet::from(self).with(rhs)
    }
}

impl std::fmt::Display for OrderingSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_none() {
            return write!(f, "none");
        }
        let mut first = true;
        for kind in OrderingKind::ALL {
            if self.contains(kind) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{}", kind.as_str())?;
                first = false;
            }
        }
        Ok(())
    }
}

/// A directed ordering edge.
///
/// Stored on both endpoints: in `then.predecessors` with `peer = first`,
/// and in `first.successors` with `peer = then`. Disabling clears the
/// predecessor-side kind set; the successor side is traversal-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderingEdge {
    /// The action on the other end of the edge.
    pub peer: ActionId,

    /// The kinds this edge carries; empty means disabled.
    pub kinds: OrderingSet,
}

impl OrderingEdge {
    /// Returns true if the edge has been disabled.
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        self.kinds.is_none()
    }
}

/// Change bits reported by edge evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[repr(u32)]
pub enum Change {
    /// `first`'s flags changed; reprocess it and its successors.
    UpdatedFirst = 1 << 0,
    /// `then`'s flags changed; reprocess it and its successors.
    UpdatedThen  = 1 << 1,
    /// Disable the edge under evaluation.
    Disable      = 1 << 2,
}

/// A set of [`Change`] bits, aggregated across the kinds of one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ChangeSet(u32);

impl ChangeSet {
    /// The empty set.
    pub const NONE: Self = Self(0);

    /// Returns true if `change` is in the set.
    #[must_use]
    pub const fn contains(self, change: Change) -> bool {
        self.0 & (change as u32) != 0
    }

    /// Inserts `change`.
    pub fn insert(&mut self, change: Change) {
        self.0 |= change as u32;
    }

    /// Removes `change`.
    pub fn remove(&mut self, change: Change) {
        self.0 &= !(change as u32);
    }

    /// Returns true if no change was recorded.
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl From<Change> for ChangeSet {
    fn from(change: Change) -> Self {
        Self(change as u32)
    }
}

impl std::ops::BitOrAssign for ChangeSet {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::ops::BitOrAssign<Change> for ChangeSet {
    fn bitor_assign(&mut self, rhs: Change) {
        self.insert(rhs);
    }
}
