//! # corral-sched
//!
//! Action-graph ordering resolver for the corral policy engine.
//!
//! Given a set of actions (work items the cluster must perform on resources
//! across nodes) and typed ordering constraints between them, the resolver
//! propagates properties — principally *optional/required* and
//! *runnable/unrunnable* — across constraint edges until a fixed point is
//! reached. Composite resources (groups, clones, bundles) participate
//! through virtual actions that are expanded to their concrete
//! post-completion peers before propagation, and refine propagation through
//! per-variant callbacks.
//!
//! The crate is an in-process library: configuration parsing, node
//! assignment, transition-graph emission, and execution all live elsewhere
//! in the workspace. A [`scheduler::Scheduler`] context owns the whole graph
//! for one decision pass and is discarded afterwards.
//!
//! ## Example
//!
//! ```rust
//! use corral_sched::prelude::*;
//!
//! let mut sched = Scheduler::new();
//! let db = sched.add_resource(ResourceSpec::new("db", ResourceVariant::Primitive));
//! let web = sched.add_resource(ResourceSpec::new("web", ResourceVariant::Primitive));
//! let db_start = sched.add_action(ActionSpec::new("db_start_0", Task::Start).resource(db));
//! let web_start = sched.add_action(ActionSpec::new("web_start_0", Task::Start).resource(web));
//!
//! // web must not start unless db did.
//! sched.order_actions(db_start, web_start, OrderingKind::ImpliesThen);
//!
//! // The cluster decided db has to start; web follows.
//! sched.clear_flag(db_start, ActionFlag::Optional);
//! sched.update_action(web_start).unwrap();
//! assert!(!sched.flags(web_start).contains(ActionFlag::Optional));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod action;
pub mod error;
pub mod node;
pub mod ordering;
pub mod resolver;
pub mod resource;
pub mod scheduler;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::action::{ActionFlag, ActionFlags, ActionId, ActionSpec, Task};
    pub use crate::error::ResolverError;
    pub use crate::node::NodeId;
    pub use crate::ordering::{OrderingKind, OrderingSet};
    pub use crate::resource::{ResourceFlag, ResourceId, ResourceSpec, ResourceVariant};
    pub use crate::scheduler::Scheduler;
}

/// Re-export commonly used types at the crate root.
pub use action::{ActionFlag, ActionFlags, ActionId, ActionSpec, Task};
pub use error::ResolverError;
pub use ordering::{OrderingEdge, OrderingKind, OrderingSet};
pub use resource::{ResourceFlag, ResourceId, ResourceSpec, ResourceVariant, VariantOps};
pub use scheduler::Scheduler;
