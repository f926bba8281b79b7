//! Integration tests for the ordering resolver.
//!
//! These tests drive whole resolution passes through the public surface:
//! graph construction, constraint attachment, `update_action`, and the
//! flag/edge state left behind.
//!
//! # Test Coverage
//!
//! - Required-ness propagation across primitives
//! - Blocked, unmanaged stops denying dependents
//! - One-or-more thresholds
//! - Probe edges cancelling themselves during teardown
//! - Clone "runnable anywhere" in effective flags
//! - Group-start node fix-up against same-node filters
//! - Virtual-action expansion and edge redirection
//! - Fixed-point idempotence and monotonicity

use corral_sched::prelude::*;
use corral_sched::resolver::{expand_action, flags_for_ordering};

// ============================================================================
// Helpers
// ============================================================================

fn primitive(sched: &mut Scheduler, name: &str) -> ResourceId {
    sched.add_resource(ResourceSpec::new(name, ResourceVariant::Primitive))
}

fn action(sched: &mut Scheduler, rsc: ResourceId, name: &str, task: Task) -> ActionId {
    let uuid = format!("{name}_{task}_0");
    sched.add_action(ActionSpec::new(uuid, task).resource(rsc))
}

// ============================================================================
// End-to-End Scenarios
// ============================================================================

#[test]
fn required_first_makes_then_required() {
    let mut sched = Scheduler::new();
    let ra = primitive(&mut sched, "a");
    let rb = primitive(&mut sched, "b");
    let a_start = action(&mut sched, ra, "a", Task::Start);
    let b_start = action(&mut sched, rb, "b", Task::Start);
    sched.order_actions(a_start, b_start, OrderingKind::ImpliesThen);

    // The cluster decided 'a' must start.
    sched.clear_flag(a_start, ActionFlag::Optional);
    sched.update_action(b_start).expect("converges");

    assert!(!sched.flags(b_start).contains(ActionFlag::Optional));
    assert!(sched.flags(a_start).contains(ActionFlag::Runnable));
    assert!(sched.flags(b_start).contains(ActionFlag::Runnable));
}

#[test]
fn blocked_unmanaged_stop_denies_dependent_start() {
    let mut sched = Scheduler::new();
    let ra = sched.add_resource(
        ResourceSpec::new("a", ResourceVariant::Primitive)
            .without_flag(ResourceFlag::Managed)
            .with_flag(ResourceFlag::Blocked),
    );
    let rb = primitive(&mut sched, "b");
    let a_stop = sched.add_action(
        ActionSpec::new("a_stop_0", Task::Stop)
            .resource(ra)
            .without_flag(ActionFlag::Runnable),
    );
    let b_start = action(&mut sched, rb, "b", Task::Start);
    sched.order_actions(a_stop, b_start, OrderingKind::Restart);

    sched.update_action(b_start).expect("converges");

    assert!(!sched.flags(b_start).contains(ActionFlag::Runnable));
    // Losing runnable is what the colocation subsystem keys off.
    assert_eq!(sched.take_colocation_blocks(), vec![b_start]);
}

#[test]
fn one_or_more_threshold_restores_runnable() {
    let mut sched = Scheduler::new();
    let then = sched.add_action(
        ActionSpec::new("all-clones-started_running_0", Task::Running).requires_any(2),
    );
    let f1 = sched.add_action(ActionSpec::new("f1_start_0", Task::Start));
    let f2 = sched.add_action(ActionSpec::new("f2_start_0", Task::Start));
    let f3 = sched.add_action(
        ActionSpec::new("f3_start_0", Task::Start).without_flag(ActionFlag::Runnable),
    );
    for first in [f1, f2, f3] {
        sched.order_actions(first, then, OrderingKind::OneOrMore);
    }

    sched.update_action(then).expect("converges");

    assert_eq!(sched.action(then).runnable_before(), 2);
    assert!(sched.flags(then).contains(ActionFlag::Runnable));
}

#[test]
fn one_or_more_below_threshold_stays_unrunnable() {
    let mut sched = Scheduler::new();
    let then = sched.add_action(
        ActionSpec::new("all-clones-started_running_0", Task::Running).requires_any(2),
    );
    let f1 = sched.add_action(ActionSpec::new("f1_start_0", Task::Start));
    let f2 = sched.add_action(
        ActionSpec::new("f2_start_0", Task::Start).without_flag(ActionFlag::Runnable),
    );
    for first in [f1, f2] {
        sched.order_actions(first, then, OrderingKind::OneOrMore);
    }

    sched.update_action(then).expect("converges");

    assert_eq!(sched.action(then).runnable_before(), 1);
    assert!(!sched.flags(then).contains(ActionFlag::Runnable));
}

#[test]
fn probe_of_stopping_resource_disables_its_edge() {
    let mut sched = Scheduler::new();
    let n1 = sched.add_node("alpha");
    let ra = sched.add_resource(
        ResourceSpec::new("a", ResourceVariant::Primitive).running_on([n1]),
    );
    let rb = primitive(&mut sched, "b");
    let a_probe = sched.add_action(
        ActionSpec::new("a_monitor_0", Task::Monitor)
            .resource(ra)
            .without_flag(ActionFlag::Runnable),
    );
    let b_start = action(&mut sched, rb, "b", Task::Start);
    sched.order_actions(a_probe, b_start, OrderingKind::Probe);

    sched.update_action(b_start).expect("converges");

    assert!(sched.predecessors(b_start)[0].is_disabled());
    assert!(sched.flags(b_start).contains(ActionFlag::Runnable));
}

#[test]
fn clone_start_is_runnable_anywhere_for_ordering() {
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
    let i0_start = sched.add_action(
        ActionSpec::new("web:0_start_0", Task::Start)
            .resource(i0)
            .node(n1)
            .without_flag(ActionFlag::Runnable),
    );
    let i1_start = sched.add_action(
        ActionSpec::new("web:1_start_0", Task::Start)
            .resource(i1)
            .node(n2),
    );

    // Globally runnable, but not on n1.
    let on_n1 = flags_for_ordering(&sched, clone_start, Some(n1));
    assert!(on_n1.contains(ActionFlag::Runnable));

    // The restore is asymmetric: with no runnable instance anywhere, a node
    // query stays unrunnable.
    sched.clear_flag(i1_start, ActionFlag::Runnable);
    sched.clear_flag(i0_start, ActionFlag::Optional);
    let on_n1 = flags_for_ordering(&sched, clone_start, Some(n1));
    assert!(!on_n1.contains(ActionFlag::Runnable));
    assert!(!on_n1.contains(ActionFlag::Optional));
}

#[test]
fn group_start_survives_same_node_filter_via_location() {
    let mut sched = Scheduler::new();
    let n1 = sched.add_node("alpha");
    let group = sched.add_resource(ResourceSpec::new("grp", ResourceVariant::Group));
    let member = sched.add_resource(
        ResourceSpec::new("m1", ResourceVariant::Primitive)
            .parent(group)
            .assigned_node(n1),
    );
    let _m1_start = action(&mut sched, member, "m1", Task::Start);
    // The group's start is unbound; its effective location is the member's.
    let grp_start = sched.add_action(
        ActionSpec::new("grp_start_0", Task::Start)
            .resource(group)
            .without_flag(ActionFlag::Optional),
    );
    let rt = primitive(&mut sched, "t");
    let t_start = sched.add_action(
        ActionSpec::new("t_start_0", Task::Start)
            .resource(rt)
            .node(n1),
    );
    sched.order_actions(
        grp_start,
        t_start,
        OrderingKind::ImpliesThen | OrderingKind::SameNode,
    );

    sched.update_action(t_start).expect("converges");

    // Same node after the fix-up: the edge survives and propagates.
    assert!(!sched.predecessors(t_start)[0].is_disabled());
    assert!(!sched.flags(t_start).contains(ActionFlag::Optional));
}

#[test]
fn same_node_filter_disables_cross_node_edges_for_good() {
    let mut sched = Scheduler::new();
    let n1 = sched.add_node("alpha");
    let n2 = sched.add_node("beta");
    let ra = primitive(&mut sched, "a");
    let rb = primitive(&mut sched, "b");
    let a_start = sched.add_action(
        ActionSpec::new("a_start_0", Task::Start)
            .resource(ra)
            .node(n1)
            .without_flag(ActionFlag::Optional),
    );
    let b_start = sched.add_action(
        ActionSpec::new("b_start_0", Task::Start)
            .resource(rb)
            .node(n2),
    );
    sched.order_actions(
        a_start,
        b_start,
        OrderingKind::ImpliesThen | OrderingKind::SameNode,
    );

    sched.update_action(b_start).expect("converges");

    assert!(sched.predecessors(b_start)[0].is_disabled());
    // The disabled edge carried the implies-then too: nothing propagated.
    assert!(sched.flags(b_start).contains(ActionFlag::Optional));
}

// ============================================================================
// Expansion Through the Driver
// ============================================================================

#[test]
fn collective_ordering_redirects_to_the_completion_event() {
    let mut sched = Scheduler::new();
    let group = sched.add_resource(ResourceSpec::new("grp", ResourceVariant::Group));
    let grp_start = sched.add_action(
        ActionSpec::new("grp_start_0", Task::Start)
            .resource(group)
            .without_flag(ActionFlag::Optional),
    );
    let grp_running = sched.add_action(
        ActionSpec::new("grp_running_0", Task::Running)
            .resource(group)
            .without_flag(ActionFlag::Optional),
    );
    let rb = primitive(&mut sched, "b");
    let b_start = action(&mut sched, rb, "b", Task::Start);
    sched.order_actions(grp_start, b_start, OrderingKind::ImpliesThen);

    sched.update_action(b_start).expect("converges");

    // The edge to the virtual start was retired in favor of grp_running.
    let preds = sched.predecessors(b_start);
    assert_eq!(preds.len(), 2);
    assert!(preds[0].is_disabled());
    assert_eq!(preds[1].peer, grp_running);
    assert!(!preds[1].is_disabled());

    // And the redirected edge propagated required-ness.
    assert!(!sched.flags(b_start).contains(ActionFlag::Optional));
}

#[test]
fn expansion_is_idempotent_through_the_public_surface() {
    let mut sched = Scheduler::new();
    let group = sched.add_resource(ResourceSpec::new("grp", ResourceVariant::Group));
    let grp_start = action(&mut sched, group, "grp", Task::Start);
    let grp_running = action(&mut sched, group, "grp", Task::Running);

    let once = expand_action(&sched, grp_start);
    let twice = expand_action(&sched, once);
    assert_eq!(once, grp_running);
    assert_eq!(once, twice);
}

// ============================================================================
// Cancellation
// ============================================================================

#[test]
fn required_then_cancels_pending_reload() {
    let mut sched = Scheduler::new();
    let ra = sched.add_resource(
        ResourceSpec::new("a", ResourceVariant::Primitive).with_flag(ResourceFlag::Reload),
    );
    let a_reload = sched.add_action(
        ActionSpec::new("a_reload_0", Task::Reload)
            .resource(ra)
            .without_flag(ActionFlag::Optional),
    );
    let a_stop = sched.add_action(
        ActionSpec::new("a_stop_0", Task::Stop)
            .resource(ra)
            .without_flag(ActionFlag::Optional),
    );
    sched.order_actions(a_reload, a_stop, OrderingKind::ThenCancelsFirst);

    sched.update_action(a_stop).expect("converges");

    // The required stop abandoned the reload and cleared the pending flag.
    assert!(sched.flags(a_reload).contains(ActionFlag::Optional));
    assert!(!sched.resource(ra).flags().contains(ResourceFlag::Reload));
}

// ============================================================================
// Fixed-Point Properties
// ============================================================================

#[test]
fn update_is_idempotent_at_the_fixed_point() {
    let mut sched = Scheduler::new();
    let ra = primitive(&mut sched, "a");
    let rb = primitive(&mut sched, "b");
    let rc = primitive(&mut sched, "c");
    let a_start = action(&mut sched, ra, "a", Task::Start);
    let b_start = action(&mut sched, rb, "b", Task::Start);
    let c_start = action(&mut sched, rc, "c", Task::Start);
    sched.order_actions(a_start, b_start, OrderingKind::ImpliesThen);
    sched.order_actions(b_start, c_start, OrderingKind::RunnableLeft);
    sched.clear_flag(a_start, ActionFlag::Optional);
    sched.clear_flag(a_start, ActionFlag::Runnable);

    sched.update_action(b_start).expect("converges");
    sched.update_action(c_start).expect("converges");
    let snapshot: Vec<ActionFlags> = [a_start, b_start, c_start]
        .iter()
        .map(|&a| sched.flags(a))
        .collect();

    sched.update_action(b_start).expect("still converges");
    sched.update_action(c_start).expect("still converges");
    let after: Vec<ActionFlags> = [a_start, b_start, c_start]
        .iter()
        .map(|&a| sched.flags(a))
        .collect();

    assert_eq!(snapshot, after);
}

#[test]
fn optional_is_monotone_across_a_chain() {
    let mut sched = Scheduler::new();
    let mut actions = Vec::new();
    for i in 0..6 {
        let rsc = primitive(&mut sched, &format!("r{i}"));
        actions.push(action(&mut sched, rsc, &format!("r{i}"), Task::Start));
    }
    for pair in actions.windows(2) {
        sched.order_actions(pair[0], pair[1], OrderingKind::ImpliesThen);
    }
    sched.clear_flag(actions[0], ActionFlag::Optional);

    sched.update_action(*actions.last().unwrap()).expect("converges");
    for &a in &actions[1..] {
        sched.update_action(a).expect("converges");
    }

    // Required-ness flooded down; nothing was ever re-made optional.
    for &a in &actions {
        assert!(!sched.flags(a).contains(ActionFlag::Optional));
    }
}

#[test]
fn runnable_loss_floods_runnable_left_chains() {
    let mut sched = Scheduler::new();
    let mut actions = Vec::new();
    for i in 0..5 {
        let rsc = primitive(&mut sched, &format!("r{i}"));
        actions.push(action(&mut sched, rsc, &format!("r{i}"), Task::Start));
    }
    for pair in actions.windows(2) {
        sched.order_actions(pair[0], pair[1], OrderingKind::RunnableLeft);
    }
    sched.clear_flag(actions[0], ActionFlag::Runnable);

    // One update at the head's first dependent reaches the whole chain.
    sched.update_action(actions[1]).expect("converges");

    for &a in &actions[1..] {
        assert!(!sched.flags(a).contains(ActionFlag::Runnable), "chain member still runnable");
    }
}

#[test]
fn runnable_before_never_exceeds_predecessor_count() {
    let mut sched = Scheduler::new();
    let then = sched.add_action(
        ActionSpec::new("gate_running_0", Task::Running).requires_any(3),
    );
    let firsts: Vec<ActionId> = (0..4)
        .map(|i| sched.add_action(ActionSpec::new(format!("f{i}_start_0"), Task::Start)))
        .collect();
    for &first in &firsts {
        sched.order_actions(first, then, OrderingKind::OneOrMore);
    }

    // Repeated updates must not accumulate counts across passes.
    for _ in 0..3 {
        sched.update_action(then).expect("converges");
    }

    let preds = sched.predecessors(then).len() as u32;
    assert!(sched.action(then).runnable_before() <= preds);
    assert_eq!(sched.action(then).runnable_before(), 4);
    assert!(sched.flags(then).contains(ActionFlag::Runnable));
}

#[test]
fn evaluating_a_disabled_edge_is_a_no_op() {
    let mut sched = Scheduler::new();
    let n1 = sched.add_node("alpha");
    let n2 = sched.add_node("beta");
    let ra = primitive(&mut sched, "a");
    let rb = primitive(&mut sched, "b");
    let a_start = sched.add_action(
        ActionSpec::new("a_start_0", Task::Start)
            .resource(ra)
            .node(n1),
    );
    let b_start = sched.add_action(
        ActionSpec::new("b_start_0", Task::Start)
            .resource(rb)
            .node(n2),
    );
    sched.order_actions(
        a_start,
        b_start,
        OrderingKind::ImpliesThen | OrderingKind::RunnableLeft | OrderingKind::SameNode,
    );

    // First pass kills the cross-node edge.
    sched.update_action(b_start).expect("converges");
    assert!(sched.predecessors(b_start)[0].is_disabled());

    // Now make first required and unrunnable; the dead edge must not leak
    // either property into then.
    sched.clear_flag(a_start, ActionFlag::Optional);
    sched.clear_flag(a_start, ActionFlag::Runnable);
    sched.update_action(b_start).expect("converges");

    assert!(sched.flags(b_start).contains(ActionFlag::Optional));
    assert!(sched.flags(b_start).contains(ActionFlag::Runnable));
}
