//! End-to-end engine behavior: rule switches, strategy blending, chain
//! collapse, teardown, and dependency forwarding.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use restyle_transition::{
    Color, Instant, MapRule, PropertyKey, PropertyType, PropertyValue, RuleChain, RuleHandle,
    SchedulerHandle, StepDelta, StrategyCtx, StyleError, Threshold, Timed, TransitionConfig,
    TransitionScheduler, TransitionStrategy,
};

fn scheduler() -> SchedulerHandle {
    Rc::new(RefCell::new(TransitionScheduler::new()))
}

fn advance_and_pump(chain: &mut RuleChain, sched: &SchedulerHandle, dt: u64) {
    sched.borrow_mut().advance(dt);
    chain.pump();
}

fn float_of(chain: &RuleChain, key: &str) -> Option<f32> {
    chain
        .get_property(PropertyType::Float, &PropertyKey::new(key))
        .and_then(|v| v.as_float())
}

#[test]
fn untouched_rule_switches_are_instant() {
    let sched = scheduler();
    let first: RuleHandle = Rc::new(MapRule::new().with("width", 1.0f32));
    let mut chain = RuleChain::new(first, sched.clone());

    chain.transition(Rc::new(MapRule::new().with("width", 2.0f32)));
    assert_eq!(chain.len(), 1);
    assert_eq!(float_of(&chain, "width"), Some(2.0));
    assert!(!sched.borrow().has_pending(chain.id()));
}

#[test]
fn chain_collapses_after_consecutive_transitions() {
    let sched = scheduler();
    let r0: RuleHandle = Rc::new(MapRule::new().with("width", 0.0f32));
    let mut chain = RuleChain::new(r0, sched.clone());

    chain.animate(
        PropertyKey::new("width"),
        PropertyType::Float,
        Box::new(Timed::new(100)),
    );
    chain.transition(Rc::new(MapRule::new().with("width", 100.0f32)));
    chain.transition(Rc::new(MapRule::new().with("width", 7.0f32)));
    assert_eq!(chain.len(), 2);

    advance_and_pump(&mut chain, &sched, 100);

    assert_eq!(chain.len(), 1);
    assert_eq!(float_of(&chain, "width"), Some(7.0));
    assert!(!chain.is_animated(&PropertyKey::new("width")));
}

#[test]
fn instant_hands_over_after_one_step() {
    let sched = scheduler();
    let red: RuleHandle = Rc::new(MapRule::new().with("color", Color::RED));
    let mut chain = RuleChain::new(red, sched.clone());

    chain.animate(
        PropertyKey::new("color"),
        PropertyType::Color,
        Box::new(Instant::new()),
    );
    chain.transition(Rc::new(MapRule::new().with("color", Color::BLUE)));
    assert_eq!(chain.len(), 2);

    chain.pump();
    assert_eq!(chain.len(), 1);
    assert_eq!(
        chain.get_property(PropertyType::Color, &PropertyKey::new("color")),
        Some(PropertyValue::Color(Color::BLUE))
    );
}

#[test]
fn threshold_jumps_exactly_at_half_progress() {
    let sched = scheduler();
    let key = PropertyKey::parse("border.style");
    let solid: RuleHandle = Rc::new(MapRule::new().with("border.style", "solid"));
    let mut chain = RuleChain::new(solid, sched.clone());

    chain.animate(key.clone(), PropertyType::Str, Box::new(Threshold::default()));
    chain.transition(Rc::new(MapRule::new().with("border.style", "dashed")));

    // Default duration 500: progress 0.49 keeps the source.
    advance_and_pump(&mut chain, &sched, 245);
    assert_eq!(
        chain.get_property(PropertyType::Str, &key),
        Some(PropertyValue::Str("solid".into()))
    );

    // Progress 0.5 returns the target, exactly at the boundary.
    advance_and_pump(&mut chain, &sched, 5);
    assert_eq!(
        chain.get_property(PropertyType::Str, &key),
        Some(PropertyValue::Str("dashed".into()))
    );

    advance_and_pump(&mut chain, &sched, 250);
    assert_eq!(chain.len(), 1);
    assert_eq!(
        chain.get_property(PropertyType::Str, &key),
        Some(PropertyValue::Str("dashed".into()))
    );
}

#[test]
fn timed_blends_and_finishes_on_clamped_progress() {
    let sched = scheduler();
    let r0: RuleHandle = Rc::new(MapRule::new().with("width", 0.0f32));
    let mut chain = RuleChain::new(r0, sched.clone());

    chain.animate(
        PropertyKey::new("width"),
        PropertyType::Float,
        Box::new(Timed::new(100)),
    );
    chain.transition(Rc::new(MapRule::new().with("width", 100.0f32)));

    advance_and_pump(&mut chain, &sched, 50);
    assert_eq!(float_of(&chain, "width"), Some(50.0));
    assert_eq!(chain.len(), 2);

    // Cumulative 110 clamps to progress 1.0 and the transition finishes.
    advance_and_pump(&mut chain, &sched, 60);
    assert_eq!(float_of(&chain, "width"), Some(100.0));
    assert_eq!(chain.len(), 1);
    assert!(!sched.borrow().has_pending(chain.id()));
}

#[test]
fn timed_color_scenario_blends_red_to_blue() {
    let sched = scheduler();
    let key = PropertyKey::new("color");
    let red: RuleHandle = Rc::new(MapRule::new().with("color", Color::RED));
    let mut chain = RuleChain::new(red, sched.clone());

    chain.animate(key.clone(), PropertyType::Color, Box::new(Timed::new(100)));
    chain.transition(Rc::new(MapRule::new().with("color", Color::BLUE)));

    advance_and_pump(&mut chain, &sched, 50);
    let mid = chain
        .get_property(PropertyType::Color, &key)
        .and_then(|v| v.as_color())
        .unwrap();
    assert!((mid.r - 0.5).abs() < 1e-6);
    assert!((mid.b - 0.5).abs() < 1e-6);
    assert!(mid.g.abs() < 1e-6);

    advance_and_pump(&mut chain, &sched, 60);
    assert_eq!(chain.len(), 1);
    assert_eq!(
        chain.get_property(PropertyType::Color, &key),
        Some(PropertyValue::Color(Color::BLUE))
    );
}

#[test]
fn destroy_mid_animation_resolves_through_roots_only() {
    let sched = scheduler();
    let r0: RuleHandle = Rc::new(MapRule::new().with("width", 0.0f32));
    let mut chain = RuleChain::new(r0, sched.clone());

    chain.animate(
        PropertyKey::new("width"),
        PropertyType::Float,
        Box::new(Timed::new(100)),
    );
    chain.transition(Rc::new(MapRule::new().with("width", 100.0f32)));
    advance_and_pump(&mut chain, &sched, 50);
    assert_eq!(float_of(&chain, "width"), Some(50.0));

    let events = Rc::new(RefCell::new(0u32));
    let seen = events.clone();
    chain.on_change(move |_key| *seen.borrow_mut() += 1);

    chain.destroy();
    assert_eq!(chain.len(), 1);
    assert_eq!(float_of(&chain, "width"), Some(100.0));
    assert!(!sched.borrow().has_pending(chain.id()));

    // Whatever was still scheduled has no observable effect.
    advance_and_pump(&mut chain, &sched, 100);
    assert_eq!(float_of(&chain, "width"), Some(100.0));
    assert_eq!(chain.len(), 1);
    assert_eq!(*events.borrow(), 0);
}

// A scripted strategy driving the dependency surface from test code.
enum ProbeCmd {
    Add(&'static str, &'static str),
    Remove(&'static str),
}

struct Probe {
    cmds: Rc<RefCell<VecDeque<ProbeCmd>>>,
    results: Rc<RefCell<Vec<Result<(), StyleError>>>>,
}

impl Probe {
    fn new() -> (
        Self,
        Rc<RefCell<VecDeque<ProbeCmd>>>,
        Rc<RefCell<Vec<Result<(), StyleError>>>>,
    ) {
        let cmds = Rc::new(RefCell::new(VecDeque::new()));
        let results = Rc::new(RefCell::new(Vec::new()));
        (
            Self {
                cmds: cmds.clone(),
                results: results.clone(),
            },
            cmds,
            results,
        )
    }

    fn drain(&mut self, ctx: &mut StrategyCtx<'_>) {
        loop {
            let cmd = self.cmds.borrow_mut().pop_front();
            match cmd {
                Some(ProbeCmd::Add(sub, remote)) => {
                    let result = ctx
                        .add_source_dependency(PropertyKey::parse(sub), PropertyKey::parse(remote));
                    self.results.borrow_mut().push(result);
                }
                Some(ProbeCmd::Remove(sub)) => {
                    ctx.remove_source_dependency(&PropertyKey::parse(sub));
                }
                None => break,
            }
        }
    }
}

impl TransitionStrategy for Probe {
    fn init(&mut self, ctx: &mut StrategyCtx<'_>) {
        self.drain(ctx);
        ctx.step();
    }

    fn retarget(&mut self, ctx: &mut StrategyCtx<'_>) {
        ctx.step();
    }

    fn step(&mut self, _delta: StepDelta, ctx: &mut StrategyCtx<'_>) {
        self.drain(ctx);
        ctx.step();
    }
}

#[test]
fn dependency_round_trip_exposes_and_hides() {
    let sched = scheduler();
    let r0: RuleHandle = Rc::new(MapRule::new().with("panel.x", 42i64));
    let mut chain = RuleChain::new(r0, sched.clone());

    let (probe, cmds, results) = Probe::new();
    cmds.borrow_mut().push_back(ProbeCmd::Add("x", "panel.x"));
    chain.animate(PropertyKey::new("size"), PropertyType::Int, Box::new(probe));

    let x = PropertyKey::new("x");
    assert_eq!(
        chain.get_property(PropertyType::Int, &x),
        Some(PropertyValue::Int(42))
    );
    assert!(chain.is_input(&x));
    assert!(!chain.is_input(&PropertyKey::new("y")));

    cmds.borrow_mut().push_back(ProbeCmd::Remove("x"));
    chain.pump();
    assert_eq!(chain.get_property(PropertyType::Int, &x), None);
    assert!(!chain.is_input(&x));

    // Re-adding under the same key after removal leaves no residue.
    cmds.borrow_mut().push_back(ProbeCmd::Add("x", "panel.x"));
    chain.pump();
    assert_eq!(
        chain.get_property(PropertyType::Int, &x),
        Some(PropertyValue::Int(42))
    );
    assert_eq!(results.borrow().len(), 2);
    assert!(results.borrow().iter().all(|r| r.is_ok()));
}

#[test]
fn duplicate_dependency_key_is_rejected() {
    let sched = scheduler();
    let r0: RuleHandle = Rc::new(MapRule::new().with("panel.x", 42i64));
    let mut chain = RuleChain::new(r0, sched);

    let (probe, cmds, results) = Probe::new();
    cmds.borrow_mut().push_back(ProbeCmd::Add("x", "panel.x"));
    cmds.borrow_mut().push_back(ProbeCmd::Add("x", "panel.x"));
    chain.animate(PropertyKey::new("size"), PropertyType::Int, Box::new(probe));

    let results = results.borrow();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert_eq!(
        results[1],
        Err(StyleError::DuplicateDependency {
            key: PropertyKey::new("x"),
        })
    );
}

#[test]
fn first_registered_dependency_wins_conflicts() {
    let sched = scheduler();
    let r0: RuleHandle = Rc::new(MapRule::new().with("ax", 1i64).with("bx", 2i64));
    let mut chain = RuleChain::new(r0, sched);

    let (probe_a, cmds_a, _) = Probe::new();
    cmds_a.borrow_mut().push_back(ProbeCmd::Add("x", "ax"));
    chain.animate(PropertyKey::new("a"), PropertyType::Int, Box::new(probe_a));

    let (probe_b, cmds_b, _) = Probe::new();
    cmds_b.borrow_mut().push_back(ProbeCmd::Add("x", "bx"));
    chain.animate(PropertyKey::new("b"), PropertyType::Int, Box::new(probe_b));

    // Both transitions forward `x`; the first registered one wins.
    let x = PropertyKey::new("x");
    assert_eq!(
        chain.get_property(PropertyType::Int, &x),
        Some(PropertyValue::Int(1))
    );

    // Dropping the winner uncovers the other registration.
    cmds_a.borrow_mut().push_back(ProbeCmd::Remove("x"));
    chain.pump();
    assert_eq!(
        chain.get_property(PropertyType::Int, &x),
        Some(PropertyValue::Int(2))
    );
}

#[test]
fn instant_mirrors_a_live_source_rule() {
    let sched = scheduler();
    let r0 = Rc::new(MapRule::new().with("color", Color::RED));
    let handle: RuleHandle = r0.clone();
    let mut chain = RuleChain::new(handle, sched);

    let key = PropertyKey::new("color");
    chain.animate(key.clone(), PropertyType::Color, Box::new(Instant::new()));
    assert_eq!(
        chain.get_property(PropertyType::Color, &key),
        Some(PropertyValue::Color(Color::RED))
    );

    // The underlying rule is live; the mirror follows on the forced step.
    r0.set_property("color", Color::GREEN);
    chain.pump();
    assert_eq!(
        chain.get_property(PropertyType::Color, &key),
        Some(PropertyValue::Color(Color::GREEN))
    );
}

#[test]
fn configured_registry_drives_per_type_behavior() {
    let config = TransitionConfig::from_toml(
        r#"
default = { kind = "instant" }

[types]
float = { kind = "timed", duration = 100 }
"#,
    )
    .unwrap();
    let registry = config.build_registry().unwrap();

    let sched = scheduler();
    let r0: RuleHandle = Rc::new(
        MapRule::new()
            .with("width", 0.0f32)
            .with("style", "solid"),
    );
    let mut chain = RuleChain::new(r0, sched.clone());

    chain.animate_default(PropertyKey::new("width"), PropertyType::Float, &registry);
    chain.animate_default(PropertyKey::new("style"), PropertyType::Str, &registry);
    chain.transition(Rc::new(
        MapRule::new()
            .with("width", 100.0f32)
            .with("style", "dashed"),
    ));

    advance_and_pump(&mut chain, &sched, 50);
    // Instant default snapped the string; the configured timed float is
    // halfway through.
    assert_eq!(
        chain.get_property(PropertyType::Str, &PropertyKey::new("style")),
        Some(PropertyValue::Str("dashed".into()))
    );
    assert_eq!(float_of(&chain, "width"), Some(50.0));

    advance_and_pump(&mut chain, &sched, 50);
    assert_eq!(chain.len(), 1);
    assert_eq!(float_of(&chain, "width"), Some(100.0));
}

#[test]
fn change_notifications_follow_value_changes_in_order() {
    let sched = scheduler();
    let r0: RuleHandle = Rc::new(MapRule::new().with("width", 0.0f32));
    let mut chain = RuleChain::new(r0, sched.clone());

    let events: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let seen = events.clone();
    chain.on_change(move |key| seen.borrow_mut().push(key.to_string()));

    chain.animate(
        PropertyKey::new("width"),
        PropertyType::Float,
        Box::new(Timed::new(100)),
    );
    chain.transition(Rc::new(MapRule::new().with("width", 100.0f32)));
    advance_and_pump(&mut chain, &sched, 50);
    advance_and_pump(&mut chain, &sched, 60);

    let events = events.borrow();
    let width_events: Vec<_> = events.iter().filter(|k| *k == "width").collect();
    // Initial mirror, halfway blend, final value, and the re-resolve
    // notification when the finished override is removed.
    assert_eq!(width_events.len(), 4);
    assert_eq!(events.last().map(String::as_str), Some("width"));
}

#[test]
fn chains_sharing_a_scheduler_pump_independently() {
    let sched = scheduler();
    let mut left = RuleChain::new(
        Rc::new(MapRule::new().with("width", 0.0f32)) as RuleHandle,
        sched.clone(),
    );
    let mut right = RuleChain::new(
        Rc::new(MapRule::new().with("width", 0.0f32)) as RuleHandle,
        sched.clone(),
    );

    for chain in [&mut left, &mut right] {
        chain.animate(
            PropertyKey::new("width"),
            PropertyType::Float,
            Box::new(Timed::new(100)),
        );
        chain.transition(Rc::new(MapRule::new().with("width", 100.0f32)));
    }

    sched.borrow_mut().advance(50);
    left.pump();
    assert_eq!(float_of(&left, "width"), Some(50.0));
    // The right chain has not pumped yet; its override still holds the
    // starting value and its work is still queued.
    assert_eq!(float_of(&right, "width"), Some(0.0));
    assert!(sched.borrow().has_pending(right.id()));

    right.pump();
    assert_eq!(float_of(&right, "width"), Some(50.0));
}

#[test]
#[should_panic(expected = "type mismatch")]
fn reading_an_override_with_the_wrong_type_is_fatal() {
    let sched = scheduler();
    let r0: RuleHandle = Rc::new(MapRule::new().with("width", 0.0f32));
    let mut chain = RuleChain::new(r0, sched);

    chain.animate(
        PropertyKey::new("width"),
        PropertyType::Float,
        Box::new(Timed::new(100)),
    );
    chain.get_property(PropertyType::Int, &PropertyKey::new("width"));
}

#[test]
fn timed_exposes_its_blend_endpoints() {
    let sched = scheduler();
    let key = PropertyKey::new("width");
    let r0: RuleHandle = Rc::new(MapRule::new().with("width", 0.0f32));
    let mut chain = RuleChain::new(r0, sched.clone());

    let overlay = chain.animate(key.clone(), PropertyType::Float, Box::new(Timed::new(100)));
    chain.transition(Rc::new(MapRule::new().with("width", 100.0f32)));
    advance_and_pump(&mut chain, &sched, 50);

    assert!(chain.is_animated(&key));
    assert_eq!(float_of(&chain, "width"), Some(50.0));

    // The endpoints are readable on the overlay that owns the transition,
    // and the tail flags them as inputs to preserve across the switch.
    let from = PropertyKey::parse("width.from");
    let to = PropertyKey::parse("width.to");
    assert_eq!(
        overlay.borrow().get_property(PropertyType::Float, &from),
        Some(PropertyValue::Float(0.0))
    );
    assert_eq!(
        overlay.borrow().get_property(PropertyType::Float, &to),
        Some(PropertyValue::Float(100.0))
    );
    assert!(chain.is_input(&from));
    assert!(overlay.borrow().property_keys().contains(&from));
}

#[test]
fn animate_may_repeat_before_the_next_transition() {
    let sched = scheduler();
    let r0: RuleHandle = Rc::new(
        MapRule::new()
            .with("width", 0.0f32)
            .with("height", 10.0f32),
    );
    let mut chain = RuleChain::new(r0, sched.clone());

    chain.animate(
        PropertyKey::new("width"),
        PropertyType::Float,
        Box::new(Timed::new(100)),
    );
    chain.animate(
        PropertyKey::new("height"),
        PropertyType::Float,
        Box::new(Timed::new(200)),
    );
    chain.transition(Rc::new(
        MapRule::new()
            .with("width", 100.0f32)
            .with("height", 20.0f32),
    ));

    advance_and_pump(&mut chain, &sched, 100);
    // Width is done; height is halfway, so the old overlay still holds.
    assert_eq!(chain.len(), 2);
    assert_eq!(float_of(&chain, "width"), Some(100.0));
    assert_eq!(float_of(&chain, "height"), Some(15.0));

    advance_and_pump(&mut chain, &sched, 100);
    assert_eq!(chain.len(), 1);
    assert_eq!(float_of(&chain, "height"), Some(20.0));
}
