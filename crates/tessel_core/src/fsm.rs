//! Finite state machines for widget interaction
//!
//! A [`MachineDefinition`] is an immutable transition table: for every state,
//! which event kinds it reacts to, which guarded transitions those kinds map
//! to, and which actions run on the way. A [`Machine`] is one live instance of
//! a definition, owned by exactly one widget. Its context is only ever
//! mutated from inside [`Machine::send`].
//!
//! # Semantics
//!
//! - An event with no entry for the current state is a no-op.
//! - Candidate transitions for one event are tried in declaration order; the
//!   first one whose guard passes (or that has no guard) is taken.
//! - Taking a transition with a target runs the old state's exit actions,
//!   then the transition's actions, then the new state's entry actions.
//!   Actions mutate the context in place, so each one sees the updates of the
//!   ones before it.
//! - A transition without a target is internal: only its own actions run and
//!   the state's delayed events are not re-armed.
//! - `after(delay, event)` sends `event` to the machine if the state is still
//!   active when the delay elapses. Leaving the state cancels the timer and
//!   re-entering arms a fresh one.
//! - Guards and actions that panic are not caught.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use tessel_core::fsm::{Machine, MachineDefinition, MachineEvent, Transition};
//! use tessel_core::timer::SystemClock;
//!
//! #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
//! enum Light { Off, On }
//!
//! #[derive(Clone, Debug)]
//! struct Toggle;
//!
//! impl MachineEvent for Toggle {
//!     type Kind = ();
//!     fn kind(&self) {}
//! }
//!
//! type Step = Transition<Light, u32, Toggle>;
//!
//! let definition = MachineDefinition::<Light, u32, Toggle>::builder(Light::Off)
//!     .state(Light::Off, |s| s.on((), Step::to(Light::On).action(|n, _| *n += 1)))
//!     .state(Light::On, |s| s.on((), Step::to(Light::Off)))
//!     .build()
//!     .unwrap();
//!
//! let mut machine = Machine::new(Rc::new(definition), 0, Rc::new(SystemClock));
//! machine.send(Toggle);
//! assert_eq!(machine.state(), Light::On);
//! assert_eq!(*machine.context(), 1);
//! ```

use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;
use std::time::{Duration, Instant};

use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;

use crate::error::MachineError;
use crate::timer::{SharedClock, TimerId, TimerQueue};

/// Events understood by a machine
///
/// The kind is the key of the transition table; the event itself carries the
/// payload handed to guards and actions.
pub trait MachineEvent: Debug {
    type Kind: Copy + Eq + Hash + Debug;

    fn kind(&self) -> Self::Kind;
}

/// Predicate gating a transition
pub type Guard<C, E> = Rc<dyn Fn(&C, &E) -> bool>;

/// Side effect or context update run during a transition
pub type Action<C, E> = Rc<dyn Fn(&mut C, &E)>;

/// One candidate transition for an event
pub struct Transition<S, C, E> {
    target: Option<S>,
    guard: Option<Guard<C, E>>,
    actions: SmallVec<[Action<C, E>; 2]>,
}

impl<S: Copy, C, E> Transition<S, C, E> {
    /// Transition into `target`, running exit and entry actions
    pub fn to(target: S) -> Self {
        Self {
            target: Some(target),
            guard: None,
            actions: SmallVec::new(),
        }
    }

    /// Stay in the current state and only run this transition's actions
    pub fn internal() -> Self {
        Self {
            target: None,
            guard: None,
            actions: SmallVec::new(),
        }
    }

    pub fn guard(mut self, guard: impl Fn(&C, &E) -> bool + 'static) -> Self {
        self.guard = Some(Rc::new(guard));
        self
    }

    pub fn action(mut self, action: impl Fn(&mut C, &E) + 'static) -> Self {
        self.actions.push(Rc::new(action));
        self
    }

    /// Append an action that is shared between several transitions
    pub fn run(mut self, action: &Action<C, E>) -> Self {
        self.actions.push(Rc::clone(action));
        self
    }

    pub fn target(&self) -> Option<S> {
        self.target
    }

    pub fn has_guard(&self) -> bool {
        self.guard.is_some()
    }

    fn passes(&self, context: &C, event: &E) -> bool {
        self.guard.as_ref().map_or(true, |guard| guard(context, event))
    }
}

struct Delayed<E> {
    delay: Duration,
    event: E,
}

/// Everything a single state declares
pub struct StateNode<S, C, E: MachineEvent> {
    entry: Vec<Action<C, E>>,
    exit: Vec<Action<C, E>>,
    on: FxHashMap<E::Kind, SmallVec<[Transition<S, C, E>; 1]>>,
    after: SmallVec<[Delayed<E>; 1]>,
}

impl<S: Copy, C, E: MachineEvent> StateNode<S, C, E> {
    fn new() -> Self {
        Self {
            entry: Vec::new(),
            exit: Vec::new(),
            on: FxHashMap::default(),
            after: SmallVec::new(),
        }
    }

    /// Add a candidate transition for an event kind
    ///
    /// Candidates are tried in the order they are added.
    pub fn on(mut self, kind: E::Kind, transition: Transition<S, C, E>) -> Self {
        self.on.entry(kind).or_default().push(transition);
        self
    }

    pub fn entry(mut self, action: impl Fn(&mut C, &E) + 'static) -> Self {
        self.entry.push(Rc::new(action));
        self
    }

    pub fn exit(mut self, action: impl Fn(&mut C, &E) + 'static) -> Self {
        self.exit.push(Rc::new(action));
        self
    }

    /// Send `event` to the machine if this state is still active after `delay`
    pub fn after(mut self, delay: Duration, event: E) -> Self {
        self.after.push(Delayed { delay, event });
        self
    }

    /// Number of candidate transitions declared for an event kind
    pub fn transition_count(&self, kind: E::Kind) -> usize {
        self.on.get(&kind).map_or(0, |candidates| candidates.len())
    }
}

/// Immutable transition table
pub struct MachineDefinition<S, C, E: MachineEvent> {
    initial: S,
    states: FxHashMap<S, StateNode<S, C, E>>,
}

impl<S, C, E> MachineDefinition<S, C, E>
where
    S: Copy + Eq + Hash + Debug,
    E: MachineEvent,
{
    pub fn builder(initial: S) -> MachineBuilder<S, C, E> {
        MachineBuilder {
            initial,
            states: Vec::new(),
        }
    }

    pub fn initial(&self) -> S {
        self.initial
    }

    pub fn states(&self) -> impl Iterator<Item = S> + '_ {
        self.states.keys().copied()
    }

    /// Node for a state; every reachable state has one once `build` succeeds
    pub fn node(&self, state: S) -> &StateNode<S, C, E> {
        &self.states[&state]
    }

    /// Whether `state` reacts to `kind` at all
    pub fn handles(&self, state: S, kind: E::Kind) -> bool {
        self.states
            .get(&state)
            .is_some_and(|node| node.on.contains_key(&kind))
    }
}

/// Builder for [`MachineDefinition`]
pub struct MachineBuilder<S, C, E: MachineEvent> {
    initial: S,
    states: Vec<(S, StateNode<S, C, E>)>,
}

impl<S, C, E> MachineBuilder<S, C, E>
where
    S: Copy + Eq + Hash + Debug,
    E: MachineEvent,
{
    /// Declare a state and configure its node
    pub fn state(
        mut self,
        state: S,
        configure: impl FnOnce(StateNode<S, C, E>) -> StateNode<S, C, E>,
    ) -> Self {
        self.states.push((state, configure(StateNode::new())));
        self
    }

    /// Validate and freeze the table
    ///
    /// Rejects duplicate states, an undeclared initial state, transitions
    /// into undeclared states and delayed events the scheduling state cannot
    /// handle.
    pub fn build(self) -> Result<MachineDefinition<S, C, E>, MachineError> {
        let mut declared = FxHashSet::default();
        for (state, _) in &self.states {
            if !declared.insert(*state) {
                return Err(MachineError::DuplicateState(format!("{state:?}")));
            }
        }

        if !declared.contains(&self.initial) {
            return Err(MachineError::UndefinedInitialState(format!(
                "{:?}",
                self.initial
            )));
        }

        for (state, node) in &self.states {
            for (kind, candidates) in &node.on {
                for target in candidates.iter().filter_map(|t| t.target) {
                    if !declared.contains(&target) {
                        return Err(MachineError::UndefinedTarget {
                            from: format!("{state:?}"),
                            event: format!("{kind:?}"),
                            target: format!("{target:?}"),
                        });
                    }
                }
            }
            for delayed in &node.after {
                let kind = delayed.event.kind();
                if !node.on.contains_key(&kind) {
                    return Err(MachineError::UnhandledDelayedEvent {
                        state: format!("{state:?}"),
                        event: format!("{kind:?}"),
                    });
                }
            }
        }

        Ok(MachineDefinition {
            initial: self.initial,
            states: self.states.into_iter().collect(),
        })
    }
}

/// Result of one [`Machine::send`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transitioned<S> {
    pub previous: S,
    pub state: S,
    /// A transition was taken (false for unmatched events and failed guards)
    pub handled: bool,
    /// The state or the context differs from before the send
    pub changed: bool,
}

impl<S: Copy + PartialEq> Transitioned<S> {
    fn unhandled(state: S) -> Self {
        Self {
            previous: state,
            state,
            handled: false,
            changed: false,
        }
    }

    /// Whether this send moved the machine into `state` from elsewhere
    pub fn entered(&self, state: S) -> bool {
        self.state == state && self.previous != state
    }

    /// Whether this send moved the machine out of `state`
    pub fn exited(&self, state: S) -> bool {
        self.previous == state && self.state != state
    }
}

new_key_type! {
    /// Handle returned by [`Machine::subscribe`]
    pub struct SubscriptionId;
}

/// Change listener, called synchronously after every changing send
pub type Listener<S, C> = Box<dyn FnMut(&Transitioned<S>, &C)>;

struct ArmedDelay<S> {
    state: S,
    slot: usize,
}

/// A live machine instance
pub struct Machine<S, C, E: MachineEvent> {
    definition: Rc<MachineDefinition<S, C, E>>,
    state: S,
    context: C,
    clock: SharedClock,
    timers: TimerQueue<ArmedDelay<S>>,
    armed: SmallVec<[TimerId; 2]>,
    listeners: SlotMap<SubscriptionId, Listener<S, C>>,
    stopped: bool,
}

impl<S, C, E> Machine<S, C, E>
where
    S: Copy + Eq + Hash + Debug,
    C: Clone + PartialEq,
    E: MachineEvent + Clone,
{
    /// Start an instance in the definition's initial state
    ///
    /// The context is seeded by the caller. Entry actions of the initial state
    /// do not run (there is no triggering event) but its delayed events are
    /// armed.
    pub fn new(definition: Rc<MachineDefinition<S, C, E>>, context: C, clock: SharedClock) -> Self {
        let state = definition.initial;
        let mut machine = Self {
            definition,
            state,
            context,
            clock,
            timers: TimerQueue::new(),
            armed: SmallVec::new(),
            listeners: SlotMap::with_key(),
            stopped: false,
        };
        machine.arm_delays();
        machine
    }

    pub fn state(&self) -> S {
        self.state
    }

    pub fn matches(&self, state: S) -> bool {
        self.state == state
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn definition(&self) -> &Rc<MachineDefinition<S, C, E>> {
        &self.definition
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Process one event to completion
    pub fn send(&mut self, event: E) -> Transitioned<S> {
        let previous = self.state;
        if self.stopped {
            tracing::warn!(?event, "event sent to a stopped machine was ignored");
            return Transitioned::unhandled(previous);
        }

        let definition = Rc::clone(&self.definition);
        let node = definition.node(previous);
        let kind = event.kind();

        let Some(transition) = node.on.get(&kind).and_then(|candidates| {
            candidates
                .iter()
                .find(|candidate| candidate.passes(&self.context, &event))
        }) else {
            tracing::debug!(state = ?previous, event = ?kind, "event not handled in current state");
            return Transitioned::unhandled(previous);
        };

        let before = self.context.clone();
        match transition.target {
            Some(target) => {
                self.disarm_delays();
                for action in &node.exit {
                    action(&mut self.context, &event);
                }
                for action in &transition.actions {
                    action(&mut self.context, &event);
                }
                self.state = target;
                for action in &definition.node(target).entry {
                    action(&mut self.context, &event);
                }
                self.arm_delays();
            }
            None => {
                for action in &transition.actions {
                    action(&mut self.context, &event);
                }
            }
        }

        let outcome = Transitioned {
            previous,
            state: self.state,
            handled: true,
            changed: previous != self.state || before != self.context,
        };
        tracing::trace!(from = ?previous, to = ?self.state, event = ?kind, changed = outcome.changed, "transition");

        if outcome.changed {
            for listener in self.listeners.values_mut() {
                listener(&outcome, &self.context);
            }
        }
        outcome
    }

    /// Fire delayed events that are due, returns how many fired
    pub fn poll(&mut self) -> usize {
        if self.stopped {
            return 0;
        }
        let due = self.timers.take_due(self.clock.now());
        let mut fired = 0;
        for (id, delay) in due {
            // A delayed transition earlier in this batch may have left the state
            let Some(position) = self.armed.iter().position(|armed| *armed == id) else {
                continue;
            };
            self.armed.swap_remove(position);
            if delay.state != self.state {
                continue;
            }
            let event = self.definition.node(delay.state).after[delay.slot]
                .event
                .clone();
            self.send(event);
            fired += 1;
        }
        fired
    }

    /// When the next delayed event becomes due
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Number of armed delayed events
    pub fn pending_delays(&self) -> usize {
        self.armed.len()
    }

    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&Transitioned<S>, &C) + 'static,
    ) -> SubscriptionId {
        self.listeners.insert(Box::new(listener))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.remove(id).is_some()
    }

    /// Tear the instance down
    ///
    /// Cancels every timer and drops every listener. Later sends are ignored.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.timers.clear();
        self.armed.clear();
        self.listeners.clear();
        self.stopped = true;
        tracing::trace!(state = ?self.state, "machine stopped");
    }

    fn arm_delays(&mut self) {
        let now = self.clock.now();
        let state = self.state;
        for (slot, delayed) in self.definition.node(state).after.iter().enumerate() {
            let id = self
                .timers
                .arm(now + delayed.delay, ArmedDelay { state, slot });
            self.armed.push(id);
        }
    }

    fn disarm_delays(&mut self) {
        for id in self.armed.drain(..) {
            self.timers.cancel(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::ManualClock;
    use std::cell::RefCell;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    enum Phase {
        Idle,
        Active,
        Done,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    enum Kind {
        Go,
        Poke,
        Timeout,
    }

    #[derive(Clone, Debug, PartialEq)]
    enum Ev {
        Go(u32),
        Poke,
        Timeout,
    }

    impl MachineEvent for Ev {
        type Kind = Kind;

        fn kind(&self) -> Kind {
            match self {
                Ev::Go(_) => Kind::Go,
                Ev::Poke => Kind::Poke,
                Ev::Timeout => Kind::Timeout,
            }
        }
    }

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Log {
        steps: Vec<&'static str>,
        value: u32,
    }

    type Def = MachineDefinition<Phase, Log, Ev>;
    type Tr = Transition<Phase, Log, Ev>;

    fn machine(definition: Def, clock: Rc<ManualClock>) -> Machine<Phase, Log, Ev> {
        Machine::new(Rc::new(definition), Log::default(), clock)
    }

    #[test]
    fn test_action_order_exit_transition_entry() {
        let definition = Def::builder(Phase::Idle)
            .state(Phase::Idle, |s| {
                s.exit(|c, _| c.steps.push("exit idle")).on(
                    Kind::Go,
                    Tr::to(Phase::Active)
                        .action(|c, _| c.steps.push("first"))
                        .action(|c, _| {
                            // Later actions see earlier updates
                            let seen = if c.steps.last() == Some(&"first") {
                                "second saw first"
                            } else {
                                "second"
                            };
                            c.steps.push(seen);
                        }),
                )
            })
            .state(Phase::Active, |s| s.entry(|c, _| c.steps.push("enter active")))
            .build()
            .unwrap();

        let mut m = machine(definition, ManualClock::shared());
        let outcome = m.send(Ev::Go(1));

        assert!(outcome.handled && outcome.changed);
        assert!(outcome.entered(Phase::Active));
        assert_eq!(
            m.context().steps,
            vec!["exit idle", "first", "second saw first", "enter active"]
        );
    }

    #[test]
    fn test_first_passing_guard_wins() {
        let definition = Def::builder(Phase::Idle)
            .state(Phase::Idle, |s| {
                s.on(
                    Kind::Go,
                    Tr::to(Phase::Done)
                        .guard(|_, _| false)
                        .action(|c, _| c.steps.push("rejected")),
                )
                .on(
                    Kind::Go,
                    Tr::to(Phase::Active)
                        .guard(|_, _| true)
                        .action(|c, _| c.steps.push("accepted")),
                )
                .on(
                    Kind::Go,
                    Tr::to(Phase::Done).action(|c, _| c.steps.push("fallback")),
                )
            })
            .state(Phase::Active, |s| s)
            .state(Phase::Done, |s| s)
            .build()
            .unwrap();

        let mut m = machine(definition, ManualClock::shared());
        m.send(Ev::Go(0));
        assert_eq!(m.state(), Phase::Active);
        assert_eq!(m.context().steps, vec!["accepted"]);
    }

    #[test]
    fn test_guard_reads_event_payload() {
        let definition = Def::builder(Phase::Idle)
            .state(Phase::Idle, |s| {
                s.on(
                    Kind::Go,
                    Tr::to(Phase::Active)
                        .guard(|_, e| matches!(e, Ev::Go(n) if *n > 10))
                        .action(|c, e| {
                            if let Ev::Go(n) = e {
                                c.value = *n;
                            }
                        }),
                )
            })
            .state(Phase::Active, |s| s)
            .build()
            .unwrap();

        let mut m = machine(definition, ManualClock::shared());
        assert!(!m.send(Ev::Go(3)).handled);
        assert_eq!(m.state(), Phase::Idle);
        m.send(Ev::Go(42));
        assert_eq!(m.context().value, 42);
    }

    #[test]
    fn test_unknown_event_is_a_no_op() {
        let definition = Def::builder(Phase::Idle)
            .state(Phase::Idle, |s| s)
            .build()
            .unwrap();
        let mut m = machine(definition, ManualClock::shared());

        let outcome = m.send(Ev::Poke);
        assert!(!outcome.handled);
        assert!(!outcome.changed);
        assert_eq!(m.state(), Phase::Idle);
    }

    #[test]
    fn test_internal_transition_skips_entry_and_exit() {
        let definition = Def::builder(Phase::Idle)
            .state(Phase::Idle, |s| {
                s.entry(|c, _| c.steps.push("entry"))
                    .exit(|c, _| c.steps.push("exit"))
                    .on(Kind::Poke, Tr::internal().action(|c, _| c.value += 1))
            })
            .build()
            .unwrap();

        let mut m = machine(definition, ManualClock::shared());
        m.send(Ev::Poke);
        m.send(Ev::Poke);
        assert_eq!(m.context().value, 2);
        assert!(m.context().steps.is_empty());
    }

    #[test]
    fn test_undefined_target_rejected_at_build() {
        let result = Def::builder(Phase::Idle)
            .state(Phase::Idle, |s| s.on(Kind::Go, Tr::to(Phase::Done)))
            .build();

        assert!(matches!(
            result,
            Err(MachineError::UndefinedTarget { ref target, .. }) if target == "Done"
        ));
    }

    #[test]
    fn test_malformed_definitions_rejected() {
        let missing_initial = Def::builder(Phase::Idle).state(Phase::Active, |s| s).build();
        assert!(matches!(
            missing_initial,
            Err(MachineError::UndefinedInitialState(_))
        ));

        let duplicate = Def::builder(Phase::Idle)
            .state(Phase::Idle, |s| s)
            .state(Phase::Idle, |s| s)
            .build();
        assert!(matches!(duplicate, Err(MachineError::DuplicateState(_))));

        let unhandled_delay = Def::builder(Phase::Idle)
            .state(Phase::Idle, |s| s.after(Duration::from_millis(10), Ev::Timeout))
            .build();
        assert!(matches!(
            unhandled_delay,
            Err(MachineError::UnhandledDelayedEvent { .. })
        ));
    }

    fn delayed_definition() -> Def {
        Def::builder(Phase::Idle)
            .state(Phase::Idle, |s| s.on(Kind::Go, Tr::to(Phase::Active)))
            .state(Phase::Active, |s| {
                s.after(Duration::from_millis(100), Ev::Timeout)
                    .on(Kind::Timeout, Tr::to(Phase::Done))
                    .on(Kind::Poke, Tr::to(Phase::Active).action(|c, _| c.value += 1))
                    .on(Kind::Go, Tr::to(Phase::Idle))
            })
            .state(Phase::Done, |s| s)
            .build()
            .unwrap()
    }

    #[test]
    fn test_delayed_transition_fires() {
        let clock = ManualClock::shared();
        let mut m = machine(delayed_definition(), clock.clone());

        m.send(Ev::Go(0));
        assert_eq!(m.pending_delays(), 1);

        clock.advance_ms(99);
        assert_eq!(m.poll(), 0);
        assert_eq!(m.state(), Phase::Active);

        clock.advance_ms(1);
        assert_eq!(m.poll(), 1);
        assert_eq!(m.state(), Phase::Done);
        assert_eq!(m.pending_delays(), 0);
    }

    #[test]
    fn test_reentry_rearms_instead_of_stacking() {
        let clock = ManualClock::shared();
        let mut m = machine(delayed_definition(), clock.clone());

        m.send(Ev::Go(0));
        clock.advance_ms(80);
        m.send(Ev::Poke);
        assert_eq!(m.pending_delays(), 1);

        // The first entry's timer would have fired here
        clock.advance_ms(30);
        assert_eq!(m.poll(), 0);
        assert_eq!(m.state(), Phase::Active);

        clock.advance_ms(70);
        assert_eq!(m.poll(), 1);
        assert_eq!(m.state(), Phase::Done);
    }

    #[test]
    fn test_leaving_state_cancels_delay() {
        let clock = ManualClock::shared();
        let mut m = machine(delayed_definition(), clock.clone());

        m.send(Ev::Go(0));
        m.send(Ev::Go(0));
        assert_eq!(m.state(), Phase::Idle);

        clock.advance_ms(500);
        assert_eq!(m.poll(), 0);
        assert_eq!(m.state(), Phase::Idle);
    }

    #[test]
    fn test_subscribers_see_changes_only() {
        let definition = delayed_definition();
        let mut m = machine(definition, ManualClock::shared());
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = seen.clone();
        let id = m.subscribe(move |t, _| sink.borrow_mut().push(t.state));

        m.send(Ev::Poke); // unhandled in Idle
        m.send(Ev::Go(0));
        m.send(Ev::Poke);
        assert_eq!(*seen.borrow(), vec![Phase::Active, Phase::Active]);

        assert!(m.unsubscribe(id));
        m.send(Ev::Go(0));
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn test_stop_cancels_timers_and_listeners() {
        let clock = ManualClock::shared();
        let mut m = machine(delayed_definition(), clock.clone());
        let calls = Rc::new(RefCell::new(0));
        let sink = calls.clone();
        m.subscribe(move |_, _| *sink.borrow_mut() += 1);

        m.send(Ev::Go(0));
        m.stop();
        clock.advance_ms(1_000);

        assert_eq!(m.poll(), 0);
        assert!(!m.send(Ev::Go(0)).handled);
        assert_eq!(m.state(), Phase::Active);
        assert_eq!(*calls.borrow(), 1);
        assert!(m.is_stopped());
    }

    #[test]
    fn test_send_is_deterministic() {
        let clock = ManualClock::shared();
        let mut a = machine(delayed_definition(), clock.clone());
        let mut b = machine(delayed_definition(), clock.clone());

        for event in [Ev::Go(1), Ev::Poke, Ev::Poke, Ev::Go(2), Ev::Go(3)] {
            let left = a.send(event.clone());
            let right = b.send(event);
            assert_eq!(left, right);
            assert_eq!(a.context(), b.context());
        }
    }

    #[test]
    #[should_panic(expected = "guard exploded")]
    fn test_guard_panic_propagates() {
        let definition = Def::builder(Phase::Idle)
            .state(Phase::Idle, |s| {
                s.on(
                    Kind::Go,
                    Tr::to(Phase::Idle).guard(|_, _| panic!("guard exploded")),
                )
            })
            .build()
            .unwrap();
        let mut m = machine(definition, ManualClock::shared());
        m.send(Ev::Go(0));
    }
}
