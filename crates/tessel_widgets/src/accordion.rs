//! Accordion controller - stacked headers expanding their panels
//!
//! Panels are addressed by their header's registry index. Toggling is a set
//! of guarded candidates tried in order: close an open panel when that is
//! allowed, add a panel when several may be open, otherwise replace the open
//! panel. A toggle no candidate accepts (closing the only panel of a
//! non-collapsible accordion) is ignored.

use std::rc::Rc;

use tessel_core::controlled::ControlLink;
use tessel_core::fsm::{
    Machine, MachineDefinition, MachineEvent, StateNode, Transition, Transitioned,
};
use tessel_core::input::{Direction, Key, KeyPress, Orientation};
use tessel_core::registry::{ItemMeta, SharedRegistry};
use tessel_core::{ControlError, MachineError};

use crate::navigation::{Capabilities, FocusQueue};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccordionState {
    Idle,
    Focused,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccordionEvent {
    Focus(usize),
    Blur,
    Navigate(Direction),
    Toggle(usize),
    /// Replace the open set with the application's value
    Sync(Vec<usize>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccordionEventKind {
    Focus,
    Blur,
    Navigate,
    Toggle,
    Sync,
}

impl MachineEvent for AccordionEvent {
    type Kind = AccordionEventKind;

    fn kind(&self) -> AccordionEventKind {
        match self {
            AccordionEvent::Focus(_) => AccordionEventKind::Focus,
            AccordionEvent::Blur => AccordionEventKind::Blur,
            AccordionEvent::Navigate(_) => AccordionEventKind::Navigate,
            AccordionEvent::Toggle(_) => AccordionEventKind::Toggle,
            AccordionEvent::Sync(_) => AccordionEventKind::Sync,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccordionContext {
    /// Open panel indices, ascending
    pub open: Vec<usize>,
    pub focused: Option<usize>,
}

pub type AccordionMachine = Machine<AccordionState, AccordionContext, AccordionEvent>;

type Step = Transition<AccordionState, AccordionContext, AccordionEvent>;
type Node = StateNode<AccordionState, AccordionContext, AccordionEvent>;

#[derive(Clone, Debug, Default)]
pub struct AccordionConfig {
    /// The last open panel may be closed
    pub collapsible: bool,
    /// Several panels may be open at once
    pub multiple: bool,
    /// Headers ignore toggles
    pub read_only: bool,
    pub rotate: bool,
    /// Controlled open set
    pub open: Option<Vec<usize>>,
    pub default_open: Vec<usize>,
}

impl AccordionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collapsible(mut self) -> Self {
        self.collapsible = true;
        self
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn rotate(mut self, rotate: bool) -> Self {
        self.rotate = rotate;
        self
    }

    pub fn open(mut self, panels: impl Into<Vec<usize>>) -> Self {
        self.open = Some(normalize(panels.into()));
        self
    }

    pub fn default_open(mut self, panels: impl Into<Vec<usize>>) -> Self {
        self.default_open = normalize(panels.into());
        self
    }
}

fn normalize(mut panels: Vec<usize>) -> Vec<usize> {
    panels.sort_unstable();
    panels.dedup();
    panels
}

fn toggled(e: &AccordionEvent) -> Option<usize> {
    match e {
        AccordionEvent::Toggle(index) => Some(*index),
        _ => None,
    }
}

/// What a toggle is allowed to do, shared by every state's candidates
#[derive(Clone)]
struct ToggleRules<H> {
    registry: SharedRegistry<H, ItemMeta>,
    collapsible: bool,
    multiple: bool,
    read_only: bool,
}

impl<H: Clone + 'static> ToggleRules<H> {
    fn accepts(&self, index: usize) -> bool {
        !self.read_only && self.registry.borrow().at(index).is_some_and(|d| !d.disabled)
    }

    fn candidates(&self, node: Node) -> Node {
        use AccordionEventKind as K;

        let close = {
            let rules = self.clone();
            move |c: &AccordionContext, e: &AccordionEvent| {
                toggled(e).is_some_and(|i| {
                    rules.accepts(i)
                        && c.open.contains(&i)
                        && (rules.collapsible || (rules.multiple && c.open.len() > 1))
                })
            }
        };
        let add = {
            let rules = self.clone();
            move |c: &AccordionContext, e: &AccordionEvent| {
                toggled(e).is_some_and(|i| rules.multiple && rules.accepts(i) && !c.open.contains(&i))
            }
        };
        let replace = {
            let rules = self.clone();
            move |c: &AccordionContext, e: &AccordionEvent| {
                toggled(e).is_some_and(|i| rules.accepts(i) && !c.open.contains(&i))
            }
        };

        node.on(
            K::Toggle,
            Step::internal().guard(close).action(|c, e| {
                if let Some(index) = toggled(e) {
                    c.open.retain(|open| *open != index);
                }
            }),
        )
        .on(
            K::Toggle,
            Step::internal().guard(add).action(|c, e| {
                if let Some(index) = toggled(e) {
                    c.open.push(index);
                    c.open.sort_unstable();
                }
            }),
        )
        .on(
            K::Toggle,
            Step::internal().guard(replace).action(|c, e| {
                if let Some(index) = toggled(e) {
                    c.open = vec![index];
                }
            }),
        )
    }
}

fn sync_open(c: &mut AccordionContext, e: &AccordionEvent) {
    if let AccordionEvent::Sync(open) = e {
        c.open = open.clone();
    }
}

/// Build the transition table for one accordion
pub fn definition<H: Clone + 'static>(
    registry: SharedRegistry<H, ItemMeta>,
    config: &AccordionConfig,
    rotate: bool,
) -> Result<MachineDefinition<AccordionState, AccordionContext, AccordionEvent>, MachineError> {
    use AccordionEventKind as K;
    use AccordionState::*;

    let rules = ToggleRules {
        registry: registry.clone(),
        collapsible: config.collapsible,
        multiple: config.multiple,
        read_only: config.read_only,
    };

    let navigate = move |c: &mut AccordionContext, e: &AccordionEvent| {
        let AccordionEvent::Navigate(direction) = e else {
            return;
        };
        if let Some(target) = registry.borrow().navigate(c.focused, *direction, rotate) {
            c.focused = Some(target.index);
        }
    };

    MachineDefinition::builder(Idle)
        .state(Idle, |s| {
            let s = s
                .on(
                    K::Focus,
                    Step::to(Focused).action(|c, e| {
                        if let AccordionEvent::Focus(index) = e {
                            c.focused = Some(*index);
                        }
                    }),
                )
                .on(K::Sync, Step::internal().action(sync_open));
            rules.candidates(s)
        })
        .state(Focused, |s| {
            let s = s
                .on(
                    K::Focus,
                    Step::internal().action(|c, e| {
                        if let AccordionEvent::Focus(index) = e {
                            c.focused = Some(*index);
                        }
                    }),
                )
                .on(K::Navigate, Step::internal().action(navigate))
                .on(K::Blur, Step::to(Idle).action(|c, _| c.focused = None))
                .on(K::Sync, Step::internal().action(sync_open));
            rules.candidates(s)
        })
        .build()
}

/// A live accordion
pub struct Accordion<H> {
    machine: AccordionMachine,
    registry: SharedRegistry<H, ItemMeta>,
    caps: Capabilities<H>,
    control: ControlLink<Vec<usize>>,
    focus: FocusQueue<H>,
    on_change: Option<Box<dyn FnMut(&[usize])>>,
}

impl<H: Clone + 'static> Accordion<H> {
    pub fn new(
        caps: Capabilities<H>,
        registry: SharedRegistry<H, ItemMeta>,
        config: AccordionConfig,
    ) -> tessel_core::Result<Self> {
        let rotate = config.rotate || caps.config.rotate_navigation;
        let definition = definition(registry.clone(), &config, rotate)?;
        let context = AccordionContext {
            open: config.open.clone().unwrap_or_else(|| config.default_open.clone()),
            focused: None,
        };
        let machine = Machine::new(Rc::new(definition), context, caps.clock.clone());

        Ok(Self {
            machine,
            registry,
            caps,
            control: ControlLink::new("Accordion", config.open),
            focus: FocusQueue::default(),
            on_change: None,
        })
    }

    /// Called with the new open set after every user toggle
    pub fn on_change(&mut self, callback: impl FnMut(&[usize]) + 'static) {
        self.on_change = Some(Box::new(callback));
    }

    pub fn state(&self) -> AccordionState {
        self.machine.state()
    }

    pub fn open_panels(&self) -> &[usize] {
        &self.machine.context().open
    }

    pub fn is_open(&self, index: usize) -> bool {
        self.machine.context().open.contains(&index)
    }

    pub fn focused(&self) -> Option<usize> {
        self.machine.context().focused
    }

    pub fn is_controlled(&self) -> bool {
        self.control.is_controlled()
    }

    pub fn machine(&self) -> &AccordionMachine {
        &self.machine
    }

    pub fn send(&mut self, event: AccordionEvent) -> Transitioned<AccordionState> {
        self.machine.send(event)
    }

    pub fn focus_header(&mut self, index: usize) -> Transitioned<AccordionState> {
        self.send(AccordionEvent::Focus(index))
    }

    pub fn blur(&mut self) -> Transitioned<AccordionState> {
        self.send(AccordionEvent::Blur)
    }

    /// A header was activated
    ///
    /// The open set changes right away in both modes. A controlled accordion
    /// reverts on the next [`Accordion::sync_open`] if the application keeps
    /// its old value.
    pub fn toggle(&mut self, index: usize) -> Transitioned<AccordionState> {
        let outcome = self.send(AccordionEvent::Toggle(index));
        if !outcome.handled {
            tracing::debug!(index, "accordion toggle ignored");
        }
        if outcome.changed {
            if let Some(on_change) = self.on_change.as_mut() {
                on_change(&self.machine.context().open);
            }
        }
        outcome
    }

    /// Handle a key on a focused header, returns whether it was consumed
    pub fn key_down(&mut self, press: impl Into<KeyPress>) -> bool {
        let press = press.into();
        if press.modifiers.has_command() || !self.machine.matches(AccordionState::Focused) {
            return false;
        }

        if let Some(direction) = press.key.direction(Orientation::Vertical) {
            let before = self.focused();
            self.send(AccordionEvent::Navigate(direction));
            if let Some(focused) = self.focused().filter(|f| Some(*f) != before) {
                if let Some(header) = self.registry.borrow().at(focused) {
                    self.focus.request(header.handle);
                }
            }
            return true;
        }

        match (press.key, self.focused()) {
            (Key::Enter | Key::Space, Some(focused)) => {
                self.toggle(focused);
                true
            }
            _ => false,
        }
    }

    /// Reconcile with the application's open set, once per render
    pub fn sync_open(
        &mut self,
        external: Option<Vec<usize>>,
    ) -> Result<Option<Transitioned<AccordionState>>, ControlError> {
        self.control.reconcile(
            &mut self.machine,
            external.map(normalize),
            |c| c.open.clone(),
            AccordionEvent::Sync,
        )
    }

    pub fn paint(&mut self) -> usize {
        self.focus.flush(&*self.caps.host)
    }

    pub fn unmount(&mut self) {
        self.machine.stop();
        self.focus.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tessel_core::host::testing::RecordingHost;
    use tessel_core::{DescendantRegistry, ManualClock};

    fn fixture(config: AccordionConfig, disabled: &[usize]) -> (Rc<RecordingHost>, Accordion<u64>) {
        let host = Rc::new(RecordingHost::new());
        let registry = DescendantRegistry::shared(host.clone());
        for (i, name) in ["Shipping", "Returns", "Warranty"].iter().enumerate() {
            let handle = i as u64 + 10;
            host.mount(handle, handle);
            registry
                .borrow_mut()
                .register(handle, disabled.contains(&i), ItemMeta::new(*name), None)
                .unwrap();
        }
        let caps = Capabilities::new(host.clone(), ManualClock::shared());
        (host, Accordion::new(caps, registry, config).unwrap())
    }

    #[test]
    fn test_single_replaces_open_panel() {
        let (_, mut accordion) = fixture(AccordionConfig::new(), &[]);
        accordion.toggle(0);
        accordion.toggle(2);
        assert_eq!(accordion.open_panels(), &[2]);
    }

    #[test]
    fn test_last_panel_stays_open_unless_collapsible() {
        let (_, mut fixed) = fixture(AccordionConfig::new().default_open([1]), &[]);
        assert!(!fixed.toggle(1).handled);
        assert!(fixed.is_open(1));

        let (_, mut collapsible) = fixture(AccordionConfig::new().collapsible().default_open([1]), &[]);
        assert!(collapsible.toggle(1).changed);
        assert!(collapsible.open_panels().is_empty());
    }

    #[test]
    fn test_multiple_adds_and_closes_while_others_remain() {
        let (_, mut accordion) = fixture(AccordionConfig::new().multiple(), &[]);
        accordion.toggle(2);
        accordion.toggle(0);
        assert_eq!(accordion.open_panels(), &[0, 2]);

        accordion.toggle(2);
        assert_eq!(accordion.open_panels(), &[0]);
        // Last one open, not collapsible
        assert!(!accordion.toggle(0).handled);
    }

    #[test]
    fn test_read_only_and_disabled_ignore_toggles() {
        let (_, mut read_only) = fixture(AccordionConfig::new().read_only(), &[]);
        assert!(!read_only.toggle(0).handled);

        let (_, mut accordion) = fixture(AccordionConfig::new(), &[1]);
        assert!(!accordion.toggle(1).handled);
        assert!(accordion.open_panels().is_empty());
    }

    #[test]
    fn test_keyboard_moves_between_headers() {
        let (host, mut accordion) = fixture(AccordionConfig::new(), &[1]);
        assert!(!accordion.key_down(Key::Down));

        accordion.focus_header(0);
        accordion.key_down(Key::Down);
        assert_eq!(accordion.focused(), Some(2));
        accordion.key_down(Key::Enter);
        assert!(accordion.is_open(2));

        accordion.paint();
        assert_eq!(host.last_focused(), Some(12));
    }

    #[test]
    fn test_controlled_open_set_reverts_without_app_update() {
        let (_, mut accordion) = fixture(AccordionConfig::new().multiple().open([0]), &[]);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        accordion.on_change(move |open| sink.borrow_mut().push(open.to_vec()));

        accordion.toggle(1);
        assert_eq!(accordion.open_panels(), &[0, 1]);
        assert_eq!(*seen.borrow(), vec![vec![0, 1]]);

        // The application keeps its value
        accordion.sync_open(Some(vec![0])).unwrap();
        assert_eq!(accordion.open_panels(), &[0]);

        accordion.sync_open(Some(vec![2, 0])).unwrap();
        assert_eq!(accordion.open_panels(), &[0, 2]);
        assert!(accordion.sync_open(None).is_err());
    }
}
