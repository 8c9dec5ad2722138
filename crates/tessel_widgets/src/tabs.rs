//! Tabs controller - a tab list selecting one panel
//!
//! Tabs register in document order; the selected index is their registry
//! index. Arrow keys follow the list's orientation, skip disabled tabs and
//! wrap by default. With automatic activation, moving focus also selects;
//! with manual activation, Enter or Space selects the focused tab.

use std::rc::Rc;

use tessel_core::controlled::ControlledState;
use tessel_core::fsm::{Machine, MachineDefinition, MachineEvent, Transition, Transitioned};
use tessel_core::input::{Direction, Key, KeyPress, Orientation};
use tessel_core::registry::{DescendantId, ItemMeta, SharedRegistry};
use tessel_core::{ControlError, MachineError};

use crate::navigation::{Capabilities, FocusQueue};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TabsState {
    /// Focus is outside the tab list
    Idle,
    /// A tab has keyboard focus
    Focused,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TabsEvent {
    Focus(usize),
    Blur,
    Navigate(Direction),
    Select(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TabsEventKind {
    Focus,
    Blur,
    Navigate,
    Select,
}

impl MachineEvent for TabsEvent {
    type Kind = TabsEventKind;

    fn kind(&self) -> TabsEventKind {
        match self {
            TabsEvent::Focus(_) => TabsEventKind::Focus,
            TabsEvent::Blur => TabsEventKind::Blur,
            TabsEvent::Navigate(_) => TabsEventKind::Navigate,
            TabsEvent::Select(_) => TabsEventKind::Select,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TabsContext {
    pub selected: usize,
    pub focused: Option<usize>,
}

pub type TabsMachine = Machine<TabsState, TabsContext, TabsEvent>;

type Step = Transition<TabsState, TabsContext, TabsEvent>;

/// When keyboard focus selects a tab
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Activation {
    /// Moving focus selects
    #[default]
    Automatic,
    /// Enter or Space selects the focused tab
    Manual,
}

#[derive(Clone, Debug)]
pub struct TabsConfig {
    pub orientation: Orientation,
    pub activation: Activation,
    pub rotate: bool,
    /// Controlled selected index
    pub selected: Option<usize>,
    pub default_selected: usize,
}

impl Default for TabsConfig {
    fn default() -> Self {
        Self {
            orientation: Orientation::Horizontal,
            activation: Activation::Automatic,
            rotate: true,
            selected: None,
            default_selected: 0,
        }
    }
}

impl TabsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertical(mut self) -> Self {
        self.orientation = Orientation::Vertical;
        self
    }

    pub fn manual(mut self) -> Self {
        self.activation = Activation::Manual;
        self
    }

    pub fn rotate(mut self, rotate: bool) -> Self {
        self.rotate = rotate;
        self
    }

    pub fn selected(mut self, index: usize) -> Self {
        self.selected = Some(index);
        self
    }

    pub fn default_selected(mut self, index: usize) -> Self {
        self.default_selected = index;
        self
    }
}

fn set_focused(c: &mut TabsContext, e: &TabsEvent) {
    if let TabsEvent::Focus(index) = e {
        c.focused = Some(*index);
    }
}

fn set_selected(c: &mut TabsContext, e: &TabsEvent) {
    if let TabsEvent::Select(index) = e {
        c.selected = *index;
    }
}

/// Build the transition table for one tab list
pub fn definition<H: Clone + 'static>(
    registry: SharedRegistry<H, ItemMeta>,
    rotate: bool,
) -> Result<MachineDefinition<TabsState, TabsContext, TabsEvent>, MachineError> {
    use TabsEventKind as K;
    use TabsState::*;

    let selectable = {
        let registry = registry.clone();
        move |_: &TabsContext, e: &TabsEvent| match e {
            TabsEvent::Select(index) => registry.borrow().at(*index).is_some_and(|d| !d.disabled),
            _ => false,
        }
    };

    let navigate = move |c: &mut TabsContext, e: &TabsEvent| {
        let TabsEvent::Navigate(direction) = e else {
            return;
        };
        let from = c.focused.or(Some(c.selected));
        if let Some(target) = registry.borrow().navigate(from, *direction, rotate) {
            c.focused = Some(target.index);
        }
    };

    MachineDefinition::builder(Idle)
        .state(Idle, |s| {
            s.on(K::Focus, Step::to(Focused).action(set_focused))
                .on(K::Select, Step::internal().guard(selectable.clone()).action(set_selected))
        })
        .state(Focused, |s| {
            s.on(K::Focus, Step::internal().action(set_focused))
                .on(K::Navigate, Step::internal().action(navigate))
                .on(K::Select, Step::internal().guard(selectable).action(set_selected))
                .on(K::Blur, Step::to(Idle).action(|c, _| c.focused = None))
        })
        .build()
}

/// A live tab list
pub struct Tabs<H> {
    machine: TabsMachine,
    registry: SharedRegistry<H, ItemMeta>,
    caps: Capabilities<H>,
    config: TabsConfig,
    selection: ControlledState<usize>,
    focus: FocusQueue<H>,
}

impl<H: Clone + 'static> Tabs<H> {
    pub fn new(
        caps: Capabilities<H>,
        registry: SharedRegistry<H, ItemMeta>,
        config: TabsConfig,
    ) -> tessel_core::Result<Self> {
        let definition = definition(registry.clone(), config.rotate)?;
        let context = TabsContext {
            selected: config.selected.unwrap_or(config.default_selected),
            focused: None,
        };
        let machine = Machine::new(Rc::new(definition), context, caps.clock.clone());
        let selection = ControlledState::new("Tabs", config.selected);

        Ok(Self {
            machine,
            registry,
            caps,
            config,
            selection,
            focus: FocusQueue::default(),
        })
    }

    /// Called with the index a user asked to select
    pub fn on_change(&mut self, callback: impl FnMut(&usize) + 'static) {
        self.selection.set_on_change(callback);
    }

    pub fn state(&self) -> TabsState {
        self.machine.state()
    }

    pub fn selected(&self) -> usize {
        self.machine.context().selected
    }

    pub fn focused(&self) -> Option<usize> {
        self.machine.context().focused
    }

    pub fn is_selected(&self, id: DescendantId) -> bool {
        self.registry.borrow().index_of(id) == Some(self.selected())
    }

    pub fn machine(&self) -> &TabsMachine {
        &self.machine
    }

    pub fn send(&mut self, event: TabsEvent) -> Transitioned<TabsState> {
        self.machine.send(event)
    }

    /// A tab received focus
    pub fn focus_tab(&mut self, index: usize) -> Transitioned<TabsState> {
        self.send(TabsEvent::Focus(index))
    }

    pub fn blur(&mut self) -> Transitioned<TabsState> {
        self.send(TabsEvent::Blur)
    }

    pub fn click_tab(&mut self, index: usize) -> Option<Transitioned<TabsState>> {
        self.send(TabsEvent::Focus(index));
        self.commit(index)
    }

    /// Handle a key on a focused tab, returns whether it was consumed
    pub fn key_down(&mut self, press: impl Into<KeyPress>) -> bool {
        let press = press.into();
        if press.modifiers.has_command() || !self.machine.matches(TabsState::Focused) {
            return false;
        }

        if let Some(direction) = press.key.direction(self.config.orientation) {
            let before = self.focused();
            self.send(TabsEvent::Navigate(direction));
            let Some(focused) = self.focused().filter(|f| Some(*f) != before) else {
                return true;
            };
            if let Some(tab) = self.registry.borrow().at(focused) {
                self.focus.request(tab.handle);
            }
            if self.config.activation == Activation::Automatic {
                self.commit(focused);
            }
            return true;
        }

        match press.key {
            Key::Enter | Key::Space => {
                if let Some(focused) = self.focused() {
                    self.commit(focused);
                }
                true
            }
            _ => false,
        }
    }

    /// The user asked to select `index`
    ///
    /// The application is notified; an uncontrolled list selects right
    /// away, a controlled one waits for [`Tabs::sync_selected`].
    fn commit(&mut self, index: usize) -> Option<Transitioned<TabsState>> {
        let enabled = self.registry.borrow().at(index).is_some_and(|d| !d.disabled);
        if !enabled || index == self.selected() {
            return None;
        }
        if self.selection.request(&index) {
            Some(self.send(TabsEvent::Select(index)))
        } else {
            None
        }
    }

    /// Reconcile with the application's selected index, once per render
    pub fn sync_selected(
        &mut self,
        external: Option<usize>,
    ) -> Result<Option<Transitioned<TabsState>>, ControlError> {
        self.selection
            .sync(&mut self.machine, external, |c| c.selected, TabsEvent::Select)
    }

    pub fn paint(&mut self) -> usize {
        self.focus.flush(&*self.caps.host)
    }

    pub fn unmount(&mut self) {
        self.machine.stop();
        self.focus.clear();
    }
}
