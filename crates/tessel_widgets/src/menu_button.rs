//! Menu button controller - a button that opens a list of actions
//!
//! Two states, `Closed` and `Open`. Entering `Open` suppresses tooltips for
//! the whole process and leaving it restores them; dropping the controller
//! while open restores them too.
//!
//! Choosing an item closes the menu, then runs the item's callback once the
//! configured confirmation delay has passed, and returns focus to the button
//! on the next paint.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;
use tessel_core::fsm::{Machine, MachineDefinition, MachineEvent, SubscriptionId, Transition, Transitioned};
use tessel_core::input::{Direction, Key, KeyPress};
use tessel_core::registry::{DescendantId, ItemMeta, SharedRegistry};
use tessel_core::timer::TimerQueue;
use tessel_core::typeahead::TypeaheadBuffer;
use tessel_core::{MachineError, RegistryError};

use crate::navigation::{Capabilities, DeferredBlur, FocusQueue};
use crate::tooltip::TooltipSuppression;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MenuState {
    Closed,
    Open,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MenuEvent {
    /// Open the menu, highlighting the first or last item when given
    Open(Option<Direction>),
    Close,
    Navigate(Direction),
    Highlight(Option<DescendantId>),
    Search { key: char, at: Instant },
    /// Drop an idle typeahead query
    ClearTypeahead,
    /// Choose the highlighted item
    Select,
    /// Choose a clicked item
    SelectItem(DescendantId),
    Blur,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MenuEventKind {
    Open,
    Close,
    Navigate,
    Highlight,
    Search,
    ClearTypeahead,
    Select,
    SelectItem,
    Blur,
}

impl MachineEvent for MenuEvent {
    type Kind = MenuEventKind;

    fn kind(&self) -> MenuEventKind {
        match self {
            MenuEvent::Open(_) => MenuEventKind::Open,
            MenuEvent::Close => MenuEventKind::Close,
            MenuEvent::Navigate(_) => MenuEventKind::Navigate,
            MenuEvent::Highlight(_) => MenuEventKind::Highlight,
            MenuEvent::Search { .. } => MenuEventKind::Search,
            MenuEvent::ClearTypeahead => MenuEventKind::ClearTypeahead,
            MenuEvent::Select => MenuEventKind::Select,
            MenuEvent::SelectItem(_) => MenuEventKind::SelectItem,
            MenuEvent::Blur => MenuEventKind::Blur,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MenuContext {
    pub highlighted: Option<DescendantId>,
    pub typeahead: TypeaheadBuffer,
}

pub type MenuMachine = Machine<MenuState, MenuContext, MenuEvent>;

type Step = Transition<MenuState, MenuContext, MenuEvent>;

#[derive(Clone, Debug, Default)]
pub struct MenuButtonConfig {
    pub rotate: bool,
    /// Overrides the runtime's menu select delay
    pub select_delay: Option<Duration>,
}

impl MenuButtonConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rotate(mut self, rotate: bool) -> Self {
        self.rotate = rotate;
        self
    }

    pub fn select_delay(mut self, delay: Duration) -> Self {
        self.select_delay = Some(delay);
        self
    }
}

type SuppressionSlot = Rc<RefCell<Option<TooltipSuppression>>>;

/// Build the transition table for one menu
pub fn definition<H: Clone + 'static>(
    registry: SharedRegistry<H, ItemMeta>,
    suppression: SuppressionSlot,
    rotate: bool,
) -> Result<MachineDefinition<MenuState, MenuContext, MenuEvent>, MachineError> {
    use MenuEventKind as K;
    use MenuState::*;

    let on_open = {
        let registry = registry.clone();
        let suppression = suppression.clone();
        move |c: &mut MenuContext, e: &MenuEvent| {
            suppression
                .borrow_mut()
                .get_or_insert_with(TooltipSuppression::acquire);
            let registry = registry.borrow();
            c.highlighted = match e {
                MenuEvent::Open(Some(Direction::Last | Direction::Previous)) => {
                    registry.last_enabled().map(|d| d.id)
                }
                MenuEvent::Open(Some(_)) => registry.first_enabled().map(|d| d.id),
                _ => None,
            };
        }
    };

    let on_close = move |c: &mut MenuContext, _: &MenuEvent| {
        suppression.borrow_mut().take();
        c.highlighted = None;
        c.typeahead.clear();
    };

    let navigate = {
        let registry = registry.clone();
        move |c: &mut MenuContext, e: &MenuEvent| {
            let MenuEvent::Navigate(direction) = e else {
                return;
            };
            let registry = registry.borrow();
            let from = c.highlighted.and_then(|id| registry.index_of(id));
            if let Some(target) = registry.navigate(from, *direction, rotate) {
                c.highlighted = Some(target.id);
            }
        }
    };

    let search = {
        let registry = registry.clone();
        move |c: &mut MenuContext, e: &MenuEvent| {
            let MenuEvent::Search { key, at } = e else {
                return;
            };
            if let Some(id) = c.typeahead.feed(*key, *at, &registry.borrow().all()) {
                c.highlighted = Some(id);
            }
        }
    };

    let highlight = |c: &mut MenuContext, e: &MenuEvent| {
        if let MenuEvent::Highlight(id) = e {
            c.highlighted = *id;
        }
    };

    let selectable = move |c: &MenuContext, e: &MenuEvent| {
        let target = match e {
            MenuEvent::Select => c.highlighted,
            MenuEvent::SelectItem(id) => Some(*id),
            _ => None,
        };
        target
            .and_then(|id| registry.borrow().get(id))
            .is_some_and(|d| !d.disabled)
    };

    MachineDefinition::builder(Closed)
        .state(Closed, |s| s.on(K::Open, Step::to(Open)))
        .state(Open, |s| {
            s.entry(on_open)
                .exit(on_close)
                .on(K::Navigate, Step::internal().action(navigate))
                .on(K::Highlight, Step::internal().action(highlight))
                .on(K::Search, Step::internal().action(search))
                .on(K::ClearTypeahead, Step::internal().action(|c, _| c.typeahead.clear()))
                .on(K::Select, Step::to(Closed).guard(selectable.clone()))
                .on(K::SelectItem, Step::to(Closed).guard(selectable))
                .on(K::Close, Step::to(Closed))
                .on(K::Blur, Step::to(Closed))
        })
        .build()
}

/// A live menu button
pub struct MenuButton<H> {
    machine: MenuMachine,
    registry: SharedRegistry<H, ItemMeta>,
    caps: Capabilities<H>,
    button: Option<H>,
    list: Option<H>,
    suppression: SuppressionSlot,
    callbacks: FxHashMap<DescendantId, Box<dyn FnMut()>>,
    confirmations: TimerQueue<DescendantId>,
    select_delay: Duration,
    pending_blur: DeferredBlur,
    focus: FocusQueue<H>,
}

impl<H: Clone + PartialEq + 'static> MenuButton<H> {
    pub fn new(
        caps: Capabilities<H>,
        registry: SharedRegistry<H, ItemMeta>,
        config: MenuButtonConfig,
    ) -> tessel_core::Result<Self> {
        let suppression = SuppressionSlot::default();
        let rotate = config.rotate || caps.config.rotate_navigation;
        let definition = definition(registry.clone(), suppression.clone(), rotate)?;
        let context = MenuContext {
            highlighted: None,
            typeahead: TypeaheadBuffer::new(caps.config.typeahead_timeout()),
        };
        let machine = Machine::new(Rc::new(definition), context, caps.clock.clone());
        let select_delay = config
            .select_delay
            .unwrap_or_else(|| caps.config.menu_select_delay());

        Ok(Self {
            machine,
            registry,
            caps,
            button: None,
            list: None,
            suppression,
            callbacks: FxHashMap::default(),
            confirmations: TimerQueue::new(),
            select_delay,
            pending_blur: DeferredBlur::default(),
            focus: FocusQueue::default(),
        })
    }

    pub fn set_button(&mut self, handle: H) {
        self.button = Some(handle);
    }

    pub fn set_list(&mut self, handle: H) {
        self.list = Some(handle);
    }

    /// Register an item together with the callback it runs when chosen
    pub fn add_item(
        &mut self,
        handle: H,
        meta: ItemMeta,
        disabled: bool,
        on_select: impl FnMut() + 'static,
    ) -> Result<DescendantId, RegistryError> {
        let id = self.registry.borrow_mut().register(handle, disabled, meta, None)?;
        self.callbacks.insert(id, Box::new(on_select));
        Ok(id)
    }

    /// Unmount an item; a pending confirmation for it is dropped
    pub fn remove_item(&mut self, id: DescendantId) -> bool {
        self.callbacks.remove(&id);
        self.registry.borrow_mut().deregister(id)
    }

    pub fn state(&self) -> MenuState {
        self.machine.state()
    }

    pub fn is_open(&self) -> bool {
        self.machine.matches(MenuState::Open)
    }

    pub fn highlighted(&self) -> Option<DescendantId> {
        self.machine.context().highlighted
    }

    pub fn machine(&self) -> &MenuMachine {
        &self.machine
    }

    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&Transitioned<MenuState>, &MenuContext) + 'static,
    ) -> SubscriptionId {
        self.machine.subscribe(listener)
    }

    pub fn send(&mut self, event: MenuEvent) -> Transitioned<MenuState> {
        let chosen = match &event {
            MenuEvent::Select => self.machine.context().highlighted,
            MenuEvent::SelectItem(id) => Some(*id),
            _ => None,
        };
        let outcome = self.machine.send(event);

        if outcome.entered(MenuState::Open) {
            if let Some(list) = self.list.clone() {
                self.focus.request(list);
            }
        }
        if let Some(id) = chosen.filter(|_| outcome.handled) {
            self.confirm(id);
        }
        outcome
    }

    pub fn button_clicked(&mut self) -> Transitioned<MenuState> {
        if self.is_open() {
            self.send(MenuEvent::Close)
        } else {
            self.send(MenuEvent::Open(None))
        }
    }

    pub fn hover_item(&mut self, id: DescendantId) -> Transitioned<MenuState> {
        self.send(MenuEvent::Highlight(Some(id)))
    }

    pub fn pointer_left(&mut self) -> Transitioned<MenuState> {
        self.send(MenuEvent::Highlight(None))
    }

    pub fn click_item(&mut self, id: DescendantId) -> Transitioned<MenuState> {
        self.pending_blur.cancel();
        self.send(MenuEvent::SelectItem(id))
    }

    /// Focus left the button or the menu
    ///
    /// The menu closes after the configured number of ticks unless focus
    /// lands back inside it first.
    pub fn blur(&mut self) {
        self.pending_blur.defer(self.caps.config.blur_defer_ticks);
    }

    /// Focus landed on `target`; landing on the button or inside the menu
    /// cancels a pending blur
    pub fn focus_moved(&mut self, target: &H) {
        let inside_list = self
            .list
            .as_ref()
            .is_some_and(|list| self.caps.host.contains(list, target));
        let on_button = self.button.as_ref() == Some(target);
        if (inside_list || on_button) && self.pending_blur.cancel() {
            tracing::trace!("deferred menu blur cancelled");
        }
    }

    pub fn has_pending_blur(&self) -> bool {
        self.pending_blur.is_pending()
    }

    /// Advance one scheduling tick, returns how many blurs were applied
    pub fn tick(&mut self) -> usize {
        if !self.pending_blur.tick() {
            return 0;
        }
        self.send(MenuEvent::Blur);
        1
    }

    pub fn key_down(&mut self, press: impl Into<KeyPress>) -> bool {
        let press = press.into();
        if press.modifiers.has_command() {
            return false;
        }
        if self.is_open() {
            let now = self.caps.clock.now();
            let typeahead = &self.machine.context().typeahead;
            let searching = !typeahead.is_empty() && !typeahead.is_expired(now);
            if let Some(key) = press.key.typeahead_char(searching) {
                return self.send(MenuEvent::Search { key, at: now }).handled;
            }
        }

        let event = match (self.state(), press.key) {
            (MenuState::Closed, Key::Down | Key::Enter | Key::Space) => {
                MenuEvent::Open(Some(Direction::First))
            }
            (MenuState::Closed, Key::Up) => MenuEvent::Open(Some(Direction::Last)),
            (MenuState::Closed, _) => return false,
            (_, Key::Down) => MenuEvent::Navigate(Direction::Next),
            (_, Key::Up) => MenuEvent::Navigate(Direction::Previous),
            (_, Key::Home | Key::PageUp) => MenuEvent::Navigate(Direction::First),
            (_, Key::End | Key::PageDown) => MenuEvent::Navigate(Direction::Last),
            (_, Key::Enter | Key::Space) => MenuEvent::Select,
            (_, Key::Escape) => {
                let outcome = self.send(MenuEvent::Close);
                self.refocus_button();
                return outcome.handled;
            }
            (_, Key::Tab) => MenuEvent::Blur,
            _ => return false,
        };
        self.send(event).handled
    }

    /// Fire due delayed transitions, typeahead expiry and item confirmations
    pub fn poll(&mut self) -> usize {
        let now = self.caps.clock.now();
        let mut fired = self.machine.poll();
        if self.machine.context().typeahead.is_expired(now) {
            fired += usize::from(self.send(MenuEvent::ClearTypeahead).handled);
        }
        let due = self.confirmations.take_due(now);
        for (_, id) in due {
            fired += usize::from(self.run_callback(id));
        }
        fired
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.machine.next_deadline(),
            self.machine.context().typeahead.expires_at(),
            self.confirmations.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    pub fn paint(&mut self) -> usize {
        self.focus.flush(&*self.caps.host)
    }

    /// Tear down, restoring tooltips even if the menu is still open
    pub fn unmount(&mut self) {
        self.machine.stop();
        self.suppression.borrow_mut().take();
        self.confirmations.clear();
        self.pending_blur.clear();
        self.focus.clear();
    }

    fn confirm(&mut self, id: DescendantId) {
        self.refocus_button();
        if self.select_delay.is_zero() {
            self.run_callback(id);
        } else {
            let deadline = self.caps.clock.now() + self.select_delay;
            self.confirmations.arm(deadline, id);
        }
    }

    fn run_callback(&mut self, id: DescendantId) -> bool {
        match self.callbacks.get_mut(&id) {
            Some(callback) => {
                callback();
                true
            }
            None => {
                tracing::debug!(?id, "menu item removed before its selection was confirmed");
                false
            }
        }
    }

    fn refocus_button(&mut self) {
        if let Some(button) = self.button.clone() {
            self.focus.request(button);
        }
    }
}

impl<H> Drop for MenuButton<H> {
    fn drop(&mut self) {
        self.suppression.borrow_mut().take();
    }
}
