//! Listbox controller - a button that opens a single-select option list
//!
//! States: `Idle` (closed), `Navigating` (open, an option highlighted),
//! `Searching` (open, typeahead under way) and `Interacting` (focus inside the
//! list on something other than an option). `Searching` falls back to
//! `Navigating` once the typeahead has been idle for the configured delay.
//!
//! Typing while closed selects the first matching option directly; typing
//! while open only moves the highlight.

use std::rc::Rc;
use std::time::{Duration, Instant};

use tessel_core::controlled::ControlLink;
use tessel_core::fsm::{Machine, MachineDefinition, MachineEvent, SubscriptionId, Transition, Transitioned};
use tessel_core::input::{Direction, Key, KeyPress};
use tessel_core::registry::{ItemMeta, SharedRegistry};
use tessel_core::typeahead::TypeaheadBuffer;
use tessel_core::{ControlError, MachineError};

use crate::navigation::{index_of_value, is_enabled_value, Capabilities, DeferredBlur, FocusQueue};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ListboxState {
    Idle,
    Navigating,
    Searching,
    Interacting,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ListboxEvent {
    Open,
    Close,
    Navigate(Direction),
    /// Pointer moved over an option
    Highlight(String),
    Search { key: char, at: Instant },
    ClearTypeahead,
    /// Commit the highlighted option
    Select,
    /// Commit a clicked option
    SelectValue(String),
    /// Replace the value without touching the popover
    ValueChange(String),
    Blur,
    Interact,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ListboxEventKind {
    Open,
    Close,
    Navigate,
    Highlight,
    Search,
    ClearTypeahead,
    Select,
    SelectValue,
    ValueChange,
    Blur,
    Interact,
}

impl MachineEvent for ListboxEvent {
    type Kind = ListboxEventKind;

    fn kind(&self) -> ListboxEventKind {
        match self {
            ListboxEvent::Open => ListboxEventKind::Open,
            ListboxEvent::Close => ListboxEventKind::Close,
            ListboxEvent::Navigate(_) => ListboxEventKind::Navigate,
            ListboxEvent::Highlight(_) => ListboxEventKind::Highlight,
            ListboxEvent::Search { .. } => ListboxEventKind::Search,
            ListboxEvent::ClearTypeahead => ListboxEventKind::ClearTypeahead,
            ListboxEvent::Select => ListboxEventKind::Select,
            ListboxEvent::SelectValue(_) => ListboxEventKind::SelectValue,
            ListboxEvent::ValueChange(_) => ListboxEventKind::ValueChange,
            ListboxEvent::Blur => ListboxEventKind::Blur,
            ListboxEvent::Interact => ListboxEventKind::Interact,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListboxContext {
    pub value: Option<String>,
    pub navigation_value: Option<String>,
    pub typeahead: TypeaheadBuffer,
}

pub type ListboxMachine = Machine<ListboxState, ListboxContext, ListboxEvent>;

type Step = Transition<ListboxState, ListboxContext, ListboxEvent>;

#[derive(Clone, Debug, Default)]
pub struct ListboxConfig {
    pub value: Option<String>,
    pub default_value: Option<String>,
    pub rotate: bool,
}

impl ListboxConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn rotate(mut self, rotate: bool) -> Self {
        self.rotate = rotate;
        self
    }
}

fn clear_navigation(c: &mut ListboxContext, _: &ListboxEvent) {
    c.navigation_value = None;
}

fn clear_typeahead(c: &mut ListboxContext, _: &ListboxEvent) {
    c.typeahead.clear();
}

fn highlight(c: &mut ListboxContext, e: &ListboxEvent) {
    if let ListboxEvent::Highlight(value) = e {
        c.navigation_value = Some(value.clone());
    }
}

fn commit_navigation(c: &mut ListboxContext, _: &ListboxEvent) {
    if let Some(value) = c.navigation_value.take() {
        c.value = Some(value);
    }
}

fn assign_value(c: &mut ListboxContext, e: &ListboxEvent) {
    match e {
        ListboxEvent::SelectValue(value) => {
            c.value = Some(value.clone());
            c.navigation_value = None;
        }
        ListboxEvent::ValueChange(value) => {
            c.value = Some(value.clone());
            if c.navigation_value.is_some() {
                c.navigation_value = Some(value.clone());
            }
        }
        _ => {}
    }
}

/// Typeahead action; `commit` selects the match instead of highlighting it
fn search<H: Clone + 'static>(
    registry: SharedRegistry<H, ItemMeta>,
    commit: bool,
) -> impl Fn(&mut ListboxContext, &ListboxEvent) + 'static {
    move |c, e| {
        let ListboxEvent::Search { key, at } = e else {
            return;
        };
        let registry = registry.borrow();
        let found = c
            .typeahead
            .feed(*key, *at, &registry.all())
            .and_then(|id| registry.get(id))
            .map(|d| d.meta.value);
        match found {
            Some(value) if commit => c.value = Some(value),
            Some(value) => c.navigation_value = Some(value),
            None => {}
        }
    }
}

/// Build the transition table for one listbox
pub fn definition<H: Clone + 'static>(
    registry: SharedRegistry<H, ItemMeta>,
    rotate: bool,
    clear_after: Duration,
) -> Result<MachineDefinition<ListboxState, ListboxContext, ListboxEvent>, MachineError> {
    use ListboxEventKind as K;
    use ListboxState::*;

    let open_highlight = {
        let registry = registry.clone();
        move |c: &mut ListboxContext, _: &ListboxEvent| {
            let registry = registry.borrow();
            c.navigation_value = c
                .value
                .clone()
                .filter(|value| is_enabled_value(&registry, value))
                .or_else(|| registry.first_enabled().map(|d| d.meta.value));
        }
    };

    let navigate = {
        let registry = registry.clone();
        move |c: &mut ListboxContext, e: &ListboxEvent| {
            let ListboxEvent::Navigate(direction) = e else {
                return;
            };
            let registry = registry.borrow();
            let from = c
                .navigation_value
                .as_deref()
                .and_then(|value| index_of_value(&registry, value));
            if let Some(target) = registry.navigate(from, *direction, rotate) {
                c.navigation_value = Some(target.meta.value);
            }
        }
    };

    let highlighted_enabled = {
        let registry = registry.clone();
        move |c: &ListboxContext, _: &ListboxEvent| {
            c.navigation_value
                .as_deref()
                .is_some_and(|value| is_enabled_value(&registry.borrow(), value))
        }
    };

    let clicked_enabled = {
        let registry = registry.clone();
        move |_: &ListboxContext, e: &ListboxEvent| match e {
            ListboxEvent::SelectValue(value) => is_enabled_value(&registry.borrow(), value),
            _ => false,
        }
    };

    MachineDefinition::builder(Idle)
        .state(Idle, |s| {
            s.on(K::Open, Step::to(Navigating).action(open_highlight.clone()))
                .on(K::Navigate, Step::to(Navigating).action(open_highlight.clone()))
                .on(K::Search, Step::internal().action(search(registry.clone(), true)))
                .on(K::ValueChange, Step::internal().action(assign_value))
        })
        .state(Navigating, |s| {
            s.on(K::Navigate, Step::internal().action(navigate.clone()))
                .on(K::Highlight, Step::internal().action(highlight))
                .on(K::Search, Step::to(Searching).action(search(registry.clone(), false)))
                .on(
                    K::Select,
                    Step::to(Idle)
                        .guard(highlighted_enabled.clone())
                        .action(commit_navigation),
                )
                .on(
                    K::SelectValue,
                    Step::to(Idle).guard(clicked_enabled.clone()).action(assign_value),
                )
                .on(K::Close, Step::to(Idle).action(clear_navigation))
                .on(K::Blur, Step::to(Idle).action(clear_navigation))
                .on(K::Interact, Step::to(Interacting))
                .on(K::ValueChange, Step::internal().action(assign_value))
        })
        .state(Searching, |s| {
            s.after(clear_after, ListboxEvent::ClearTypeahead)
                .on(K::Search, Step::to(Searching).action(search(registry.clone(), false)))
                .on(K::ClearTypeahead, Step::to(Navigating).action(clear_typeahead))
                .on(
                    K::Navigate,
                    Step::to(Navigating)
                        .action(clear_typeahead)
                        .action(navigate.clone()),
                )
                .on(
                    K::Highlight,
                    Step::to(Navigating).action(clear_typeahead).action(highlight),
                )
                .on(
                    K::Select,
                    Step::to(Idle)
                        .guard(highlighted_enabled.clone())
                        .action(clear_typeahead)
                        .action(commit_navigation),
                )
                .on(
                    K::SelectValue,
                    Step::to(Idle)
                        .guard(clicked_enabled.clone())
                        .action(clear_typeahead)
                        .action(assign_value),
                )
                .on(
                    K::Close,
                    Step::to(Idle).action(clear_typeahead).action(clear_navigation),
                )
                .on(
                    K::Blur,
                    Step::to(Idle).action(clear_typeahead).action(clear_navigation),
                )
                .on(K::ValueChange, Step::internal().action(assign_value))
        })
        .state(Interacting, |s| {
            s.on(K::Navigate, Step::to(Navigating).action(navigate.clone()))
                .on(K::Highlight, Step::to(Navigating).action(highlight))
                .on(K::Search, Step::to(Searching).action(search(registry.clone(), false)))
                .on(
                    K::SelectValue,
                    Step::to(Idle).guard(clicked_enabled.clone()).action(assign_value),
                )
                .on(K::Close, Step::to(Idle).action(clear_navigation))
                .on(K::Blur, Step::to(Idle).action(clear_navigation))
                .on(K::ValueChange, Step::internal().action(assign_value))
        })
        .build()
}

/// A live listbox
pub struct Listbox<H> {
    machine: ListboxMachine,
    registry: SharedRegistry<H, ItemMeta>,
    caps: Capabilities<H>,
    button: Option<H>,
    list: Option<H>,
    control: ControlLink<String>,
    pending_blur: DeferredBlur,
    focus: FocusQueue<H>,
    on_change: Option<Box<dyn FnMut(&str)>>,
}

impl<H: Clone + PartialEq + 'static> Listbox<H> {
    pub fn new(
        caps: Capabilities<H>,
        registry: SharedRegistry<H, ItemMeta>,
        config: ListboxConfig,
    ) -> tessel_core::Result<Self> {
        let rotate = config.rotate || caps.config.rotate_navigation;
        let definition = definition(registry.clone(), rotate, caps.config.listbox_typeahead_clear())?;
        let context = ListboxContext {
            value: config.value.clone().or(config.default_value),
            navigation_value: None,
            typeahead: TypeaheadBuffer::new(caps.config.typeahead_timeout()),
        };
        let machine = Machine::new(Rc::new(definition), context, caps.clock.clone());

        Ok(Self {
            machine,
            registry,
            caps,
            button: None,
            list: None,
            control: ControlLink::new("Listbox", config.value),
            pending_blur: DeferredBlur::default(),
            focus: FocusQueue::default(),
            on_change: None,
        })
    }

    pub fn set_button(&mut self, handle: H) {
        self.button = Some(handle);
    }

    pub fn set_list(&mut self, handle: H) {
        self.list = Some(handle);
    }

    /// Called whenever a user action changes the value
    pub fn on_change(&mut self, callback: impl FnMut(&str) + 'static) {
        self.on_change = Some(Box::new(callback));
    }

    pub fn state(&self) -> ListboxState {
        self.machine.state()
    }

    pub fn value(&self) -> Option<&str> {
        self.machine.context().value.as_deref()
    }

    pub fn navigation_value(&self) -> Option<&str> {
        self.machine.context().navigation_value.as_deref()
    }

    pub fn is_expanded(&self) -> bool {
        !self.machine.matches(ListboxState::Idle)
    }

    pub fn registry(&self) -> &SharedRegistry<H, ItemMeta> {
        &self.registry
    }

    pub fn machine(&self) -> &ListboxMachine {
        &self.machine
    }

    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&Transitioned<ListboxState>, &ListboxContext) + 'static,
    ) -> SubscriptionId {
        self.machine.subscribe(listener)
    }

    /// Send a user event, notifying `on_change` and scheduling focus moves
    pub fn send(&mut self, event: ListboxEvent) -> Transitioned<ListboxState> {
        self.dispatch(event, true)
    }

    fn dispatch(&mut self, event: ListboxEvent, refocus_button: bool) -> Transitioned<ListboxState> {
        let before = self.machine.context().value.clone();
        let outcome = self.machine.send(event);

        if outcome.exited(ListboxState::Idle) {
            if let Some(list) = self.list.clone() {
                self.focus.request(list);
            }
        }
        if refocus_button && outcome.entered(ListboxState::Idle) {
            if let Some(button) = self.button.clone() {
                self.focus.request(button);
            }
        }

        let after = &self.machine.context().value;
        if *after != before {
            if let (Some(value), Some(on_change)) = (after.clone(), self.on_change.as_mut()) {
                on_change(&value);
            }
        }
        outcome
    }

    pub fn open(&mut self) -> Transitioned<ListboxState> {
        self.send(ListboxEvent::Open)
    }

    pub fn close(&mut self) -> Transitioned<ListboxState> {
        self.send(ListboxEvent::Close)
    }

    pub fn button_clicked(&mut self) -> Transitioned<ListboxState> {
        if self.is_expanded() {
            self.close()
        } else {
            self.open()
        }
    }

    pub fn hover_option(&mut self, value: impl Into<String>) -> Transitioned<ListboxState> {
        self.send(ListboxEvent::Highlight(value.into()))
    }

    pub fn click_option(&mut self, value: impl Into<String>) -> Transitioned<ListboxState> {
        self.pending_blur.cancel();
        self.send(ListboxEvent::SelectValue(value.into()))
    }

    /// Focus moved inside the open list onto a non-option element
    pub fn interact(&mut self) -> Transitioned<ListboxState> {
        self.send(ListboxEvent::Interact)
    }

    /// Focus left the button or the list
    ///
    /// The list closes after the configured number of ticks, without moving
    /// focus back, unless focus lands back inside the widget first.
    pub fn blur(&mut self) {
        self.pending_blur.defer(self.caps.config.blur_defer_ticks);
    }

    /// Focus landed on `target`; landing on the button or inside the list
    /// cancels a pending blur
    pub fn focus_moved(&mut self, target: &H) {
        let inside_list = self
            .list
            .as_ref()
            .is_some_and(|list| self.caps.host.contains(list, target));
        let on_button = self.button.as_ref() == Some(target);
        if (inside_list || on_button) && self.pending_blur.cancel() {
            tracing::trace!("deferred listbox blur cancelled");
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
        self.dispatch(ListboxEvent::Blur, false);
        1
    }

    /// Handle a key on the button or the list, returns whether it was consumed
    pub fn key_down(&mut self, press: impl Into<KeyPress>) -> bool {
        let press = press.into();
        if press.modifiers.has_command() {
            return false;
        }
        let state = self.state();
        if let Some(key) = press.key.typeahead_char(state == ListboxState::Searching) {
            let at = self.caps.clock.now();
            return self.send(ListboxEvent::Search { key, at }).handled;
        }

        let event = match (state, press.key) {
            (ListboxState::Idle, Key::Down | Key::Up | Key::Enter | Key::Space) => ListboxEvent::Open,
            (ListboxState::Idle, _) => return false,
            (_, Key::Down) => ListboxEvent::Navigate(Direction::Next),
            (_, Key::Up) => ListboxEvent::Navigate(Direction::Previous),
            (_, Key::Home | Key::PageUp) => ListboxEvent::Navigate(Direction::First),
            (_, Key::End | Key::PageDown) => ListboxEvent::Navigate(Direction::Last),
            (_, Key::Enter | Key::Space) => ListboxEvent::Select,
            (_, Key::Escape) => ListboxEvent::Close,
            (_, Key::Tab) => return self.dispatch(ListboxEvent::Blur, false).handled,
            _ => return false,
        };
        self.send(event).handled
    }

    /// Reconcile with the application's value, once per render
    pub fn sync_value(
        &mut self,
        external: Option<String>,
    ) -> Result<Option<Transitioned<ListboxState>>, ControlError> {
        self.control.reconcile(
            &mut self.machine,
            external,
            |c| c.value.clone().unwrap_or_default(),
            ListboxEvent::ValueChange,
        )
    }

    /// Fire due delayed transitions
    pub fn poll(&mut self) -> usize {
        self.machine.poll()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.machine.next_deadline()
    }

    pub fn paint(&mut self) -> usize {
        self.focus.flush(&*self.caps.host)
    }

    pub fn unmount(&mut self) {
        self.machine.stop();
        self.pending_blur.clear();
        self.focus.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tessel_core::host::testing::RecordingHost;
    use tessel_core::{DescendantRegistry, ManualClock};

    const BUTTON: u64 = 100;
    const LIST: u64 = 200;

    fn animals(config: ListboxConfig) -> (Rc<RecordingHost>, Rc<ManualClock>, Listbox<u64>) {
        let host = Rc::new(RecordingHost::new());
        let registry = DescendantRegistry::shared(host.clone());
        for (i, (name, disabled)) in [("Bear", false), ("Fox", false), ("Lion", false), ("Lynx", true)]
            .into_iter()
            .enumerate()
        {
            let handle = i as u64 + 1;
            host.mount(handle, handle);
            host.set_parent(handle, LIST);
            registry
                .borrow_mut()
                .register(handle, disabled, ItemMeta::new(name), None)
                .unwrap();
        }
        let clock = ManualClock::shared();
        let caps = Capabilities::new(host.clone(), clock.clone());
        let mut listbox = Listbox::new(caps, registry, config).unwrap();
        listbox.set_button(BUTTON);
        listbox.set_list(LIST);
        (host, clock, listbox)
    }

    #[test]
    fn test_open_highlights_current_value() {
        let (host, _, mut listbox) = animals(ListboxConfig::new().default_value("Lion"));
        listbox.key_down(Key::Down);
        assert_eq!(listbox.state(), ListboxState::Navigating);
        assert_eq!(listbox.navigation_value(), Some("Lion"));

        listbox.paint();
        assert_eq!(host.last_focused(), Some(LIST));
    }

    #[test]
    fn test_keyboard_select_returns_focus_to_button() {
        let (host, _, mut listbox) = animals(ListboxConfig::new());
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = changes.clone();
        listbox.on_change(move |v| sink.borrow_mut().push(v.to_string()));

        listbox.open();
        assert_eq!(listbox.navigation_value(), Some("Bear"));
        listbox.key_down(Key::Down);
        listbox.key_down(Key::Enter);

        assert_eq!(listbox.state(), ListboxState::Idle);
        assert_eq!(listbox.value(), Some("Fox"));
        assert_eq!(*changes.borrow(), vec!["Fox"]);
        listbox.paint();
        assert_eq!(host.focus_log(), vec![LIST, BUTTON]);
    }

    #[test]
    fn test_open_typeahead_highlights_then_settles() {
        let (_, clock, mut listbox) = animals(ListboxConfig::new());
        listbox.open();

        listbox.key_down(Key::Char('l'));
        assert_eq!(listbox.state(), ListboxState::Searching);
        assert_eq!(listbox.navigation_value(), Some("Lion"));

        clock.advance_ms(600);
        listbox.key_down(Key::Char('y'));
        // Lynx is disabled, the highlight stays on Lion
        assert_eq!(listbox.navigation_value(), Some("Lion"));
        assert_eq!(listbox.machine().context().typeahead.query(), "ly");

        // The clear timer restarted on the second key
        clock.advance_ms(600);
        assert_eq!(listbox.poll(), 0);
        clock.advance_ms(400);
        assert_eq!(listbox.poll(), 1);
        assert_eq!(listbox.state(), ListboxState::Navigating);
        assert!(listbox.machine().context().typeahead.is_empty());
        assert_eq!(listbox.value(), None);
    }

    #[test]
    fn test_closed_typeahead_selects() {
        let (_, _, mut listbox) = animals(ListboxConfig::new());
        assert!(listbox.key_down(Key::Char('F')));
        assert_eq!(listbox.state(), ListboxState::Idle);
        assert_eq!(listbox.value(), Some("Fox"));
    }

    #[test]
    fn test_disabled_option_click_rejected() {
        let (_, _, mut listbox) = animals(ListboxConfig::new());
        listbox.open();
        assert!(!listbox.click_option("Lynx").handled);
        assert!(listbox.click_option("Bear").handled);
        assert_eq!(listbox.value(), Some("Bear"));
    }

    #[test]
    fn test_blur_closes_without_refocusing_button() {
        let (host, _, mut listbox) = animals(ListboxConfig::new());
        listbox.open();
        listbox.paint();
        listbox.key_down(Key::Tab);
        assert_eq!(listbox.state(), ListboxState::Idle);
        listbox.paint();
        assert_eq!(host.focus_log(), vec![LIST]);
    }

    #[test]
    fn test_click_inside_list_beats_pending_blur() {
        let (_, _, mut listbox) = animals(ListboxConfig::new());
        listbox.open();
        listbox.blur();
        assert!(listbox.is_expanded());

        // Pointer down on an option moves focus into the list first
        listbox.focus_moved(&2);
        assert!(!listbox.has_pending_blur());
        assert!(listbox.click_option("Fox").handled);
        assert_eq!(listbox.tick(), 0);
        assert_eq!(listbox.value(), Some("Fox"));
    }

    #[test]
    fn test_blur_elsewhere_closes_after_tick() {
        let (host, _, mut listbox) = animals(ListboxConfig::new());
        listbox.open();
        listbox.paint();
        listbox.blur();
        listbox.focus_moved(&999);
        assert!(listbox.is_expanded());

        assert_eq!(listbox.tick(), 1);
        assert_eq!(listbox.state(), ListboxState::Idle);
        listbox.paint();
        assert_eq!(host.focus_log(), vec![LIST]);
    }

    #[test]
    fn test_controlled_value_follows_sync() {
        let (_, _, mut listbox) = animals(ListboxConfig::new().value("Bear"));
        listbox.open();
        listbox.sync_value(Some("Lion".into())).unwrap();
        assert_eq!(listbox.value(), Some("Lion"));
        assert_eq!(listbox.navigation_value(), Some("Lion"));
        assert!(listbox.is_expanded());
        assert!(listbox.sync_value(None).is_err());
    }
}
