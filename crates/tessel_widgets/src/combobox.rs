//! Combobox controller - text input with a suggestion popover
//!
//! The combobox is the fullest instantiation of the runtime: a four-state
//! machine, registry-driven keyboard navigation, a controlled input value and
//! a blur that waits a tick so a click inside the popover can cancel it.
//!
//! ```text
//!            Change               Navigate
//!   Idle ─────────────▶ Suggesting ─────────▶ Navigating
//!    ▲ ◀── Escape/Blur ───┘  │                  │   │
//!    │                       │ Interact         │   │ SelectWithKeyboard
//!    │                       ▼                  │   ▼
//!    └──── Blur ─────── Interacting ◀───────────┘  Idle
//! ```
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use tessel_core::host::testing::RecordingHost;
//! use tessel_core::{DescendantRegistry, ItemMeta, ManualClock};
//! use tessel_widgets::combobox::{Combobox, ComboboxConfig, ComboboxState};
//! use tessel_widgets::Capabilities;
//!
//! let host = Rc::new(RecordingHost::new());
//! let registry = DescendantRegistry::shared(host.clone());
//! for (handle, fruit) in [(1, "Apple"), (2, "Banana")] {
//!     host.mount(handle, handle);
//!     registry.borrow_mut().register(handle, false, ItemMeta::new(fruit), None).unwrap();
//! }
//!
//! let caps = Capabilities::new(host, ManualClock::shared());
//! let mut combobox = Combobox::new(caps, registry, ComboboxConfig::new()).unwrap();
//! combobox.input_changed("Ba");
//! assert_eq!(combobox.state(), ComboboxState::Suggesting);
//! ```

use std::rc::Rc;

use tessel_core::controlled::ControlLink;
use tessel_core::fsm::{Action, Machine, MachineDefinition, MachineEvent, SubscriptionId, Transition, Transitioned};
use tessel_core::input::{Direction, Key, KeyPress};
use tessel_core::registry::{ItemMeta, SharedRegistry};
use tessel_core::{ControlError, MachineError};

use crate::navigation::{index_of_value, is_enabled_value, Capabilities, DeferredBlur, FocusQueue};

/// Combobox interaction states
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComboboxState {
    /// Nothing is shown, the input may hold a value
    Idle,
    /// The user is typing and the popover shows suggestions
    Suggesting,
    /// An option is highlighted with the keyboard or pointer
    Navigating,
    /// Focus moved into the popover onto something other than an option
    Interacting,
}

/// Where a navigate event should move the highlight
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NavigateTo {
    /// Highlight a specific option; an empty value means the first one
    Value(String),
    /// Move relative to the current highlight
    Step(Direction),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ComboboxEvent {
    /// The user typed into the input
    Change(String),
    /// The application replaced the controlled value
    ControlledChange(String),
    Clear,
    Navigate(NavigateTo),
    SelectWithKeyboard,
    SelectWithClick(String),
    Escape,
    Blur,
    Interact,
    Focus,
    OpenWithButton,
    CloseWithButton,
    OpenWithInputClick,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComboboxEventKind {
    Change,
    ControlledChange,
    Clear,
    Navigate,
    SelectWithKeyboard,
    SelectWithClick,
    Escape,
    Blur,
    Interact,
    Focus,
    OpenWithButton,
    CloseWithButton,
    OpenWithInputClick,
}

impl MachineEvent for ComboboxEvent {
    type Kind = ComboboxEventKind;

    fn kind(&self) -> ComboboxEventKind {
        match self {
            ComboboxEvent::Change(_) => ComboboxEventKind::Change,
            ComboboxEvent::ControlledChange(_) => ComboboxEventKind::ControlledChange,
            ComboboxEvent::Clear => ComboboxEventKind::Clear,
            ComboboxEvent::Navigate(_) => ComboboxEventKind::Navigate,
            ComboboxEvent::SelectWithKeyboard => ComboboxEventKind::SelectWithKeyboard,
            ComboboxEvent::SelectWithClick(_) => ComboboxEventKind::SelectWithClick,
            ComboboxEvent::Escape => ComboboxEventKind::Escape,
            ComboboxEvent::Blur => ComboboxEventKind::Blur,
            ComboboxEvent::Interact => ComboboxEventKind::Interact,
            ComboboxEvent::Focus => ComboboxEventKind::Focus,
            ComboboxEvent::OpenWithButton => ComboboxEventKind::OpenWithButton,
            ComboboxEvent::CloseWithButton => ComboboxEventKind::CloseWithButton,
            ComboboxEvent::OpenWithInputClick => ComboboxEventKind::OpenWithInputClick,
        }
    }
}

/// Machine context
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComboboxContext {
    /// Text in the input
    pub value: String,
    /// Value of the highlighted option
    pub navigation_value: Option<String>,
}

pub type ComboboxMachine = Machine<ComboboxState, ComboboxContext, ComboboxEvent>;

type Step = Transition<ComboboxState, ComboboxContext, ComboboxEvent>;

/// Combobox behavior switches
#[derive(Clone, Debug, Default)]
pub struct ComboboxConfig {
    /// Show suggestions as soon as the input gains focus
    pub open_on_focus: bool,
    /// Show suggestions when the input is clicked
    pub open_on_click: bool,
    /// Reopening highlights the option matching the current value
    pub persist_selection: bool,
    /// Wrap around at the ends of the list
    pub rotate: bool,
    /// Controlled value; `Some` makes the input value app-owned
    pub value: Option<String>,
    /// Starting value when uncontrolled
    pub default_value: String,
}

impl ComboboxConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_on_focus(mut self, open: bool) -> Self {
        self.open_on_focus = open;
        self
    }

    pub fn open_on_click(mut self, open: bool) -> Self {
        self.open_on_click = open;
        self
    }

    pub fn persist_selection(mut self, persist: bool) -> Self {
        self.persist_selection = persist;
        self
    }

    pub fn rotate(mut self, rotate: bool) -> Self {
        self.rotate = rotate;
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = value.into();
        self
    }
}

fn set_value(c: &mut ComboboxContext, e: &ComboboxEvent) {
    match e {
        ComboboxEvent::Change(value)
        | ComboboxEvent::ControlledChange(value)
        | ComboboxEvent::SelectWithClick(value) => c.value = value.clone(),
        _ => {}
    }
}

fn clear_value(c: &mut ComboboxContext, _: &ComboboxEvent) {
    c.value.clear();
}

fn clear_navigation(c: &mut ComboboxContext, _: &ComboboxEvent) {
    c.navigation_value = None;
}

fn select_navigation(c: &mut ComboboxContext, _: &ComboboxEvent) {
    if let Some(value) = c.navigation_value.take() {
        c.value = value;
    }
}

/// Build the transition table for one combobox
pub fn definition<H: Clone + 'static>(
    registry: SharedRegistry<H, ItemMeta>,
    config: &ComboboxConfig,
    rotate: bool,
) -> Result<MachineDefinition<ComboboxState, ComboboxContext, ComboboxEvent>, MachineError> {
    use ComboboxEventKind as K;
    use ComboboxState::*;

    let navigate: Action<ComboboxContext, ComboboxEvent> = {
        let registry = registry.clone();
        Rc::new(move |c: &mut ComboboxContext, e: &ComboboxEvent| {
            let ComboboxEvent::Navigate(to) = e else {
                return;
            };
            let registry = registry.borrow();
            match to {
                NavigateTo::Value(value) if !value.is_empty() => {
                    c.navigation_value = Some(value.clone());
                }
                NavigateTo::Value(_) => {
                    c.navigation_value = registry.first_enabled().map(|d| d.meta.value);
                }
                NavigateTo::Step(direction) => {
                    let from = c
                        .navigation_value
                        .as_deref()
                        .and_then(|value| index_of_value(&registry, value));
                    // Nowhere to go keeps the current highlight
                    if let Some(target) = registry.navigate(from, *direction, rotate) {
                        c.navigation_value = Some(target.meta.value);
                    }
                }
            }
        })
    };

    let has_options = {
        let registry = registry.clone();
        move |_: &ComboboxContext, _: &ComboboxEvent| !registry.borrow().is_empty()
    };

    let persisted = {
        let registry = registry.clone();
        let persist = config.persist_selection;
        move |c: &ComboboxContext, _: &ComboboxEvent| {
            persist && is_enabled_value(&registry.borrow(), &c.value)
        }
    };
    let highlight_value = |c: &mut ComboboxContext, _: &ComboboxEvent| {
        c.navigation_value = Some(c.value.clone());
    };

    let open_on_focus = config.open_on_focus;
    let open_on_click = config.open_on_click;

    MachineDefinition::builder(Idle)
        .state(Idle, |s| {
            s.on(K::Blur, Step::to(Idle))
                .on(K::Clear, Step::to(Idle).action(clear_value))
                .on(K::Change, Step::to(Suggesting).action(set_value).action(clear_navigation))
                .on(
                    K::ControlledChange,
                    Step::to(Idle).action(set_value).action(clear_navigation),
                )
                .on(
                    K::Focus,
                    Step::to(Suggesting)
                        .guard({
                            let has_options = has_options.clone();
                            move |c, e| open_on_focus && has_options(c, e)
                        }),
                )
                .on(K::Navigate, Step::to(Navigating).guard(has_options.clone()).run(&navigate))
                .on(
                    K::OpenWithButton,
                    Step::to(Navigating).guard(persisted.clone()).action(highlight_value),
                )
                .on(K::OpenWithButton, Step::to(Suggesting).guard(has_options.clone()))
                .on(
                    K::OpenWithInputClick,
                    Step::to(Navigating)
                        .guard({
                            let persisted = persisted.clone();
                            move |c, e| open_on_click && persisted(c, e)
                        })
                        .action(highlight_value),
                )
                .on(
                    K::OpenWithInputClick,
                    Step::to(Suggesting).guard({
                        let has_options = has_options.clone();
                        move |c, e| open_on_click && has_options(c, e)
                    }),
                )
        })
        .state(Suggesting, |s| {
            s.on(K::Change, Step::to(Suggesting).action(set_value))
                .on(K::ControlledChange, Step::to(Suggesting).action(set_value))
                .on(K::Focus, Step::internal())
                .on(K::Navigate, Step::to(Navigating).guard(has_options.clone()).run(&navigate))
                .on(K::Clear, Step::to(Idle).action(clear_value).action(clear_navigation))
                .on(K::Escape, Step::to(Idle).action(clear_navigation))
                .on(K::Blur, Step::to(Idle).action(clear_navigation))
                .on(
                    K::SelectWithClick,
                    Step::to(Idle).action(set_value).action(clear_navigation),
                )
                .on(K::Interact, Step::to(Interacting))
                .on(K::CloseWithButton, Step::to(Idle).action(clear_navigation))
        })
        .state(Navigating, |s| {
            s.on(K::Change, Step::to(Suggesting).action(set_value).action(clear_navigation))
                .on(
                    K::ControlledChange,
                    Step::to(Idle).action(set_value).action(clear_navigation),
                )
                .on(K::Focus, Step::to(Suggesting).action(clear_navigation))
                .on(K::Navigate, Step::to(Navigating).run(&navigate))
                .on(K::Clear, Step::to(Idle).action(clear_value).action(clear_navigation))
                .on(K::Escape, Step::to(Suggesting).action(clear_navigation))
                .on(K::Blur, Step::to(Idle).action(clear_navigation))
                .on(
                    K::SelectWithClick,
                    Step::to(Idle).action(set_value).action(clear_navigation),
                )
                .on(K::SelectWithKeyboard, Step::to(Idle).action(select_navigation))
                .on(K::CloseWithButton, Step::to(Idle).action(clear_navigation))
                .on(K::Interact, Step::to(Interacting))
        })
        .state(Interacting, |s| {
            s.on(K::Change, Step::to(Suggesting).action(set_value).action(clear_navigation))
                .on(K::ControlledChange, Step::to(Interacting).action(set_value))
                .on(K::Focus, Step::to(Suggesting))
                .on(K::Navigate, Step::to(Navigating).run(&navigate))
                .on(K::Clear, Step::to(Idle).action(clear_value).action(clear_navigation))
                .on(K::Escape, Step::to(Idle).action(clear_navigation))
                .on(K::Blur, Step::to(Idle).action(clear_navigation))
                .on(
                    K::SelectWithClick,
                    Step::to(Idle).action(set_value).action(clear_navigation),
                )
                .on(K::CloseWithButton, Step::to(Idle).action(clear_navigation))
        })
        .build()
}

/// A live combobox
pub struct Combobox<H> {
    machine: ComboboxMachine,
    registry: SharedRegistry<H, ItemMeta>,
    caps: Capabilities<H>,
    config: ComboboxConfig,
    input: Option<H>,
    popover: Option<H>,
    control: ControlLink<String>,
    /// The next controlled sync comes from the user typing
    user_typed: bool,
    pending_blur: DeferredBlur,
    focus: FocusQueue<H>,
    on_select: Option<Box<dyn FnMut(&str)>>,
    on_input: Option<Box<dyn FnMut(&str)>>,
}

impl<H: Clone + PartialEq + 'static> Combobox<H> {
    pub fn new(
        caps: Capabilities<H>,
        registry: SharedRegistry<H, ItemMeta>,
        config: ComboboxConfig,
    ) -> tessel_core::Result<Self> {
        let rotate = config.rotate || caps.config.rotate_navigation;
        let definition = definition(registry.clone(), &config, rotate)?;
        let context = ComboboxContext {
            value: config
                .value
                .clone()
                .unwrap_or_else(|| config.default_value.clone()),
            navigation_value: None,
        };
        let machine = Machine::new(Rc::new(definition), context, caps.clock.clone());
        let control = ControlLink::new("Combobox", config.value.clone());

        Ok(Self {
            machine,
            registry,
            caps,
            config,
            input: None,
            popover: None,
            control,
            user_typed: false,
            pending_blur: DeferredBlur::default(),
            focus: FocusQueue::default(),
            on_select: None,
            on_input: None,
        })
    }

    /// Element that holds the text input
    pub fn set_input(&mut self, handle: H) {
        self.input = Some(handle);
    }

    /// Element that wraps the suggestion list
    pub fn set_popover(&mut self, handle: H) {
        self.popover = Some(handle);
    }

    pub fn on_select(&mut self, callback: impl FnMut(&str) + 'static) {
        self.on_select = Some(Box::new(callback));
    }

    /// Called with the raw text on every keystroke
    pub fn on_input(&mut self, callback: impl FnMut(&str) + 'static) {
        self.on_input = Some(Box::new(callback));
    }

    pub fn state(&self) -> ComboboxState {
        self.machine.state()
    }

    pub fn value(&self) -> &str {
        &self.machine.context().value
    }

    pub fn navigation_value(&self) -> Option<&str> {
        self.machine.context().navigation_value.as_deref()
    }

    /// Whether the popover is shown
    pub fn is_expanded(&self) -> bool {
        !self.machine.matches(ComboboxState::Idle)
    }

    pub fn is_controlled(&self) -> bool {
        self.control.is_controlled()
    }

    pub fn config(&self) -> &ComboboxConfig {
        &self.config
    }

    pub fn registry(&self) -> &SharedRegistry<H, ItemMeta> {
        &self.registry
    }

    pub fn machine(&self) -> &ComboboxMachine {
        &self.machine
    }

    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&Transitioned<ComboboxState>, &ComboboxContext) + 'static,
    ) -> SubscriptionId {
        self.machine.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.machine.unsubscribe(id)
    }

    /// Send an event and run the select callback for handled selections
    pub fn send(&mut self, event: ComboboxEvent) -> Transitioned<ComboboxState> {
        let selecting = matches!(
            event.kind(),
            ComboboxEventKind::SelectWithKeyboard | ComboboxEventKind::SelectWithClick
        );
        let outcome = self.machine.send(event);
        if selecting && outcome.handled {
            let value = self.machine.context().value.clone();
            if let Some(on_select) = self.on_select.as_mut() {
                on_select(&value);
            }
        }
        outcome
    }

    /// The user edited the input text
    ///
    /// Uncontrolled inputs update right away; erasing the text down to
    /// whitespace clears the value and closes the popover. Controlled inputs only notify
    /// the application and wait for the value to come back through
    /// [`Combobox::sync_value`].
    pub fn input_changed(&mut self, text: impl Into<String>) -> Option<Transitioned<ComboboxState>> {
        let text = text.into();
        if let Some(on_input) = self.on_input.as_mut() {
            on_input(&text);
        }
        if self.control.is_controlled() {
            self.user_typed = true;
            return None;
        }
        if text.trim().is_empty() {
            return Some(self.send(ComboboxEvent::Clear));
        }
        Some(self.send(ComboboxEvent::Change(text)))
    }

    /// Reconcile with the application's value, once per render
    pub fn sync_value(
        &mut self,
        external: Option<String>,
    ) -> Result<Option<Transitioned<ComboboxState>>, ControlError> {
        let typed = std::mem::take(&mut self.user_typed);
        self.control.reconcile(
            &mut self.machine,
            external,
            |c| c.value.clone(),
            |value| {
                if typed {
                    ComboboxEvent::Change(value)
                } else {
                    ComboboxEvent::ControlledChange(value)
                }
            },
        )
    }

    /// Handle a key pressed while the input has focus, returns whether it was consumed
    pub fn key_down(&mut self, press: impl Into<KeyPress>) -> bool {
        let press = press.into();
        if press.modifiers.has_command() {
            return false;
        }
        let state = self.state();
        let event = match press.key {
            Key::Down if state == ComboboxState::Idle && self.persisted_value().is_some() => self
                .persisted_value()
                .map(|value| ComboboxEvent::Navigate(NavigateTo::Value(value))),
            Key::Down => Some(ComboboxEvent::Navigate(NavigateTo::Step(Direction::Next))),
            Key::Up => Some(ComboboxEvent::Navigate(NavigateTo::Step(Direction::Previous))),
            Key::Home | Key::PageUp if state == ComboboxState::Navigating => {
                Some(ComboboxEvent::Navigate(NavigateTo::Step(Direction::First)))
            }
            Key::End | Key::PageDown if state == ComboboxState::Navigating => {
                Some(ComboboxEvent::Navigate(NavigateTo::Step(Direction::Last)))
            }
            Key::Enter if state == ComboboxState::Navigating => Some(ComboboxEvent::SelectWithKeyboard),
            Key::Escape => Some(ComboboxEvent::Escape),
            _ => None,
        };
        event.is_some_and(|event| self.send(event).handled)
    }

    fn persisted_value(&self) -> Option<String> {
        let value = &self.machine.context().value;
        (self.config.persist_selection && is_enabled_value(&self.registry.borrow(), value))
            .then(|| value.clone())
    }

    pub fn input_focused(&mut self) -> Transitioned<ComboboxState> {
        self.cancel_blur();
        self.send(ComboboxEvent::Focus)
    }

    pub fn input_clicked(&mut self) -> Transitioned<ComboboxState> {
        self.send(ComboboxEvent::OpenWithInputClick)
    }

    /// Toggle button next to the input
    pub fn button_clicked(&mut self) -> Transitioned<ComboboxState> {
        let event = if self.is_expanded() {
            ComboboxEvent::CloseWithButton
        } else {
            ComboboxEvent::OpenWithButton
        };
        let outcome = self.send(event);
        if let Some(input) = self.input.clone() {
            self.focus.request(input);
        }
        outcome
    }

    pub fn hover_option(&mut self, value: impl Into<String>) -> Transitioned<ComboboxState> {
        self.send(ComboboxEvent::Navigate(NavigateTo::Value(value.into())))
    }

    /// An option was clicked; focus returns to the input on the next paint
    pub fn click_option(&mut self, value: impl Into<String>) -> Transitioned<ComboboxState> {
        self.cancel_blur();
        let outcome = self.send(ComboboxEvent::SelectWithClick(value.into()));
        if let Some(input) = self.input.clone() {
            self.focus.request(input);
        }
        outcome
    }

    pub fn clear(&mut self) -> Transitioned<ComboboxState> {
        self.send(ComboboxEvent::Clear)
    }

    /// Focus left the input or the popover
    ///
    /// The blur is applied after the configured number of ticks unless focus
    /// lands back inside the widget first.
    pub fn blur(&mut self) {
        self.pending_blur.defer(self.caps.config.blur_defer_ticks);
    }

    /// Focus landed on `target`
    ///
    /// Landing on the input or inside the popover cancels a pending blur.
    /// Landing inside the popover also moves the machine to `Interacting`.
    pub fn focus_moved(&mut self, target: &H) {
        let inside_popover = self
            .popover
            .as_ref()
            .is_some_and(|popover| self.caps.host.contains(popover, target));
        let on_input = self.input.as_ref() == Some(target);
        if !inside_popover && !on_input {
            return;
        }
        self.cancel_blur();
        if inside_popover {
            self.send(ComboboxEvent::Interact);
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
        self.send(ComboboxEvent::Blur);
        1
    }

    /// Apply focus moves requested since the last paint
    pub fn paint(&mut self) -> usize {
        self.focus.flush(&*self.caps.host)
    }

    /// Tear down: no more callbacks, timers or focus moves
    pub fn unmount(&mut self) {
        self.machine.stop();
        self.pending_blur.clear();
        self.focus.clear();
    }

    fn cancel_blur(&mut self) {
        if self.pending_blur.cancel() {
            tracing::trace!("deferred combobox blur cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tessel_core::host::testing::RecordingHost;
    use tessel_core::{DescendantRegistry, ManualClock};

    const INPUT: u64 = 100;
    const POPOVER: u64 = 200;

    fn fruits(config: ComboboxConfig) -> (Rc<RecordingHost>, Combobox<u64>) {
        fruits_with(config, &[("Apple", false), ("Banana", false), ("Cherry", false)])
    }

    fn fruits_with(config: ComboboxConfig, items: &[(&str, bool)]) -> (Rc<RecordingHost>, Combobox<u64>) {
        let host = Rc::new(RecordingHost::new());
        let registry = DescendantRegistry::shared(host.clone());
        for (i, (name, disabled)) in items.iter().enumerate() {
            let handle = i as u64 + 1;
            host.mount(handle, handle);
            host.set_parent(handle, POPOVER);
            registry
                .borrow_mut()
                .register(handle, *disabled, ItemMeta::new(*name), None)
                .unwrap();
        }
        let caps = Capabilities::new(host.clone(), ManualClock::shared());
        let mut combobox = Combobox::new(caps, registry, config).unwrap();
        combobox.set_input(INPUT);
        combobox.set_popover(POPOVER);
        (host, combobox)
    }

    #[test]
    fn test_navigate_and_select_with_keyboard() {
        let (_, mut combobox) = fruits(ComboboxConfig::new());

        combobox.send(ComboboxEvent::Navigate(NavigateTo::Value(String::new())));
        assert_eq!(combobox.state(), ComboboxState::Navigating);
        assert_eq!(combobox.navigation_value(), Some("Apple"));

        combobox.send(ComboboxEvent::Navigate(NavigateTo::Step(Direction::Next)));
        assert_eq!(combobox.navigation_value(), Some("Banana"));

        combobox.send(ComboboxEvent::SelectWithKeyboard);
        assert_eq!(combobox.state(), ComboboxState::Idle);
        assert_eq!(combobox.value(), "Banana");
        assert_eq!(combobox.navigation_value(), None);
    }

    #[test]
    fn test_typing_opens_suggestions_and_arrows_navigate() {
        let (_, mut combobox) = fruits(ComboboxConfig::new());

        combobox.input_changed("a");
        assert_eq!(combobox.state(), ComboboxState::Suggesting);
        assert!(combobox.key_down(Key::Down));
        assert_eq!(combobox.navigation_value(), Some("Apple"));
        assert!(combobox.key_down(Key::End));
        assert_eq!(combobox.navigation_value(), Some("Cherry"));
        // No rotation, the highlight stays on the last option
        combobox.key_down(Key::Down);
        assert_eq!(combobox.navigation_value(), Some("Cherry"));

        assert!(combobox.key_down(Key::Escape));
        assert_eq!(combobox.state(), ComboboxState::Suggesting);
        assert_eq!(combobox.navigation_value(), None);
        assert_eq!(combobox.value(), "a");
    }

    #[test]
    fn test_erasing_the_input_clears_and_closes() {
        let (_, mut combobox) = fruits(ComboboxConfig::new());

        combobox.input_changed("a");
        assert!(combobox.is_expanded());
        combobox.input_changed("");
        assert_eq!(combobox.state(), ComboboxState::Idle);
        assert!(!combobox.is_expanded());
        assert_eq!(combobox.value(), "");

        combobox.input_changed("   ");
        assert_eq!(combobox.state(), ComboboxState::Idle);
        assert_eq!(combobox.value(), "");
    }

    #[test]
    fn test_rotation_and_disabled_options() {
        let (_, mut combobox) = fruits_with(
            ComboboxConfig::new().rotate(true),
            &[("Apple", false), ("Banana", true), ("Cherry", false)],
        );
        combobox.key_down(Key::Down);
        combobox.key_down(Key::Down);
        assert_eq!(combobox.navigation_value(), Some("Cherry"));
        combobox.key_down(Key::Down);
        assert_eq!(combobox.navigation_value(), Some("Apple"));
        combobox.key_down(Key::Up);
        assert_eq!(combobox.navigation_value(), Some("Cherry"));
    }

    #[test]
    fn test_navigate_without_options_is_a_no_op() {
        let (_, mut combobox) = fruits_with(ComboboxConfig::new(), &[]);
        assert!(!combobox.key_down(Key::Down));
        assert_eq!(combobox.state(), ComboboxState::Idle);
    }

    #[test]
    fn test_click_selects_and_refocuses_input_on_paint() {
        let (host, mut combobox) = fruits(ComboboxConfig::new());
        let selected = Rc::new(RefCell::new(Vec::new()));
        let sink = selected.clone();
        combobox.on_select(move |value| sink.borrow_mut().push(value.to_string()));

        combobox.input_changed("ch");
        combobox.click_option("Cherry");
        assert_eq!(combobox.value(), "Cherry");
        assert_eq!(*selected.borrow(), vec!["Cherry"]);
        assert_eq!(host.last_focused(), None);

        assert_eq!(combobox.paint(), 1);
        assert_eq!(host.last_focused(), Some(INPUT));
    }

    #[test]
    fn test_blur_waits_a_tick_and_click_inside_cancels_it() {
        let (_, mut combobox) = fruits(ComboboxConfig::new());
        combobox.input_changed("b");

        // Pressing an option blurs the input before the click lands
        combobox.blur();
        combobox.focus_moved(&2);
        assert!(!combobox.has_pending_blur());
        assert_eq!(combobox.state(), ComboboxState::Interacting);
        assert_eq!(combobox.tick(), 0);
        assert!(combobox.is_expanded());

        combobox.blur();
        assert_eq!(combobox.state(), ComboboxState::Interacting);
        assert_eq!(combobox.tick(), 1);
        assert_eq!(combobox.state(), ComboboxState::Idle);
    }

    #[test]
    fn test_focus_outside_does_not_cancel_blur() {
        let (_, mut combobox) = fruits(ComboboxConfig::new());
        combobox.input_changed("b");
        combobox.blur();
        combobox.focus_moved(&999);
        assert!(combobox.has_pending_blur());
        combobox.tick();
        assert!(!combobox.is_expanded());
    }

    #[test]
    fn test_persist_selection_reopens_on_value() {
        let (_, mut combobox) =
            fruits(ComboboxConfig::new().persist_selection(true).default_value("Banana"));

        combobox.button_clicked();
        assert_eq!(combobox.state(), ComboboxState::Navigating);
        assert_eq!(combobox.navigation_value(), Some("Banana"));

        combobox.button_clicked();
        assert_eq!(combobox.state(), ComboboxState::Idle);
    }

    #[test]
    fn test_button_without_persisted_value_suggests() {
        let (_, mut combobox) = fruits(ComboboxConfig::new().persist_selection(true).default_value("Kiwi"));
        combobox.button_clicked();
        assert_eq!(combobox.state(), ComboboxState::Suggesting);
    }

    #[test]
    fn test_open_on_focus_and_click_are_opt_in() {
        let (_, mut closed) = fruits(ComboboxConfig::new());
        closed.input_focused();
        closed.input_clicked();
        assert_eq!(closed.state(), ComboboxState::Idle);

        let (_, mut eager) = fruits(ComboboxConfig::new().open_on_focus(true));
        eager.input_focused();
        assert_eq!(eager.state(), ComboboxState::Suggesting);
    }

    #[test]
    fn test_controlled_typing_goes_through_sync() {
        let (_, mut combobox) = fruits(ComboboxConfig::new().value(""));
        let typed = Rc::new(RefCell::new(String::new()));
        let sink = typed.clone();
        combobox.on_input(move |text| *sink.borrow_mut() = text.to_string());

        assert!(combobox.input_changed("ap").is_none());
        assert_eq!(combobox.value(), "");
        assert_eq!(*typed.borrow(), "ap");

        let outcome = combobox.sync_value(Some("ap".into())).unwrap().unwrap();
        assert_eq!(outcome.state, ComboboxState::Suggesting);
        assert_eq!(combobox.value(), "ap");
        assert!(combobox.sync_value(Some("ap".into())).unwrap().is_none());
    }

    #[test]
    fn test_controlled_reset_matches_user_change_context() {
        let (_, mut controlled) = fruits(ComboboxConfig::new().value(""));
        let (_, mut uncontrolled) = fruits(ComboboxConfig::new());

        for combobox in [&mut controlled, &mut uncontrolled] {
            combobox.send(ComboboxEvent::Navigate(NavigateTo::Value(String::new())));
        }
        controlled.sync_value(Some("Cherry".into())).unwrap();
        uncontrolled.send(ComboboxEvent::Change("Cherry".into()));

        assert_eq!(controlled.machine().context(), uncontrolled.machine().context());
    }

    #[test]
    fn test_switching_to_uncontrolled_is_reported() {
        let (_, mut combobox) = fruits(ComboboxConfig::new().value("x"));
        assert!(matches!(
            combobox.sync_value(None),
            Err(ControlError::ModeSwitch { component: "Combobox", .. })
        ));
    }

    #[test]
    fn test_unmount_silences_everything() {
        let (host, mut combobox) = fruits(ComboboxConfig::new());
        combobox.input_changed("c");
        combobox.click_option("Cherry");
        combobox.blur();
        combobox.unmount();

        assert_eq!(combobox.tick(), 0);
        assert_eq!(combobox.paint(), 0);
        assert!(!combobox.send(ComboboxEvent::Focus).handled);
        assert_eq!(host.focus_log(), Vec::<u64>::new());
    }
}
