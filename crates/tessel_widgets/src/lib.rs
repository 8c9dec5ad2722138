//! Tessel Widget Controllers
//!
//! Headless controllers for accessible widgets, built on `tessel_core`.
//! Each controller owns one state machine and translates raw input into
//! events. Focus moves are queued and applied when the rendering layer calls
//! `paint()`; delayed work is fired from `poll()` or `tick()`.
//!
//! # Available Controllers
//!
//! - [`Combobox`] - text input with a suggestion popover
//! - [`Listbox`] - button revealing a single-select list
//! - [`MenuButton`] - button revealing a menu of actions
//! - [`Tabs`] - tab list selecting one panel
//! - [`Accordion`] - stacked headers expanding their panels
//! - [`Slider`] - single thumb on a measured track
//!
//! Every controller takes a [`Capabilities`] bundle: the element host, the
//! clock and the runtime configuration.

pub mod accordion;
pub mod combobox;
pub mod listbox;
pub mod menu_button;
pub mod navigation;
pub mod slider;
pub mod tabs;
pub mod tooltip;

pub use accordion::{Accordion, AccordionConfig, AccordionEvent, AccordionState};
pub use combobox::{Combobox, ComboboxConfig, ComboboxEvent, ComboboxState, NavigateTo};
pub use listbox::{Listbox, ListboxConfig, ListboxEvent, ListboxState};
pub use menu_button::{MenuButton, MenuButtonConfig, MenuEvent, MenuState};
pub use navigation::{Capabilities, FocusQueue};
pub use slider::{Slider, SliderConfig, SliderEvent, SliderState};
pub use tabs::{Activation, Tabs, TabsConfig, TabsEvent, TabsState};
pub use tooltip::{tooltips_suppressed, TooltipSuppression};
