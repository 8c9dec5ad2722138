//! Tessel Core Runtime
//!
//! The interaction runtime behind Tessel's accessible widgets:
//!
//! - **Descendant Registry**: document-ordered indices for dynamically mounted items
//! - **State Machines**: guarded transition tables with entry/exit actions and delayed events
//! - **Typeahead**: buffered, timed prefix search over a registry
//! - **Controlled Values**: reconciling app-owned values through the normal transitions
//!
//! The runtime is single-threaded and never touches an element tree. The
//! rendering layer supplies an [`ElementHost`], calls into registries and
//! machines, and drives timers and deferred work from its own loop.
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use tessel_core::host::testing::RecordingHost;
//! use tessel_core::{DescendantRegistry, Direction, ItemMeta};
//!
//! let host = Rc::new(RecordingHost::new());
//! let mut registry = DescendantRegistry::new(host.clone());
//!
//! for (handle, name, disabled) in [(1, "A", false), (2, "B", true), (3, "C", false)] {
//!     host.mount(handle, handle * 10);
//!     registry.register(handle, disabled, ItemMeta::new(name), None).unwrap();
//! }
//!
//! // Disabled records are skipped but keep their index
//! let next = registry.navigate(Some(0), Direction::Next, false).unwrap();
//! assert_eq!(next.meta.value, "C");
//! assert_eq!(registry.at(1).unwrap().index, 1);
//! ```

pub mod config;
pub mod controlled;
pub mod error;
pub mod fsm;
pub mod host;
pub mod input;
pub mod registry;
pub mod timer;
pub mod typeahead;

pub use config::RuntimeConfig;
pub use controlled::{assert_no_mode_switch, is_controlled, ControlLink, ControlMode, ControlledState};
pub use error::{ConfigError, ControlError, MachineError, RegistryError, Result, TesselError};
pub use fsm::{
    Action, Guard, Machine, MachineBuilder, MachineDefinition, MachineEvent, StateNode,
    SubscriptionId, Transition, Transitioned,
};
pub use host::{ElementHost, Point, Rect, SharedHost};
pub use input::{Direction, Key, KeyPress, Modifiers, Orientation};
pub use registry::{
    Descendant, DescendantId, DescendantRegistry, ItemMeta, Labeled, SharedRegistry,
};
pub use timer::{Clock, ManualClock, SharedClock, SystemClock, TickId, TickQueue, TimerId, TimerQueue};
pub use typeahead::{find_match, TypeaheadBuffer, DEFAULT_TYPEAHEAD_TIMEOUT};
