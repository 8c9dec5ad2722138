//! Controlled and uncontrolled values
//!
//! A widget value is either owned by the widget itself (uncontrolled) or
//! supplied by the application on every render (controlled). Which one is
//! decided once, when the widget is created, from whether an external value
//! was supplied. Switching later is a programming error.
//!
//! A controlled value is pushed into the widget through
//! [`ControlLink::reconcile`], once per external input. When it differs from
//! the machine's context, reconcile sends the same event a user-driven change
//! would send, so derived context (highlight, typeahead) stays identical in
//! both modes.

use std::fmt;
use std::hash::Hash;

use crate::error::ControlError;
use crate::fsm::{Machine, MachineEvent, Transitioned};

/// Who owns a widget value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ControlMode {
    Controlled,
    Uncontrolled,
}

impl ControlMode {
    pub fn of<T>(external: Option<&T>) -> Self {
        if external.is_some() {
            ControlMode::Controlled
        } else {
            ControlMode::Uncontrolled
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlMode::Controlled => f.write_str("controlled"),
            ControlMode::Uncontrolled => f.write_str("uncontrolled"),
        }
    }
}

/// Whether an initial external value makes the widget controlled
pub fn is_controlled<T>(initial_external: Option<&T>) -> bool {
    initial_external.is_some()
}

/// Report a controlled/uncontrolled switch after creation
pub fn assert_no_mode_switch(
    component: &'static str,
    was_controlled: bool,
    is_controlled_now: bool,
) -> Result<(), ControlError> {
    if was_controlled == is_controlled_now {
        return Ok(());
    }
    let mode = |controlled| {
        if controlled {
            ControlMode::Controlled
        } else {
            ControlMode::Uncontrolled
        }
    };
    let (from, to) = (mode(was_controlled), mode(is_controlled_now));
    tracing::warn!(component, %from, %to, "widget switched between controlled and uncontrolled");
    Err(ControlError::ModeSwitch {
        component,
        from,
        to,
    })
}

/// Link between an external value and a machine's context
#[derive(Clone, Debug, PartialEq)]
pub struct ControlLink<T> {
    mode: ControlMode,
    last_external: Option<T>,
    component: &'static str,
}

impl<T: Clone + PartialEq> ControlLink<T> {
    /// Fix the mode from the first external value
    pub fn new(component: &'static str, initial_external: Option<T>) -> Self {
        Self {
            mode: ControlMode::of(initial_external.as_ref()),
            last_external: initial_external,
            component,
        }
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn is_controlled(&self) -> bool {
        self.mode == ControlMode::Controlled
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    pub fn last_external(&self) -> Option<&T> {
        self.last_external.as_ref()
    }

    /// Validate an incoming external value against the mode fixed at creation
    pub fn check(&self, external: Option<&T>) -> Result<(), ControlError> {
        assert_no_mode_switch(self.component, self.is_controlled(), external.is_some())
    }

    /// Bring the machine in line with the external value
    ///
    /// Uncontrolled links never send anything. A controlled link sends
    /// `event(value)` only when `current(context)` differs from the external
    /// value, so feeding the same value twice is a no-op.
    pub fn reconcile<S, C, E>(
        &mut self,
        machine: &mut Machine<S, C, E>,
        external: Option<T>,
        current: impl FnOnce(&C) -> T,
        event: impl FnOnce(T) -> E,
    ) -> Result<Option<Transitioned<S>>, ControlError>
    where
        S: Copy + Eq + Hash + fmt::Debug,
        C: Clone + PartialEq,
        E: MachineEvent + Clone,
    {
        self.check(external.as_ref())?;
        let Some(value) = external else {
            return Ok(None);
        };
        self.last_external = Some(value.clone());
        if current(machine.context()) == value {
            return Ok(None);
        }
        Ok(Some(machine.send(event(value))))
    }
}

/// Change notification handed to the application
pub type OnChange<T> = Box<dyn FnMut(&T)>;

/// A [`ControlLink`] paired with the application's change callback
///
/// User-driven changes go through [`ControlledState::request`]: the
/// application is always notified, and the widget applies the value itself
/// only when it is uncontrolled. A controlled widget waits for the value to
/// come back through [`ControlledState::sync`].
pub struct ControlledState<T> {
    link: ControlLink<T>,
    on_change: Option<OnChange<T>>,
}

impl<T: Clone + PartialEq> ControlledState<T> {
    pub fn new(component: &'static str, initial_external: Option<T>) -> Self {
        Self {
            link: ControlLink::new(component, initial_external),
            on_change: None,
        }
    }

    pub fn with_on_change(mut self, on_change: impl FnMut(&T) + 'static) -> Self {
        self.on_change = Some(Box::new(on_change));
        self
    }

    pub fn set_on_change(&mut self, on_change: impl FnMut(&T) + 'static) {
        self.on_change = Some(Box::new(on_change));
    }

    pub fn is_controlled(&self) -> bool {
        self.link.is_controlled()
    }

    pub fn link(&self) -> &ControlLink<T> {
        &self.link
    }

    /// The external value when controlled, otherwise `fallback`
    pub fn value_or(&self, fallback: T) -> T {
        match self.link.last_external() {
            Some(value) if self.is_controlled() => value.clone(),
            _ => fallback,
        }
    }

    /// A user asked for `value`; returns whether the widget should apply it
    pub fn request(&mut self, value: &T) -> bool {
        if let Some(on_change) = self.on_change.as_mut() {
            on_change(value);
        }
        !self.is_controlled()
    }

    /// Reconcile the machine with the application's value
    pub fn sync<S, C, E>(
        &mut self,
        machine: &mut Machine<S, C, E>,
        external: Option<T>,
        current: impl FnOnce(&C) -> T,
        event: impl FnOnce(T) -> E,
    ) -> Result<Option<Transitioned<S>>, ControlError>
    where
        S: Copy + Eq + Hash + fmt::Debug,
        C: Clone + PartialEq,
        E: MachineEvent + Clone,
    {
        self.link.reconcile(machine, external, current, event)
    }
}
