//! Slider controller - a single thumb on a measured track
//!
//! Pointer positions are mapped onto the value range using the track's
//! bounds from [`ElementHost::measure`](tessel_core::ElementHost::measure).
//! Every value, whether from the pointer, the keyboard or the application, is
//! clamped to `min..=max` and snapped to `step`.

use std::rc::Rc;

use tessel_core::controlled::ControlledState;
use tessel_core::fsm::{Machine, MachineDefinition, MachineEvent, Transition, Transitioned};
use tessel_core::host::Point;
use tessel_core::input::{Key, KeyPress, Orientation};
use tessel_core::{ConfigError, ControlError, MachineError};

use crate::navigation::{Capabilities, FocusQueue};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SliderState {
    Idle,
    /// The pointer holds the thumb
    Dragging,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SliderEvent {
    PointerDown,
    PointerUp,
    SetValue(f64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SliderEventKind {
    PointerDown,
    PointerUp,
    SetValue,
}

impl MachineEvent for SliderEvent {
    type Kind = SliderEventKind;

    fn kind(&self) -> SliderEventKind {
        match self {
            SliderEvent::PointerDown => SliderEventKind::PointerDown,
            SliderEvent::PointerUp => SliderEventKind::PointerUp,
            SliderEvent::SetValue(_) => SliderEventKind::SetValue,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SliderContext {
    pub value: f64,
}

pub type SliderMachine = Machine<SliderState, SliderContext, SliderEvent>;

type Step = Transition<SliderState, SliderContext, SliderEvent>;

#[derive(Clone, Debug)]
pub struct SliderConfig {
    pub min: f64,
    pub max: f64,
    /// Snap interval, continuous when `None`
    pub step: Option<f64>,
    /// Increment for PageUp/PageDown, a tenth of the range by default
    pub page_step: Option<f64>,
    pub orientation: Orientation,
    pub disabled: bool,
    /// Controlled value
    pub value: Option<f64>,
    pub default_value: Option<f64>,
}

impl Default for SliderConfig {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 100.0,
            step: Some(1.0),
            page_step: None,
            orientation: Orientation::Horizontal,
            disabled: false,
            value: None,
            default_value: None,
        }
    }
}

impl SliderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum value (default: 0.0)
    pub fn min(mut self, min: f64) -> Self {
        self.min = min;
        self
    }

    /// Set the maximum value (default: 100.0)
    pub fn max(mut self, max: f64) -> Self {
        self.max = max;
        self
    }

    pub fn step(mut self, step: f64) -> Self {
        self.step = Some(step);
        self
    }

    pub fn continuous(mut self) -> Self {
        self.step = None;
        self
    }

    pub fn page_step(mut self, page_step: f64) -> Self {
        self.page_step = Some(page_step);
        self
    }

    pub fn vertical(mut self) -> Self {
        self.orientation = Orientation::Vertical;
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn default_value(mut self, value: f64) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min < self.max) {
            return Err(ConfigError::Invalid(format!(
                "slider min ({}) must be below max ({})",
                self.min, self.max
            )));
        }
        if self.step.is_some_and(|step| !(step > 0.0)) {
            return Err(ConfigError::Invalid("slider step must be positive".into()));
        }
        if self.page_step.is_some_and(|step| !(step > 0.0)) {
            return Err(ConfigError::Invalid("slider page step must be positive".into()));
        }
        Ok(())
    }

    /// Clamp to the range and snap to the nearest step
    pub fn round_to_step(&self, value: f64) -> f64 {
        let clamped = value.clamp(self.min, self.max);
        let snapped = match self.step {
            Some(step) => {
                let steps = ((clamped - self.min) / step).round();
                (self.min + steps * step).clamp(self.min, self.max)
            }
            None => clamped,
        };
        // Drop float noise such as 0.30000000000000004
        (snapped * 1e10).round() / 1e10
    }

    fn key_step(&self) -> f64 {
        self.step.unwrap_or((self.max - self.min) / 100.0)
    }

    fn page_increment(&self) -> f64 {
        self.page_step
            .unwrap_or_else(|| ((self.max - self.min) / 10.0).max(self.key_step()))
    }
}

fn set_value(c: &mut SliderContext, e: &SliderEvent) {
    if let SliderEvent::SetValue(value) = e {
        c.value = *value;
    }
}

pub fn definition() -> Result<MachineDefinition<SliderState, SliderContext, SliderEvent>, MachineError> {
    use SliderEventKind as K;
    use SliderState::*;

    MachineDefinition::builder(Idle)
        .state(Idle, |s| {
            s.on(K::PointerDown, Step::to(Dragging))
                .on(K::SetValue, Step::internal().action(set_value))
        })
        .state(Dragging, |s| {
            s.on(K::PointerUp, Step::to(Idle))
                .on(K::SetValue, Step::internal().action(set_value))
        })
        .build()
}

/// A live slider
pub struct Slider<H> {
    machine: SliderMachine,
    caps: Capabilities<H>,
    config: SliderConfig,
    value: ControlledState<f64>,
    track: Option<H>,
    thumb: Option<H>,
    focus: FocusQueue<H>,
}

impl<H: Clone + 'static> Slider<H> {
    pub fn new(caps: Capabilities<H>, config: SliderConfig) -> tessel_core::Result<Self> {
        config.validate()?;
        let initial = config
            .value
            .or(config.default_value)
            .unwrap_or(config.min);
        let context = SliderContext {
            value: config.round_to_step(initial),
        };
        let machine = Machine::new(Rc::new(definition()?), context, caps.clock.clone());
        let value = ControlledState::new("Slider", config.value);

        Ok(Self {
            machine,
            caps,
            config,
            value,
            track: None,
            thumb: None,
            focus: FocusQueue::default(),
        })
    }

    pub fn set_track(&mut self, handle: H) {
        self.track = Some(handle);
    }

    pub fn set_thumb(&mut self, handle: H) {
        self.thumb = Some(handle);
    }

    /// Called with the value a user asked for
    pub fn on_change(&mut self, callback: impl FnMut(&f64) + 'static) {
        self.value.set_on_change(callback);
    }

    pub fn state(&self) -> SliderState {
        self.machine.state()
    }

    pub fn value(&self) -> f64 {
        self.machine.context().value
    }

    pub fn is_dragging(&self) -> bool {
        self.machine.matches(SliderState::Dragging)
    }

    pub fn config(&self) -> &SliderConfig {
        &self.config
    }

    pub fn machine(&self) -> &SliderMachine {
        &self.machine
    }

    /// Map a pointer position onto the value range
    ///
    /// Vertical sliders grow upwards. Returns `None` while the track has no
    /// bounds.
    pub fn value_at(&self, point: Point) -> Option<f64> {
        let rect = self.track.as_ref().and_then(|track| self.caps.host.measure(track))?;
        let ratio = match self.config.orientation {
            Orientation::Horizontal if rect.width > 0.0 => (point.x - rect.x) / rect.width,
            Orientation::Vertical if rect.height > 0.0 => 1.0 - (point.y - rect.y) / rect.height,
            _ => return None,
        };
        let ratio = f64::from(ratio.clamp(0.0, 1.0));
        Some(self.config.round_to_step(self.config.min + ratio * (self.config.max - self.config.min)))
    }

    pub fn pointer_down(&mut self, point: Point) -> Option<Transitioned<SliderState>> {
        if self.config.disabled {
            return None;
        }
        let value = self.value_at(point)?;
        let outcome = self.machine.send(SliderEvent::PointerDown);
        if let Some(thumb) = self.thumb.clone() {
            self.focus.request(thumb);
        }
        self.commit(value);
        Some(outcome)
    }

    pub fn pointer_move(&mut self, point: Point) -> Option<Transitioned<SliderState>> {
        if !self.is_dragging() {
            return None;
        }
        let value = self.value_at(point)?;
        self.commit(value)
    }

    pub fn pointer_up(&mut self) -> Transitioned<SliderState> {
        self.machine.send(SliderEvent::PointerUp)
    }

    /// Handle a key on the thumb, returns whether it was consumed
    pub fn key_down(&mut self, press: impl Into<KeyPress>) -> bool {
        let press = press.into();
        if self.config.disabled || press.modifiers.has_command() {
            return false;
        }
        let current = self.value();
        let target = match press.key {
            Key::Right | Key::Up => current + self.config.key_step(),
            Key::Left | Key::Down => current - self.config.key_step(),
            Key::PageUp => current + self.config.page_increment(),
            Key::PageDown => current - self.config.page_increment(),
            Key::Home => self.config.min,
            Key::End => self.config.max,
            _ => return false,
        };
        self.commit(target);
        true
    }

    /// The user asked for `value`
    ///
    /// An uncontrolled slider moves right away; a controlled one notifies the
    /// application and waits for [`Slider::sync_value`].
    fn commit(&mut self, value: f64) -> Option<Transitioned<SliderState>> {
        let value = self.config.round_to_step(value);
        if value == self.value() {
            return None;
        }
        if self.value.request(&value) {
            Some(self.machine.send(SliderEvent::SetValue(value)))
        } else {
            None
        }
    }

    /// Reconcile with the application's value, once per render
    pub fn sync_value(
        &mut self,
        external: Option<f64>,
    ) -> Result<Option<Transitioned<SliderState>>, ControlError> {
        let external = external.map(|value| self.config.round_to_step(value));
        self.value
            .sync(&mut self.machine, external, |c| c.value, SliderEvent::SetValue)
    }

    pub fn paint(&mut self) -> usize {
        self.focus.flush(&*self.caps.host)
    }

    pub fn unmount(&mut self) {
        self.machine.stop();
        self.focus.clear();
    }
}
