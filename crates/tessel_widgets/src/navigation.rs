//! Plumbing shared by every widget controller
//!
//! [`Capabilities`] is the bundle a controller receives from the rendering
//! layer: the element host, the clock and the runtime configuration. Nothing
//! is looked up globally.
//!
//! [`FocusQueue`] holds focus moves until the next paint, when the element
//! they target is guaranteed to be committed.
//!
//! [`DeferredBlur`] holds a blur back for a few scheduling ticks so a click
//! or focus landing inside the widget in the same tick can cancel it.

use std::rc::Rc;

use tessel_core::registry::{DescendantRegistry, ItemMeta};
use tessel_core::timer::{SharedClock, TickId, TickQueue};
use tessel_core::{ElementHost, RuntimeConfig, SharedHost, SystemClock};

/// Host, clock and configuration handed to controllers at construction
pub struct Capabilities<H> {
    pub host: SharedHost<H>,
    pub clock: SharedClock,
    pub config: RuntimeConfig,
}

impl<H> Clone for Capabilities<H> {
    fn clone(&self) -> Self {
        Self {
            host: Rc::clone(&self.host),
            clock: Rc::clone(&self.clock),
            config: self.config.clone(),
        }
    }
}

impl<H> Capabilities<H> {
    pub fn new(host: SharedHost<H>, clock: SharedClock) -> Self {
        Self {
            host,
            clock,
            config: RuntimeConfig::default(),
        }
    }

    /// Capabilities on the wall clock
    pub fn with_system_clock(host: SharedHost<H>) -> Self {
        Self::new(host, Rc::new(SystemClock))
    }

    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }
}

/// Focus requests waiting for the next paint
pub struct FocusQueue<H> {
    pending: TickQueue<H>,
}

impl<H> Default for FocusQueue<H> {
    fn default() -> Self {
        Self {
            pending: TickQueue::new(),
        }
    }
}

impl<H> FocusQueue<H> {
    pub fn request(&mut self, handle: H) -> TickId {
        self.pending.defer(handle)
    }

    pub fn cancel(&mut self, id: TickId) {
        self.pending.cancel(id);
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Apply pending focus moves in request order, returns how many ran
    pub fn flush(&mut self, host: &dyn ElementHost<H>) -> usize {
        let handles = self.pending.drain();
        for handle in &handles {
            host.focus(handle);
        }
        handles.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// A blur waiting for its scheduling ticks to run out
#[derive(Default)]
pub struct DeferredBlur {
    /// Remaining ticks for the pending blur
    ticks: TickQueue<u32>,
    pending: Option<TickId>,
}

impl DeferredBlur {
    /// Schedule a blur `ticks` ticks from now, replacing any pending one
    ///
    /// At least one tick always passes.
    pub fn defer(&mut self, ticks: u32) {
        self.cancel();
        self.pending = Some(self.ticks.defer(ticks.max(1)));
    }

    /// Drop the pending blur, returns whether there was one
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(id) => {
                self.ticks.cancel(id);
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Advance one tick, returns whether the blur is now due
    pub fn tick(&mut self) -> bool {
        let mut due = false;
        for remaining in self.ticks.drain() {
            if remaining > 1 {
                self.pending = Some(self.ticks.defer(remaining - 1));
            } else {
                self.pending = None;
                due = true;
            }
        }
        due
    }

    pub fn clear(&mut self) {
        self.ticks.clear();
        self.pending = None;
    }
}

/// Index of the record whose value is `value`
pub fn index_of_value<H: Clone>(registry: &DescendantRegistry<H, ItemMeta>, value: &str) -> Option<usize> {
    registry.find_by(|meta| meta.value == value).map(|d| d.index)
}

/// Whether `value` names an enabled record
pub fn is_enabled_value<H: Clone>(registry: &DescendantRegistry<H, ItemMeta>, value: &str) -> bool {
    registry
        .find_by(|meta| meta.value == value)
        .is_some_and(|d| !d.disabled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_core::host::testing::RecordingHost;

    #[test]
    fn test_focus_queue_flushes_in_order() {
        let host = RecordingHost::new();
        let mut queue = FocusQueue::default();
        queue.request(1);
        let skipped = queue.request(2);
        queue.request(3);
        queue.cancel(skipped);

        assert_eq!(queue.flush(&host), 2);
        assert_eq!(host.focus_log(), vec![1, 3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_deferred_blur_counts_ticks() {
        let mut blur = DeferredBlur::default();
        blur.defer(2);
        assert!(!blur.tick());
        assert!(blur.is_pending());
        assert!(blur.tick());
        assert!(!blur.is_pending());

        blur.defer(0);
        assert!(blur.cancel());
        assert!(!blur.tick());
        assert!(!blur.cancel());
    }

    #[test]
    fn test_value_lookup() {
        let host = Rc::new(RecordingHost::new());
        let mut registry = DescendantRegistry::new(host.clone());
        host.mount(1, 1);
        host.mount(2, 2);
        registry.register(1, false, ItemMeta::new("a"), None).unwrap();
        registry.register(2, true, ItemMeta::new("b"), None).unwrap();

        assert_eq!(index_of_value(&registry, "b"), Some(1));
        assert!(is_enabled_value(&registry, "a"));
        assert!(!is_enabled_value(&registry, "b"));
        assert!(!is_enabled_value(&registry, "zzz"));
    }
}
