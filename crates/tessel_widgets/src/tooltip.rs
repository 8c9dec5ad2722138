//! Process-wide tooltip suppression
//!
//! While a menu is open, tooltips must not appear. This is the only piece of
//! state shared across widget instances. It is a counter rather than a flag
//! so nested menus stack, and it is only reachable through an RAII guard so
//! every acquire is paired with a release, including on abnormal teardown.

use std::sync::atomic::{AtomicUsize, Ordering};

static SUPPRESSORS: AtomicUsize = AtomicUsize::new(0);

/// Whether any open menu currently suppresses tooltips
pub fn tooltips_suppressed() -> bool {
    SUPPRESSORS.load(Ordering::Acquire) > 0
}

/// Keeps tooltips suppressed until dropped
#[must_use = "tooltips are only suppressed while the guard is alive"]
#[derive(Debug)]
pub struct TooltipSuppression {
    _private: (),
}

impl TooltipSuppression {
    pub fn acquire() -> Self {
        let previous = SUPPRESSORS.fetch_add(1, Ordering::AcqRel);
        tracing::trace!(active = previous + 1, "tooltips suppressed");
        Self { _private: () }
    }
}

impl Drop for TooltipSuppression {
    fn drop(&mut self) {
        let previous = SUPPRESSORS.fetch_sub(1, Ordering::AcqRel);
        tracing::trace!(active = previous - 1, "tooltip suppression released");
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Mutex, MutexGuard};

    static SERIAL: Mutex<()> = Mutex::new(());

    /// Serializes tests that observe the process-wide flag
    pub(crate) fn serial() -> MutexGuard<'static, ()> {
        SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
