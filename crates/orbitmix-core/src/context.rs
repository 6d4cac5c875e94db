//! Process-wide default host.
//!
//! Components never look the host up on their own; the engine builder
//! resolves a context once, falling back to the process default here, and
//! passes it down.

use crate::headless::HeadlessContext;
use crate::node::AudioContext;
use parking_lot::RwLock;
use std::sync::Arc;

/// Sample rate of a lazily created default host.
pub const DEFAULT_SAMPLE_RATE: f64 = 48000.0;

static DEFAULT_CONTEXT: RwLock<Option<Arc<dyn AudioContext>>> = parking_lot::const_rwlock(None);

/// Replace the process-wide default host.
pub fn install_default_context(context: Arc<dyn AudioContext>) {
    tracing::debug!(sample_rate = context.sample_rate(), "installing default audio context");
    *DEFAULT_CONTEXT.write() = Some(context);
}

/// The process-wide default host, created on first use as a headless host
/// at [`DEFAULT_SAMPLE_RATE`].
pub fn default_context() -> Arc<dyn AudioContext> {
    if let Some(context) = DEFAULT_CONTEXT.read().as_ref() {
        return Arc::clone(context);
    }

    let mut slot = DEFAULT_CONTEXT.write();
    // Another thread may have won the race between the two locks.
    if let Some(context) = slot.as_ref() {
        return Arc::clone(context);
    }
    let context: Arc<dyn AudioContext> = Arc::new(HeadlessContext::new(DEFAULT_SAMPLE_RATE));
    *slot = Some(Arc::clone(&context));
    context
}

/// Forget the default host. The next [`default_context`] call creates a new one.
pub fn reset_default_context() {
    *DEFAULT_CONTEXT.write() = None;
}

/// Clock of the default host, in seconds.
pub fn current_time() -> f64 {
    default_context().current_time()
}
