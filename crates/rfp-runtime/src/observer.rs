//! Lifecycle fan-out.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rfp_core::{InvocationId, LifecycleObserver, LifecyclePhase};

/// The observers attached to an adapter, shared with every context it creates.
#[derive(Clone, Default)]
pub(crate) struct Observers(Arc<Vec<Arc<dyn LifecycleObserver>>>);

impl Observers {
    pub(crate) fn push(&mut self, observer: Arc<dyn LifecycleObserver>) {
        let mut list = self.0.as_ref().clone();
        list.push(observer);
        self.0 = Arc::new(list);
    }

    pub(crate) fn emit(&self, id: &InvocationId, phase: LifecyclePhase, elapsed: Duration) {
        tracing::trace!(invocation = %id, ?phase, elapsed_us = elapsed.as_micros() as u64, "phase");
        for observer in self.0.iter() {
            observer.on_phase(id.as_str(), &phase, elapsed);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Observers({})", self.len())
    }
}
