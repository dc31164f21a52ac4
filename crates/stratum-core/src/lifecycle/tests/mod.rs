// Lifecycle test module
use std::sync::{Arc, Mutex};

use crate::event::EventBus;
use crate::kernel::error::Error;
use crate::lifecycle::HookSpec;


pub(super) type Trace = Arc<Mutex<Vec<String>>>;

pub(super) fn trace() -> Trace {
    Arc::new(Mutex::new(Vec::new()))
}

pub(super) fn entries(trace: &Trace) -> Vec<String> {
    trace.lock().unwrap().clone()
}

/// Hook that appends `label` to the trace
pub(super) fn recording_hook(phase: &str, label: &str, trace: &Trace) -> HookSpec {
    let trace = Arc::clone(trace);
    let label = label.to_string();
    HookSpec::new(phase, move || {
        let trace = Arc::clone(&trace);
        let label = label.clone();
        async move {
            trace.lock().unwrap().push(label);
            Ok::<(), Error>(())
        }
    })
}

/// Hook that records `label` and then fails
pub(super) fn failing_hook(phase: &str, label: &str, trace: &Trace) -> HookSpec {
    let trace = Arc::clone(trace);
    let label = label.to_string();
    HookSpec::new(phase, move || {
        let trace = Arc::clone(&trace);
        let label = label.clone();
        async move {
            trace.lock().unwrap().push(label.clone());
            Err::<(), Error>(Error::Other(format!("{} exploded", label)))
        }
    })
}

pub(super) fn event_types(bus: &EventBus) -> Vec<String> {
    bus.history(None).iter().map(|e| e.event_type.clone()).collect()
}
