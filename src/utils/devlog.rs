//! Developer logging ("level 6") with a thread-local sink, so tests can assert
//! on exactly which store calls a builder issued.

use std::cell::RefCell;
use std::time::Instant;

pub const DEV_TARGET: &str = "firestore_driver::dev6";

thread_local! {
    static TL_SINK: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

/// Disables the thread-local sink on drop.
pub struct DevSinkGuard;

impl Drop for DevSinkGuard {
    fn drop(&mut self) {
        TL_SINK.with(|s| *s.borrow_mut() = None);
    }
}

/// Starts capturing dev6 lines on the current thread.
pub fn enable_thread_sink() -> DevSinkGuard {
    TL_SINK.with(|s| *s.borrow_mut() = Some(Vec::new()));
    DevSinkGuard
}

pub fn write_str(msg: &str) {
    TL_SINK.with(|s| {
        if let Some(buf) = s.borrow_mut().as_mut() {
            buf.push(msg.to_owned());
        }
    });
}

/// Returns and clears the lines captured on this thread.
pub fn drain() -> Vec<String> {
    TL_SINK.with(|s| s.borrow_mut().as_mut().map(std::mem::take).unwrap_or_default())
}

pub fn snapshot() -> Vec<String> {
    TL_SINK.with(|s| s.borrow().as_ref().cloned().unwrap_or_default())
}

/// Captured bench lines parsed back into JSON, skipping anything else.
pub fn bench_records() -> Vec<serde_json::Value> {
    snapshot().iter().filter_map(|l| serde_json::from_str(l).ok()).collect()
}

/// Emits one bench line for a finished store call.
pub fn bench(op: &str, collection: &str, started: Instant, result_count: usize) {
    let line = serde_json::json!({
        "bench": "query",
        "op": op,
        "collection": collection,
        "duration_ms": u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "result_count": result_count,
    });
    crate::dev6!("{line}");
}

#[macro_export]
macro_rules! dev6 {
    ($($arg:tt)*) => {{
        let __s = format!($($arg)*);
        $crate::utils::devlog::write_str(&__s);
        log::log!(target: $crate::utils::devlog::DEV_TARGET, log::Level::Trace, "{}", __s);
    }};
}
