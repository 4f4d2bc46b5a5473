//! Process-wide memory allocation tracer
//!
//! The tracemalloc-style facility behind the memory figures in every entry:
//! a counting allocator plus a single process-wide tracing window.
//!
//! [`TrackingAllocator`] wraps the system allocator and, while a window is
//! open, keeps current/peak counters of bytes allocated through it. Install
//! it once in the binary being profiled:
//!
//! ```rust,ignore
//! #[global_allocator]
//! static ALLOC: perfil::TrackingAllocator = perfil::TrackingAllocator::new();
//! ```
//!
//! Without the allocator installed the tracer still works but reports zero
//! traced memory.
//!
//! [`TraceSession`] is the exclusive token for the window. Only one session
//! can be active per process; `start()` blocks until the previous session
//! ends. The token releases the window on drop, including during a panic
//! unwind, so a failing instrumented call never leaks the tracer.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};

static TRACING: AtomicBool = AtomicBool::new(false);
// Current can dip below zero when a block allocated before the window is
// freed inside it; clamped at read time.
static CURRENT_BYTES: AtomicI64 = AtomicI64::new(0);
static PEAK_BYTES: AtomicI64 = AtomicI64::new(0);

#[inline]
fn record_alloc(size: usize) {
    if !TRACING.load(Ordering::SeqCst) {
        return;
    }
    let now = CURRENT_BYTES.fetch_add(size as i64, Ordering::Relaxed) + size as i64;
    PEAK_BYTES.fetch_max(now, Ordering::Relaxed);
}

#[inline]
fn record_dealloc(size: usize) {
    if !TRACING.load(Ordering::SeqCst) {
        return;
    }
    CURRENT_BYTES.fetch_sub(size as i64, Ordering::Relaxed);
}

/// Counting allocator wrapping the system allocator.
///
/// Pass-through when no tracing window is open.
pub struct TrackingAllocator;

impl TrackingAllocator {
    /// Create the allocator; `const` so it can back a `#[global_allocator]`
    /// static.
    pub const fn new() -> Self {
        TrackingAllocator
    }
}

impl Default for TrackingAllocator {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        record_dealloc(layout.size());
        unsafe { System.dealloc(ptr, layout) }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { System.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            record_dealloc(layout.size());
            record_alloc(new_size);
        }
        new_ptr
    }
}

struct TracerGate {
    busy: Mutex<bool>,
    freed: Condvar,
}

static GATE: TracerGate = TracerGate {
    busy: Mutex::new(false),
    freed: Condvar::new(),
};

/// Exclusive token for the process-wide tracing window.
///
/// Holds no lock guard, so it is `Send` and may be kept across `.await`
/// points while an instrumented future runs.
pub struct TraceSession {
    _private: (),
}

impl TraceSession {
    /// Open the tracing window, blocking until any other session has ended.
    ///
    /// Counters are reset to zero, so traced memory reflects only
    /// allocations made inside this window.
    pub fn start() -> Self {
        let mut busy = GATE.busy.lock().unwrap_or_else(PoisonError::into_inner);
        while *busy {
            busy = GATE
                .freed
                .wait(busy)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *busy = true;
        drop(busy);

        CURRENT_BYTES.store(0, Ordering::Relaxed);
        PEAK_BYTES.store(0, Ordering::Relaxed);
        TRACING.store(true, Ordering::SeqCst);

        TraceSession { _private: () }
    }

    /// Current and peak bytes allocated since the window opened.
    ///
    /// Negative excursions (frees of pre-window blocks) are clamped to zero,
    /// and the peak is never reported below the current value.
    pub fn traced_memory(&self) -> (u64, u64) {
        let current = CURRENT_BYTES.load(Ordering::Relaxed).max(0) as u64;
        let peak = PEAK_BYTES.load(Ordering::Relaxed).max(0) as u64;
        (current, peak.max(current))
    }
}

impl Drop for TraceSession {
    fn drop(&mut self) {
        TRACING.store(false, Ordering::SeqCst);
        let mut busy = GATE.busy.lock().unwrap_or_else(PoisonError::into_inner);
        *busy = false;
        GATE.freed.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::hint::black_box;
    use std::time::{Duration, Instant};

    // The lib test binary installs TrackingAllocator (see lib.rs), so these
    // tests observe real counter movement.

    #[test]
    fn test_session_tracks_allocation_peak() {
        let session = TraceSession::start();
        let buf: Vec<u8> = black_box(vec![7u8; 512 * 1024]);
        let (_, peak) = session.traced_memory();
        assert!(
            peak >= 512 * 1024,
            "peak {peak} should cover the 512 KiB buffer"
        );
        drop(buf);
        let (current, peak_after) = session.traced_memory();
        assert!(peak_after >= 512 * 1024);
        assert!(current <= peak_after);
    }

    #[test]
    fn test_counters_reset_between_sessions() {
        {
            let session = TraceSession::start();
            let _buf: Vec<u8> = black_box(vec![1u8; 256 * 1024]);
            let (_, peak) = session.traced_memory();
            assert!(peak >= 256 * 1024);
        }
        let session = TraceSession::start();
        // Parallel test threads may allocate a little while the window is
        // open; the 256 KiB from the previous window must be gone though.
        let (_, peak) = session.traced_memory();
        assert!(peak < 256 * 1024, "peak {peak} survived the reset");
    }

    #[test]
    fn test_sessions_are_exclusive() {
        let first = TraceSession::start();
        let hold = Duration::from_millis(50);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        let handle = std::thread::spawn(move || {
            ready_tx.send(()).unwrap();
            let started = Instant::now();
            let _second = TraceSession::start();
            started.elapsed()
        });

        ready_rx.recv().unwrap();
        std::thread::sleep(hold);
        drop(first);
        let waited = handle.join().unwrap();
        assert!(
            waited >= hold - Duration::from_millis(10),
            "second session started after {waited:?}, before the first ended"
        );
    }

    #[test]
    fn test_session_released_on_panic() {
        let result = std::panic::catch_unwind(|| {
            let _session = TraceSession::start();
            panic!("instrumented call failed");
        });
        assert!(result.is_err());
        // Would deadlock if the panicking session leaked the window.
        let _session = TraceSession::start();
    }
}
