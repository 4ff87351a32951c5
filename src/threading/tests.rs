//! Unit tests for the threading module

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Thread Tests
// ============================================================================

/// Test basic thread spawn and join
#[test]
fn test_thread_spawn_and_join() {
    let counter = Arc::new(AtomicUsize::new(0));
    let counter_clone = Arc::clone(&counter);

    let thread = Thread::spawn("test_worker", move || {
        for _ in 0..10 {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        }
    })
    .expect("Thread spawn should succeed");

    thread.join().expect("Thread join should succeed");
    assert_eq!(counter.load(Ordering::SeqCst), 10);
}

/// Test thread spawn with return value
#[test]
fn test_thread_spawn_with_return_value() {
    let thread = Thread::spawn("compute_thread", || (1..=5).product::<u32>())
        .expect("Thread spawn should succeed");

    let result = thread.join().expect("Thread join should succeed");
    assert_eq!(result, 120);
}

/// Test thread name is preserved
#[test]
fn test_thread_name() {
    let thread = Thread::spawn("named_thread", || {
        std::thread::current().name().map(String::from)
    })
    .expect("Thread spawn should succeed");

    assert_eq!(thread.name(), "named_thread");
    let seen = thread.join().expect("Thread join should succeed");
    assert_eq!(seen.as_deref(), Some("named_thread"));
}

/// A panicking worker is reported at join time instead of unwinding into the owner
#[test]
fn test_panicking_thread_reports_join_failure() {
    let thread = Thread::spawn("doomed", || {
        panic!("worker blew up");
    })
    .expect("Thread spawn should succeed");

    match thread.join() {
        Err(ThreadError::JoinFailed(msg)) => assert!(msg.contains("doomed")),
        other => panic!("expected JoinFailed, got {:?}", other.map(|_| ())),
    }
}

// ============================================================================
// Stop Signal Tests
// ============================================================================

/// A worker loop exits once the shared signal is raised
#[test]
fn test_stop_signal_stops_worker_loop() {
    let signal = StopSignal::new();
    let worker_signal = signal.clone();
    let iterations = Arc::new(AtomicUsize::new(0));
    let iterations_clone = Arc::clone(&iterations);

    let thread = Thread::spawn("looping", move || {
        while !worker_signal.is_stopped() {
            iterations_clone.fetch_add(1, Ordering::SeqCst);
            hibernate_thread(Duration::from_millis(1));
        }
    })
    .expect("Thread spawn should succeed");

    hibernate_thread(Duration::from_millis(20));
    assert!(thread.is_running());
    signal.stop();
    thread.join().expect("Thread join should succeed");

    assert!(signal.is_stopped());
    assert!(iterations.load(Ordering::SeqCst) > 0);
}
