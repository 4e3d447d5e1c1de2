//! End-to-end exercises of [`LocalExecutor`]: racing sleeps through
//! [`select_any`], and waking a blocked reactor turn from a foreign OS
//! thread through [`PostHandle`].

use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use coro_reactor::{select_any, sleep, spawn, Executor, LocalExecutor};

#[test]
fn select_any_resolves_with_the_shorter_sleep_and_cancels_the_longer_one() {
    let executor = LocalExecutor::new().expect("building the executor should succeed");
    let start = Instant::now();
    let long_ran_to_completion = Arc::new(AtomicBool::new(false));

    let (winner, elapsed_ms) = {
        let long_ran_to_completion = long_ran_to_completion.clone();
        executor
            .block_on(async move {
                let long = spawn(async move {
                    sleep(Instant::now() + Duration::from_millis(500)).await;
                    long_ran_to_completion.store(true, Ordering::SeqCst);
                    Ok(0usize)
                });
                let short = spawn(async move {
                    sleep(Instant::now() + Duration::from_millis(20)).await;
                    Ok(1usize)
                });
                let (_index, result) = select_any(vec![long, short]).await.expect("non-empty set");
                result.map(|value| (value, start.elapsed().as_millis()))
            })
            .expect("select_any's winning task should not error")
    };

    assert_eq!(winner, 1);
    // Generous upper bound: this only needs to prove the 500ms sleep was
    // cancelled rather than awaited to completion.
    assert!(elapsed_ms < 300, "select_any waited {elapsed_ms}ms, longer sleep was not cancelled");

    // Keep driving the same executor well past the long sleep's original
    // 500ms deadline. If the loser's timer had merely been forgotten about
    // rather than actually cancelled, it would fire during this loop and
    // flip the flag -- proving `select_any` truly stops the loser instead
    // of just returning early while it keeps running in the background.
    executor
        .block_on(async move {
            sleep(Instant::now() + Duration::from_millis(600)).await;
            Ok(())
        })
        .expect("the follow-up sleep should not error");
    assert!(
        !long_ran_to_completion.load(Ordering::SeqCst),
        "the longer sleep fired after select_any returned -- it was not actually cancelled"
    );
}

#[test]
fn post_handle_wakes_a_reactor_turn_blocked_on_another_thread() {
    use coro_reactor::reactor::IoContext;

    let executor = LocalExecutor::new().expect("building the executor should succeed");
    let post_handle = executor.post_handle();
    let woken = Arc::new(AtomicBool::new(false));

    let handle = {
        let woken = woken.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            post_handle.post(Box::new(move || {
                woken.store(true, Ordering::SeqCst);
            }));
        })
    };

    let start = Instant::now();
    executor
        .reactor()
        .turn(Some(Duration::from_secs(5)))
        .expect("turn should return once the posted callback runs");
    let elapsed = start.elapsed();

    handle.join().expect("poster thread should not panic");
    assert!(woken.load(Ordering::SeqCst));
    assert!(elapsed < Duration::from_secs(5), "turn did not wake early for the posted callback");
    assert!(elapsed >= Duration::from_millis(30), "turn returned suspiciously before the post was even sent");

    // Keep the Rc-based executor alive (and unused-import-free) on the
    // main thread only -- nothing here sends it anywhere.
    let _ = Rc::strong_count(&executor);
}
