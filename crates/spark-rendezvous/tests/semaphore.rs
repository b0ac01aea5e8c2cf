//! `Semaphore` 并发上限测试：任意时刻占用的槽位不超过容量。

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use spark_rendezvous::{RendezvousError, Semaphore};

#[test]
fn concurrency_never_exceeds_capacity() {
    const LIMIT: usize = 3;
    const TASKS: usize = 16;

    let semaphore = Semaphore::new(LIMIT);
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..TASKS)
        .map(|_| {
            let semaphore = semaphore.clone();
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            thread::spawn(move || {
                semaphore.add();
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(2));
                running.fetch_sub(1, Ordering::SeqCst);
                semaphore.done();
            })
        })
        .collect();

    for task in tasks {
        task.join().expect("任务线程不应 panic");
    }
    assert!(peak.load(Ordering::SeqCst) <= LIMIT);
    assert_eq!(semaphore.in_use(), 0);
}

#[test]
fn try_add_for_succeeds_once_slot_frees() {
    let semaphore = Semaphore::new(1);
    let held = semaphore.try_add().expect("首个槽位应空闲");

    let waiter = {
        let semaphore = semaphore.clone();
        thread::spawn(move || {
            semaphore
                .try_add_for(Duration::from_secs(5))
                .map(|guard| guard.release())
        })
    };
    thread::sleep(Duration::from_millis(10));
    drop(held);

    assert!(waiter.join().expect("等待线程不应 panic").is_ok());
    assert!(matches!(
        Semaphore::new(1).try_add_for(Duration::ZERO).map(|_| ()),
        Ok(())
    ));
    let busy = Semaphore::new(1);
    busy.add();
    assert!(matches!(
        busy.try_add_for(Duration::from_millis(1)),
        Err(RendezvousError::NoSlotAvailable)
    ));
}
