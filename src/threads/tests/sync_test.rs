use machine::Timer;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use threads::kthread::ThreadStatus;
use threads::{Alarm, Communicator, Condition2, KThread, Lock, Semaphore};

/// Drive `timer` forward until every thread in `threads` has finished.
fn run_clock_until_done(timer: &Timer, threads: &[KThread]) {
    while threads.iter().any(|t| t.status() != ThreadStatus::Finished) {
        timer.advance(50);
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_semaphore_counts() {
    let sem = Arc::new(Semaphore::new(0));
    let s = Arc::clone(&sem);
    let waiter = KThread::new(move || s.p()).set_name("waiter");
    waiter.fork().unwrap();
    sem.v();
    assert!(waiter.join());
    assert_eq!(sem.value(), 0);
}

#[test]
fn test_lock_excludes() {
    let lock = Arc::new(Lock::new());
    let counter = Arc::new(Mutex::new(0u32));
    let mut workers = Vec::new();
    for i in 0..4 {
        let lock = Arc::clone(&lock);
        let counter = Arc::clone(&counter);
        let t = KThread::new(move || {
            for _ in 0..100 {
                lock.acquire();
                assert!(lock.is_held_by_current_thread());
                *counter.lock() += 1;
                lock.release();
            }
        })
        .set_name(&format!("worker-{}", i));
        t.fork().unwrap();
        workers.push(t);
    }
    for t in &workers {
        assert!(t.join());
    }
    assert_eq!(*counter.lock(), 400);
    assert!(!lock.is_held_by_current_thread());
}

/// A consumer waits until a producer has filled the list.
#[test]
fn test_condition_producer_consumer() {
    let lock = Arc::new(Lock::new());
    let empty = Arc::new(Condition2::new(Arc::clone(&lock)));
    let list = Arc::new(Mutex::new(VecDeque::new()));

    let consumer = {
        let (lock, empty, list) = (Arc::clone(&lock), Arc::clone(&empty), Arc::clone(&list));
        KThread::new(move || {
            lock.acquire();
            while list.lock().is_empty() {
                empty.sleep();
            }
            assert_eq!(list.lock().len(), 5, "list should have 5 values");
            let drained: Vec<i32> = list.lock().drain(..).collect();
            assert_eq!(drained, vec![0, 1, 2, 3, 4]);
            lock.release();
        })
        .set_name("Consumer")
    };
    let producer = {
        let (lock, empty, list) = (Arc::clone(&lock), Arc::clone(&empty), Arc::clone(&list));
        KThread::new(move || {
            lock.acquire();
            for i in 0..5 {
                list.lock().push_back(i);
            }
            empty.wake();
            lock.release();
        })
        .set_name("Producer")
    };
    consumer.fork().unwrap();
    producer.fork().unwrap();
    assert!(consumer.join());
    assert!(producer.join());
}

#[test]
fn test_condition_wake_all() {
    let lock = Arc::new(Lock::new());
    let cond = Arc::new(Condition2::new(Arc::clone(&lock)));
    let go = Arc::new(Mutex::new(false));
    let mut sleepers = Vec::new();
    for i in 0..3 {
        let (lock, cond, go) = (Arc::clone(&lock), Arc::clone(&cond), Arc::clone(&go));
        let t = KThread::new(move || {
            lock.acquire();
            while !*go.lock() {
                cond.sleep();
            }
            lock.release();
        })
        .set_name(&format!("sleeper-{}", i));
        t.fork().unwrap();
        sleepers.push(t);
    }
    loop {
        lock.acquire();
        let all_waiting = cond.waiting() == 3;
        if all_waiting {
            *go.lock() = true;
            cond.wake_all();
        }
        lock.release();
        if all_waiting {
            break;
        }
        thread::sleep(Duration::from_millis(1));
    }
    for t in &sleepers {
        assert!(t.join());
    }
}

#[test]
fn test_alarm_sleeps_at_least_requested_ticks() {
    let timer = Arc::new(Timer::new(100));
    let alarm = Alarm::new(Arc::clone(&timer));
    let mut sleepers = Vec::new();
    let results = Arc::new(Mutex::new(Vec::new()));
    for wait in [1000i64, 200, 0] {
        let (alarm, timer, results) = (Arc::clone(&alarm), Arc::clone(&timer), Arc::clone(&results));
        let t = KThread::new(move || {
            let start = timer.time();
            alarm.wait_until(wait);
            results.lock().push((wait, start, timer.time()));
        })
        .set_name(&format!("T{}", wait));
        t.fork().unwrap();
        sleepers.push(t);
    }
    run_clock_until_done(&timer, &sleepers);
    let results = results.lock();
    assert_eq!(results.len(), 3);
    for &(wait, start, woke) in results.iter() {
        assert!(
            woke >= start + wait as u64,
            "thread waiting {} ticks woke too early: {} -> {}",
            wait,
            start,
            woke
        );
    }
    assert_eq!(alarm.sleeping(), 0);
}

#[test]
fn test_communicator_pairs_every_word() {
    let com = Arc::new(Communicator::new());
    let finished_at = Arc::new([AtomicU64::new(0), AtomicU64::new(0)]);
    let clock = Arc::new(AtomicU64::new(0));
    let words = Arc::new(Mutex::new(Vec::new()));

    let mut threads = Vec::new();
    for (i, word) in [4, 7].into_iter().enumerate() {
        let (com, finished_at, clock) = (Arc::clone(&com), Arc::clone(&finished_at), Arc::clone(&clock));
        let speaker = KThread::new(move || {
            com.speak(word);
            finished_at[i].store(clock.fetch_add(1, Ordering::SeqCst) + 1, Ordering::SeqCst);
        })
        .set_name(&format!("S{}", i + 1));
        speaker.fork().unwrap();
        threads.push(speaker);
    }
    // Speakers cannot finish before anyone listens.
    thread::sleep(Duration::from_millis(20));
    assert_eq!(finished_at[0].load(Ordering::SeqCst), 0);
    assert_eq!(finished_at[1].load(Ordering::SeqCst), 0);

    for i in 0..2 {
        let (com, words) = (Arc::clone(&com), Arc::clone(&words));
        let listener = KThread::new(move || {
            let word = com.listen();
            words.lock().push(word);
        })
        .set_name(&format!("L{}", i + 1));
        listener.fork().unwrap();
        threads.push(listener);
    }
    for t in &threads {
        assert!(t.join());
    }
    let mut words = words.lock().clone();
    words.sort();
    assert_eq!(words, vec![4, 7]);
}

#[test]
fn test_listener_waits_for_speaker() {
    let com = Arc::new(Communicator::new());
    let c = Arc::clone(&com);
    let got = Arc::new(Mutex::new(None));
    let g = Arc::clone(&got);
    let listener = KThread::new(move || {
        *g.lock() = Some(c.listen());
    })
    .set_name("listener");
    listener.fork().unwrap();
    thread::sleep(Duration::from_millis(10));
    assert!(got.lock().is_none());
    com.speak(42);
    assert!(listener.join());
    assert_eq!(*got.lock(), Some(42));
}
