// Multi-threaded properties of ordered acquisition.

use crossbeam::channel::{unbounded, Receiver};
use lock_ordering::{
    AcquireOptions, CancelToken, LockError, Lockable, OrderedLocker, Resource, ResourceKey,
};
use proptest::prelude::*;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

const WATCHDOG: Duration = Duration::from_secs(30);

fn expect_done<T>(rx: &Receiver<T>, workers: usize) -> Vec<T> {
    (0..workers)
        .map(|i| {
            rx.recv_timeout(WATCHDOG)
                .unwrap_or_else(|_| panic!("worker {} did not finish: deadlock?", i))
        })
        .collect()
}

#[test]
fn opposite_orders_never_deadlock() {
    let a = Arc::new(Resource::new(0u64));
    let b = Arc::new(Resource::new(0u64));
    let locker = Arc::new(OrderedLocker::default());
    let (tx, rx) = unbounded();

    for reversed in [false, true] {
        let (a, b, locker, tx) = (Arc::clone(&a), Arc::clone(&b), Arc::clone(&locker), tx.clone());
        thread::spawn(move || {
            for _ in 0..5_000 {
                let set = if reversed { [&*b, &*a] } else { [&*a, &*b] };
                let mut handle = locker.acquire_all(&set).unwrap();
                for (_, value) in handle.iter_mut() {
                    *value += 1;
                }
            }
            tx.send(()).unwrap();
        });
    }

    expect_done(&rx, 2);
    assert_eq!(*a.lock().unwrap(), 10_000);
    assert_eq!(*b.lock().unwrap(), 10_000);
    assert_eq!(locker.stats().acquired, 10_000);
    assert_eq!(locker.stats().released, 10_000);
}

#[test]
fn overlapping_triples_never_deadlock() {
    let resources: Arc<Vec<Resource<u32>>> = Arc::new((0..4).map(|_| Resource::new(0)).collect());
    let locker = Arc::new(OrderedLocker::default());
    let (tx, rx) = unbounded();
    let requests: [[usize; 3]; 4] = [[0, 1, 2], [2, 3, 0], [3, 1, 0], [1, 3, 2]];

    for request in requests {
        let (resources, locker, tx) = (Arc::clone(&resources), Arc::clone(&locker), tx.clone());
        thread::spawn(move || {
            for _ in 0..2_000 {
                let set: Vec<&Resource<u32>> = request.iter().map(|&i| &resources[i]).collect();
                let mut handle = locker.acquire_all(&set).unwrap();
                for (_, value) in handle.iter_mut() {
                    *value += 1;
                }
            }
            tx.send(()).unwrap();
        });
    }

    expect_done(&rx, 4);
    let total: u32 = resources.iter().map(|r| *r.lock().unwrap()).sum();
    assert_eq!(total, 4 * 3 * 2_000);
}

#[derive(Clone, Copy)]
enum Waiter {
    Plain,
    Cancellable,
    Timed,
    Unbounded,
}

#[test]
fn timed_and_untimed_waiters_share_a_pair() {
    let a = Arc::new(Resource::new(0u64));
    let b = Arc::new(Resource::new(0u64));
    let locker = Arc::new(OrderedLocker::default());
    let token = CancelToken::new();
    let (tx, rx) = unbounded();
    let waiters = [
        (Waiter::Plain, false),
        (Waiter::Cancellable, true),
        (Waiter::Timed, false),
        (Waiter::Unbounded, true),
    ];

    for (kind, reversed) in waiters {
        let (a, b, locker, tx) = (Arc::clone(&a), Arc::clone(&b), Arc::clone(&locker), tx.clone());
        let options = match kind {
            Waiter::Plain => AcquireOptions::new(),
            Waiter::Cancellable => AcquireOptions::new().with_cancel(token.clone()),
            Waiter::Timed => AcquireOptions::new().with_timeout(Duration::from_secs(60)),
            Waiter::Unbounded => AcquireOptions::new().with_timeout(Duration::MAX),
        };
        thread::spawn(move || {
            for _ in 0..3_000 {
                let set = if reversed { [&*b, &*a] } else { [&*a, &*b] };
                let mut handle = match kind {
                    Waiter::Plain => locker.acquire_all(&set),
                    _ => locker.acquire_all_with(&set, &options),
                }
                .unwrap();
                for (_, value) in handle.iter_mut() {
                    *value += 1;
                }
            }
            tx.send(()).unwrap();
        });
    }

    expect_done(&rx, 4);
    assert_eq!(*a.lock().unwrap(), 12_000);
    assert_eq!(*b.lock().unwrap(), 12_000);
    assert_eq!(locker.stats().aborted(), 0);
}

#[test]
fn keyed_scenario_both_callers_complete() {
    let a = Arc::new(Resource::with_key(ResourceKey::new(1), "A"));
    let b = Arc::new(Resource::with_key(ResourceKey::new(2), "B"));
    let locker = Arc::new(OrderedLocker::default());
    let start = Arc::new(Barrier::new(2));
    let (tx, rx) = unbounded();

    for reversed in [true, false] {
        let (a, b, locker, start, tx) = (
            Arc::clone(&a),
            Arc::clone(&b),
            Arc::clone(&locker),
            Arc::clone(&start),
            tx.clone(),
        );
        thread::spawn(move || {
            let set = if reversed { [&*b, &*a] } else { [&*a, &*b] };
            start.wait();
            let handle = locker.acquire_all(&set).unwrap();
            let order: Vec<ResourceKey> = handle.keys().collect();
            thread::sleep(Duration::from_millis(50));
            drop(handle);
            tx.send(order).unwrap();
        });
    }

    for order in expect_done(&rx, 2) {
        assert_eq!(order, vec![ResourceKey::new(1), ResourceKey::new(2)]);
    }
}

#[test]
fn released_set_is_lockable_by_another_thread() {
    let a = Resource::new(1);
    let b = Resource::new(2);
    let locker = OrderedLocker::default();

    let mut handle = locker.acquire_all(&[&a, &b]).unwrap();
    handle.release();

    thread::scope(|s| {
        let other = s.spawn(|| locker.try_acquire_all(&[&b, &a]).map(|h| h.is_some()));
        assert_eq!(other.join().unwrap(), Ok(true));
    });
}

#[test]
fn cancelling_a_blocked_caller_frees_its_prefix() {
    let a = Resource::new(());
    let b = Resource::new(());
    let c = Resource::new(());
    let locker = OrderedLocker::default();
    let blocker = c.lock().unwrap();
    let token = CancelToken::new();

    thread::scope(|s| {
        let waiter = s.spawn(|| {
            let options = AcquireOptions::new().with_cancel(token.clone());
            locker.acquire_all_with(&[&c, &b, &a], &options).map(|_| ())
        });

        // Wait until the caller sits on `c` with `a` and `b` already held.
        while !(a.is_locked() && b.is_locked()) {
            thread::yield_now();
        }
        token.cancel();

        let result = waiter.join().unwrap();
        assert!(matches!(result, Err(LockError::Cancelled { key, .. }) if key == c.key()));
    });

    assert!(!a.is_locked());
    assert!(!b.is_locked());
    drop(blocker);
}

#[test]
fn destroying_a_resource_unblocks_waiters() {
    let a = Resource::new(());
    let b = Resource::new(());
    let locker = OrderedLocker::default();
    let blocker = b.lock().unwrap();

    thread::scope(|s| {
        let waiter = s.spawn(|| locker.acquire_all(&[&b, &a]).map(|_| ()).err());

        while !a.is_locked() {
            thread::yield_now();
        }
        b.destroy();

        assert_eq!(
            waiter.join().unwrap(),
            Some(LockError::ResourceUnavailable { key: b.key() })
        );
    });

    assert!(!a.is_locked());
    drop(blocker);
    assert_eq!(locker.stats().unavailable, 1);
}

fn make_resources(n: usize) -> Vec<Resource<usize>> {
    (0..n).map(Resource::new).collect()
}

proptest! {
    #[test]
    fn any_request_order_locks_in_key_order(
        order in Just((0..6usize).collect::<Vec<_>>()).prop_shuffle()
    ) {
        let resources = make_resources(6);
        let request: Vec<&dyn Lockable> = order.iter().map(|&i| &resources[i] as &dyn Lockable).collect();

        let handle = OrderedLocker::default().acquire_all(&request).unwrap();
        let keys: Vec<ResourceKey> = handle.keys().collect();
        let mut expected: Vec<ResourceKey> = resources.iter().map(|r| r.key()).collect();
        expected.sort();

        prop_assert_eq!(keys, expected);
    }

    #[test]
    fn duplicate_anywhere_is_rejected(len in 2usize..6, dup_from in 0usize..6, dup_at in 0usize..7) {
        let resources = make_resources(len);
        let mut request: Vec<&Resource<usize>> = resources.iter().collect();
        let dup = &resources[dup_from % len];
        request.insert(dup_at % (len + 1), dup);

        let result = OrderedLocker::default().acquire_all(&request).map(|_| ());
        prop_assert_eq!(result, Err(LockError::duplicate(dup.key())));
        prop_assert!(resources.iter().all(|r| !r.is_locked()));
    }
}
