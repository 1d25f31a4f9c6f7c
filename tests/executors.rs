use pledge::executor::{self, BuildError, Executor, ThreadPoolBuilder};
use pledge::{Error, Promise, SingleThreadExecutor};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[test]
fn test_inline_runs_on_resolving_thread() {
    let (promise, future) = Promise::pair(executor::inline());

    let ran_on = future.then(|_: pledge::Result<()>| thread::current().id());

    let producer = thread::spawn(move || {
        promise.resolve(()).unwrap();
        thread::current().id()
    });
    let producer_id = producer.join().unwrap();

    assert_eq!(ran_on.wait().unwrap(), producer_id);
}

#[test]
fn test_inline_executor_runs_job_synchronously() {
    let counter = Arc::new(AtomicUsize::new(0));
    let c = counter.clone();

    executor::InlineExecutor.execute(Box::new(move || {
        c.fetch_add(1, Ordering::SeqCst);
    }));

    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_single_thread_preserves_order() {
    let single = SingleThreadExecutor::new("ui").unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));
    let names = Arc::new(Mutex::new(Vec::new()));

    for i in 0..100 {
        let order = order.clone();
        let names = names.clone();
        single.executor().execute(Box::new(move || {
            order.lock().unwrap().push(i);
            names
                .lock()
                .unwrap()
                .push(thread::current().name().map(str::to_owned));
        }));
    }

    drop(single);

    assert_eq!(*order.lock().unwrap(), (0..100).collect::<Vec<_>>());
    assert!(
        names
            .lock()
            .unwrap()
            .iter()
            .all(|n| n.as_deref() == Some("ui")),
        "Every job should run on the executor thread"
    );
}

#[test]
fn test_continuations_run_on_single_thread() {
    let single = SingleThreadExecutor::new("callbacks").unwrap();
    let (promise, future) = Promise::pair(single.executor());

    let name = future.then(|_: pledge::Result<u8>| thread::current().name().map(str::to_owned));
    promise.resolve(1).unwrap();

    assert_eq!(name.wait().unwrap().as_deref(), Some("callbacks"));
}

#[test]
fn test_pool_runs_all_continuations() {
    let pool = ThreadPoolBuilder::new()
        .worker_threads(4)
        .thread_name("cb")
        .build()
        .unwrap();
    assert_eq!(pool.worker_count(), 4);

    let counter = Arc::new(AtomicUsize::new(0));
    let names = Arc::new(Mutex::new(Vec::new()));
    let mut promises = Vec::new();

    for _ in 0..100 {
        let (promise, future) = Promise::<usize>::pair(pool.executor());
        let counter = counter.clone();
        let names = names.clone();

        let _ = future.then(move |value| {
            counter.fetch_add(value.unwrap(), Ordering::SeqCst);
            names
                .lock()
                .unwrap()
                .push(thread::current().name().unwrap_or_default().to_string());
        });
        promises.push(promise);
    }

    for promise in promises {
        promise.resolve(1).unwrap();
    }

    drop(pool);

    assert_eq!(counter.load(Ordering::SeqCst), 100);
    assert!(names.lock().unwrap().iter().all(|n| n.starts_with("cb-")));
}

#[test]
fn test_pool_wait_on_chain() {
    let pool = ThreadPoolBuilder::new().worker_threads(2).build().unwrap();
    let (promise, future) = Promise::pair(pool.executor());

    let total = future.map(|v: u64| v * 3).map(|v| v + 1);
    promise.resolve(5).unwrap();

    assert_eq!(total.wait().unwrap(), 16);
}

#[test]
fn test_pool_rejects_zero_workers() {
    let result = ThreadPoolBuilder::new().worker_threads(0).build();

    assert!(matches!(result, Err(BuildError::ZeroWorkers)));
}

#[test]
fn test_pool_survives_panicking_job() {
    let pool = ThreadPoolBuilder::new().worker_threads(1).build().unwrap();

    pool.executor().execute(Box::new(|| panic!("job failure")));

    let (promise, future) = Promise::pair(pool.executor());
    let doubled = future.map(|v: i32| v * 2);
    promise.resolve(21).unwrap();

    assert_eq!(doubled.wait().unwrap(), 42);
}

#[test]
fn test_shut_down_executor_breaks_continuation() {
    let pool = ThreadPoolBuilder::new().worker_threads(1).build().unwrap();
    let executor = pool.executor();
    drop(pool);

    let (promise, future) = Promise::pair(executor);
    let chained = future.map(|v: i32| v + 1);
    promise.resolve(1).unwrap();

    assert!(matches!(chained.wait(), Err(Error::BrokenPromise)));
}

#[test]
fn test_via_moves_chain_to_other_executor() {
    let single = SingleThreadExecutor::new("hop").unwrap();
    let (promise, future) = Promise::pair(executor::inline());

    let name = future
        .via(single.executor())
        .then(|_: pledge::Result<()>| thread::current().name().map(str::to_owned));
    promise.resolve(()).unwrap();

    assert_eq!(name.wait().unwrap().as_deref(), Some("hop"));
}

#[test]
fn test_single_thread_drops_jobs_after_shutdown() {
    let single = SingleThreadExecutor::new("closing").unwrap();
    let executor = single.executor();
    drop(single);

    let ran = Arc::new(AtomicUsize::new(0));
    let r = ran.clone();
    executor.execute(Box::new(move || {
        r.fetch_add(1, Ordering::SeqCst);
    }));

    let (promise, future) = Promise::pair(executor);
    let chained = future.map(|v: i32| v + 1);
    promise.resolve(1).unwrap();

    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert!(matches!(chained.wait(), Err(Error::BrokenPromise)));
}

#[test]
fn test_pool_default_thread_name() {
    let pool = ThreadPoolBuilder::new().worker_threads(1).build().unwrap();
    let (promise, future) = Promise::pair(pool.executor());

    let name = future.then(|_: pledge::Result<()>| thread::current().name().map(str::to_owned));
    promise.resolve(()).unwrap();

    assert_eq!(name.wait().unwrap().as_deref(), Some("pledge-worker-0"));
}

#[test]
fn test_pool_shutdown_race_never_strands_jobs() {
    for _ in 0..50 {
        let pool = ThreadPoolBuilder::new().worker_threads(2).build().unwrap();
        let executor = pool.executor();

        let submitter = thread::spawn(move || {
            (0..100)
                .map(|i| {
                    let (promise, future) = Promise::pair(executor.clone());
                    let chained = future.map(|v: i32| v + 1);
                    promise.resolve(i).unwrap();
                    chained
                })
                .collect::<Vec<_>>()
        });

        drop(pool);

        for mut future in submitter.join().unwrap() {
            let outcome = future.wait_timeout(Duration::from_secs(5));
            assert!(
                matches!(outcome, Ok(_) | Err(Error::BrokenPromise)),
                "Job submitted during shutdown must run or break, got {outcome:?}"
            );
        }
    }
}
