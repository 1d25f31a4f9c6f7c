//! Constructors for settled futures and combinators over several futures.

use crate::error::{Error, Result};
use crate::executor::{self, ExecutorRef};
use crate::promise::{CancelHandle, CancellableFuture, Promise};

use std::sync::{Arc, Mutex, PoisonError};

/// Returns a future already resolved with `value`, bound to the inline executor.
pub fn ready<T: Send + 'static>(value: T) -> CancellableFuture<T> {
    let (promise, future) = Promise::pair(executor::inline());
    let _ = promise.resolve(value);
    future
}

/// Returns a future already failed with `error`, bound to the inline executor.
pub fn failed<T: Send + 'static>(error: Error) -> CancellableFuture<T> {
    let (promise, future) = Promise::pair(executor::inline());
    let _ = promise.reject(error);
    future
}

struct AllState<T: Send + 'static> {
    values: Vec<Option<T>>,
    remaining: usize,
    promise: Option<Promise<Vec<T>>>,
}

/// Resolves once every input succeeds, with the values in input order.
///
/// The first failure (in completion order) fails the combined future and
/// cancels the inputs still pending. Cancelling the combined future cancels
/// every input. An empty input resolves immediately to an empty vector.
pub fn when_all<T: Send + 'static>(
    futures: Vec<CancellableFuture<T>>,
    executor: ExecutorRef,
) -> CancellableFuture<Vec<T>> {
    let (promise, combined) = Promise::pair(executor);

    if futures.is_empty() {
        let _ = promise.resolve(Vec::new());
        return combined;
    }

    let handles: Vec<CancelHandle> = futures.iter().map(CancellableFuture::cancel_handle).collect();
    let state = Arc::new(Mutex::new(AllState {
        values: futures.iter().map(|_| None).collect(),
        remaining: futures.len(),
        promise: Some(promise),
    }));

    for (index, future) in futures.into_iter().enumerate() {
        let state = state.clone();
        let handles = handles.clone();

        future.attach(move |outcome| {
            let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);

            match outcome {
                Ok(value) => {
                    guard.values[index] = Some(value);
                    guard.remaining -= 1;
                    if guard.remaining > 0 {
                        return;
                    }

                    let values: Vec<T> = guard.values.drain(..).flatten().collect();
                    let promise = guard.promise.take();
                    drop(guard);

                    if let Some(promise) = promise {
                        let _ = promise.resolve(values);
                    }
                }
                Err(error) => {
                    let promise = guard.promise.take();
                    drop(guard);

                    if let Some(promise) = promise {
                        let _ = promise.reject(error);
                        for handle in &handles {
                            handle.cancel();
                        }
                    }
                }
            }
        });
    }

    combined.with_upstream(handles)
}

struct AnyState<T: Send + 'static> {
    failures: usize,
    promise: Option<Promise<(usize, T)>>,
}

/// Resolves with the index and value of the first input to succeed, then
/// cancels the rest.
///
/// If every input fails, the combined future fails with the last error. An
/// empty input fails with [`Error::BrokenPromise`].
pub fn when_any<T: Send + 'static>(
    futures: Vec<CancellableFuture<T>>,
    executor: ExecutorRef,
) -> CancellableFuture<(usize, T)> {
    let (promise, combined) = Promise::pair(executor);

    if futures.is_empty() {
        let _ = promise.reject(Error::BrokenPromise);
        return combined;
    }

    let total = futures.len();
    let handles: Vec<CancelHandle> = futures.iter().map(CancellableFuture::cancel_handle).collect();
    let state = Arc::new(Mutex::new(AnyState {
        failures: 0,
        promise: Some(promise),
    }));

    for (index, future) in futures.into_iter().enumerate() {
        let state = state.clone();
        let handles = handles.clone();

        future.attach(move |outcome: Result<T>| {
            let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);

            match outcome {
                Ok(value) => {
                    let promise = guard.promise.take();
                    drop(guard);

                    if let Some(promise) = promise {
                        let _ = promise.resolve((index, value));
                        for handle in &handles {
                            handle.cancel();
                        }
                    }
                }
                Err(error) => {
                    guard.failures += 1;
                    if guard.failures < total {
                        return;
                    }

                    let promise = guard.promise.take();
                    drop(guard);

                    if let Some(promise) = promise {
                        let _ = promise.reject(error);
                    }
                }
            }
        });
    }

    combined.with_upstream(handles)
}
