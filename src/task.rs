//! Cancellable, progress-reporting handles to in-flight requests.

use crate::error::{NetworkError, Result};
use crate::response::ResponseValue;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::watch;
use tokio::task::AbortHandle;

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<ResponseValue<T>>> + Send>>;

/// A handle to a request that resolves exactly once to a [`ResponseValue`] or
/// a [`NetworkError`].
///
/// The request starts running as soon as the task is created; awaiting the
/// task only waits for the result. Dropping a task does not cancel it, call
/// [`Task::cancel`] for that.
///
/// # Examples
///
/// ```no_run
/// use courier::{NetworkService, Route};
/// use http::Method;
///
/// # async fn example() -> Result<(), courier::NetworkError> {
/// let service = NetworkService::builder().build()?;
/// let route = Route::parse(Method::GET, "https://example.com", "large-file")?;
///
/// let task = service.request_data(route);
/// let mut progress = task.progress_updates();
/// tokio::spawn(async move {
///     while progress.changed().await.is_ok() {
///         println!("{:.0}%", *progress.borrow() * 100.0);
///     }
/// });
///
/// let data = task.await?;
/// println!("Received {} bytes", data.value.len());
/// # Ok(())
/// # }
/// ```
pub struct Task<T> {
    future: BoxFuture<T>,
    abort: Option<AbortHandle>,
    progress: watch::Receiver<f32>,
}

impl<T: Send + 'static> Task<T> {
    /// Spawns `future` on the current Tokio runtime.
    ///
    /// Outside a runtime the task resolves immediately with a configuration error.
    pub(crate) fn spawn<F>(future: F, progress: watch::Receiver<f32>) -> Self
    where
        F: Future<Output = Result<ResponseValue<T>>> + Send + 'static,
    {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::error!(error = %e, "Cannot start request outside a Tokio runtime");
                return Task::failed(
                    NetworkError::ConfigurationError(format!("No Tokio runtime available: {}", e)),
                    progress,
                );
            }
        };

        let handle = runtime.spawn(future);
        let abort = handle.abort_handle();
        let future = Box::pin(async move {
            match handle.await {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => Err(NetworkError::Cancelled),
                Err(e) => std::panic::resume_unwind(e.into_panic()),
            }
        });

        Self {
            future,
            abort: Some(abort),
            progress,
        }
    }

    fn failed(error: NetworkError, progress: watch::Receiver<f32>) -> Self {
        Self {
            future: Box::pin(async move { Err(error) }),
            abort: None,
            progress,
        }
    }

    /// Fraction of the response body received so far, from `0.0` to `1.0`.
    pub fn progress(&self) -> f32 {
        *self.progress.borrow()
    }

    /// A receiver notified on every progress update.
    ///
    /// The channel closes when the request resolves; no update is sent after that.
    pub fn progress_updates(&self) -> watch::Receiver<f32> {
        self.progress.clone()
    }

    /// Cancels the in-flight request.
    ///
    /// The transport operation is dropped and no completion notification is
    /// published. Has no effect once the request has completed.
    pub fn cancel(&self) {
        self.cancel_handle().cancel();
    }

    /// A handle that can cancel this task from elsewhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(self.abort.clone())
    }

    /// Returns `true` once the underlying request has stopped running.
    pub fn is_finished(&self) -> bool {
        self.abort.as_ref().map_or(true, AbortHandle::is_finished)
    }

    /// Resolves with just the value, discarding the response metadata.
    pub async fn value(self) -> Result<T> {
        self.await.map(ResponseValue::into_value)
    }

    /// Maps the resolved value, preserving response metadata, progress and cancellation.
    pub fn map<U, F>(self, f: F) -> Task<U>
    where
        F: FnOnce(T) -> U + Send + 'static,
        U: Send + 'static,
    {
        let future = self.future;
        Task {
            future: Box::pin(async move { future.await.map(|value| value.map(f)) }),
            abort: self.abort,
            progress: self.progress,
        }
    }

    /// Calls `callback` with the result once the task resolves.
    ///
    /// The callback is never called if the task is cancelled before it
    /// completes. Returns a handle that cancels the task.
    pub fn on_complete<F>(self, callback: F) -> CancelHandle
    where
        F: FnOnce(Result<ResponseValue<T>>) + Send + 'static,
    {
        let handle = self.cancel_handle();
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::error!(error = %e, "Cannot observe request outside a Tokio runtime");
                return handle;
            }
        };

        runtime.spawn(async move {
            match self.await {
                Err(NetworkError::Cancelled) => {
                    tracing::debug!("Request cancelled, skipping completion callback");
                }
                result => callback(result),
            }
        });
        handle
    }
}

impl<T> Future for Task<T> {
    type Output = Result<ResponseValue<T>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.future.as_mut().poll(cx)
    }
}

impl<T> std::fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("progress", &*self.progress.borrow())
            .field("cancellable", &self.abort.is_some())
            .finish()
    }
}

/// Cancels a [`Task`] without owning it.
#[derive(Debug, Clone)]
pub struct CancelHandle(Option<AbortHandle>);

impl CancelHandle {
    /// Cancels the request if it is still running; otherwise does nothing.
    pub fn cancel(&self) {
        if let Some(abort) = &self.0 {
            if !abort.is_finished() {
                tracing::debug!("Cancelling in-flight request");
                abort.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::HttpResponse;
    use bytes::Bytes;
    use http::{HeaderMap, StatusCode};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn response_value(value: u32) -> ResponseValue<u32> {
        ResponseValue::new(
            value,
            HttpResponse {
                url: url::Url::parse("https://example.com").unwrap(),
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                body: Bytes::new(),
                latency: Duration::ZERO,
            },
        )
    }

    #[tokio::test]
    async fn test_resolves_and_maps() {
        let (_tx, rx) = watch::channel(0.0);
        let task = Task::spawn(async { Ok(response_value(21)) }, rx);

        let doubled = task.map(|n| n * 2).value().await.unwrap();
        assert_eq!(doubled, 42);
    }

    #[tokio::test]
    async fn test_cancel_before_completion() {
        let (_tx, rx) = watch::channel(0.0);
        let task = Task::spawn(
            async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(response_value(1))
            },
            rx,
        );

        task.cancel();
        assert!(task.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_callback_skipped_when_cancelled() {
        let (_tx, rx) = watch::channel(0.0);
        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let task = Task::spawn(
            async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(response_value(1))
            },
            rx,
        );
        let handle = task.on_complete(move |_| called_clone.store(true, Ordering::SeqCst));
        handle.cancel();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancel_after_completion_is_noop() {
        let (_tx, rx) = watch::channel(0.0);
        let task = Task::spawn(async { Ok(response_value(7)) }, rx);

        while !task.is_finished() {
            tokio::task::yield_now().await;
        }
        task.cancel();
        assert_eq!(task.await.unwrap().value, 7);
    }

    #[test]
    fn test_spawn_outside_runtime_fails() {
        let (_tx, rx) = watch::channel(0.0);
        let task = Task::spawn(async { Ok(response_value(1)) }, rx);
        assert!(task.is_finished());

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let result = runtime.block_on(task);
        assert!(matches!(result, Err(NetworkError::ConfigurationError(_))));
    }
}
