use std::future::Future;

use async_trait::async_trait;

use crate::error::TaskError;

/// One unit of recurring work.
///
/// The scheduler calls [`fire`](Callback::fire) once per firing on its
/// dispatch task and only looks at the outcome: `Ok` re-arms the task, `Err`
/// evicts it. No scheduler lock is held while a callback runs, so a callback
/// may add, remove or reset registrations on the scheduler that owns it.
#[async_trait]
pub trait Callback: Send + Sync + 'static {
    async fn fire(&self) -> Result<(), TaskError>;
}

#[async_trait]
impl<F, Fut> Callback for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    async fn fire(&self) -> Result<(), TaskError> {
        (self)().await
    }
}

/// Adapt a synchronous closure into a [`Callback`].
pub fn from_fn<F>(f: F) -> impl Callback
where
    F: Fn() -> Result<(), TaskError> + Send + Sync + 'static,
{
    move || std::future::ready(f())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn async_closure_is_a_callback() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let cb = move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TaskError>(())
            }
        };
        cb.fire().await.unwrap();
        cb.fire().await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn sync_closure_reports_failure() {
        let cb = from_fn(|| Err(TaskError::failed("boom")));
        let err = cb.fire().await.unwrap_err();
        assert_eq!(err.code(), "TASK_FAILED");
        assert_eq!(err.to_string(), "Task failed: boom");
    }
}
