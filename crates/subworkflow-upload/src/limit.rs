//! Semaphore-gated task execution with bounded parallelism.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

/// Run `tasks` with at most `limit` of them in flight at once.
///
/// Each task waits for a permit before it starts; remaining tasks queue
/// until a slot frees. Completion order is unconstrained, but results come
/// back in task-submission order. A failed task does not cancel its
/// in-flight siblings.
pub(crate) async fn join_limited<F>(limit: usize, tasks: Vec<F>) -> Vec<F::Output>
where
    F: Future,
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let gated: Vec<_> = tasks
        .into_iter()
        .map(|task| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .expect("upload semaphore is never closed");
                task.await
            }
        })
        .collect();
    futures::future::join_all(gated).await
}
