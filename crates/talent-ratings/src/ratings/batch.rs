//! Settle-all fan-out over fixed-size chunks.

use std::any::Any;
use std::sync::Arc;

use tokio::task::{JoinError, JoinHandle};

/// Why one item of a batch did not produce a value.
#[derive(Debug, thiserror::Error)]
pub enum ItemFailure<E> {
    #[error("{0}")]
    Failed(E),
    #[error("worker panicked: {0}")]
    Panicked(String),
}

/// Outcome of one item, keyed by the input that produced it.
#[derive(Debug)]
pub struct Settled<K, T, E> {
    pub key: K,
    pub outcome: Result<T, ItemFailure<E>>,
}

/// Run `work` for every key on the blocking pool, at most `chunk_size` at a
/// time. A chunk is gathered only after all of its members settle; failures
/// and panics are reported per item and never stop the batch. Results keep
/// input order.
pub async fn settle_in_chunks<K, T, E, F>(
    keys: Vec<K>,
    chunk_size: usize,
    work: F,
) -> Vec<Settled<K, T, E>>
where
    K: Clone + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
    F: Fn(K) -> Result<T, E> + Send + Sync + 'static,
{
    let work = Arc::new(work);
    let chunk_size = chunk_size.max(1);
    let mut settled = Vec::with_capacity(keys.len());
    let mut pending = keys.into_iter().peekable();

    while pending.peek().is_some() {
        let chunk: Vec<(K, JoinHandle<Result<T, E>>)> = pending
            .by_ref()
            .take(chunk_size)
            .map(|key| {
                let work = Arc::clone(&work);
                let input = key.clone();
                (key, tokio::task::spawn_blocking(move || work(input)))
            })
            .collect();

        for (key, handle) in chunk {
            let outcome = match handle.await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(error)) => Err(ItemFailure::Failed(error)),
                Err(join_error) => Err(ItemFailure::Panicked(join_message(join_error))),
            };
            settled.push(Settled { key, outcome });
        }
    }

    settled
}

fn join_message(error: JoinError) -> String {
    if error.is_cancelled() {
        return "task cancelled".to_string();
    }
    panic_message(error.into_panic())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "unknown panic".to_string(),
        },
    }
}
