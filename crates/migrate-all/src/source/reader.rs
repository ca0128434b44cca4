//! Row producer task and its receiving handle.

use crate::error::Result;
use crate::value::Batch;
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};

/// Batches buffered between the row producer and the writer.
pub const READ_AHEAD_BATCHES: usize = 4;

/// Receiving end of a table read running on its own task.
///
/// The channel closing only means the producer stopped. Call [`finish`]
/// after the last batch to learn whether it stopped cleanly.
///
/// [`finish`]: RowReader::finish
pub struct RowReader {
    rx: mpsc::Receiver<Result<Batch>>,
    handle: JoinHandle<()>,
}

impl RowReader {
    /// Spawn `produce` with the sending half of a bounded channel.
    ///
    /// An `Err` returned by the producer is forwarded as the final item.
    pub fn spawn<F, Fut>(produce: F) -> Self
    where
        F: FnOnce(mpsc::Sender<Result<Batch>>) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(READ_AHEAD_BATCHES);
        let task = produce(tx.clone());
        let handle = tokio::spawn(async move {
            if let Err(e) = task.await {
                let _ = tx.send(Err(e)).await;
            }
        });
        Self { rx, handle }
    }

    /// Next batch, or `None` once the producer has exited.
    pub async fn next(&mut self) -> Option<Result<Batch>> {
        self.rx.recv().await
    }

    /// Wait for the producer task to exit.
    ///
    /// Fails when the task panicked or was aborted.
    pub async fn finish(self) -> std::result::Result<(), JoinError> {
        let Self { rx, handle } = self;
        drop(rx);
        handle.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::SqlValue;

    #[tokio::test]
    async fn test_clean_producer_finishes_ok() {
        let mut reader = RowReader::spawn(|tx| async move {
            let _ = tx.send(Ok(Batch::new(vec![vec![SqlValue::I32(1)]]))).await;
            Ok(())
        });

        assert_eq!(reader.next().await.map(|b| b.unwrap().len()), Some(1));
        assert!(reader.next().await.is_none());
        assert!(reader.finish().await.is_ok());
    }

    #[tokio::test]
    async fn test_producer_error_is_last_item() {
        let mut reader = RowReader::spawn(|_tx| async move {
            Err::<(), _>(crate::error::MigrateError::Config("connection reset".into()))
        });

        assert!(matches!(reader.next().await, Some(Err(_))));
        assert!(reader.next().await.is_none());
        assert!(reader.finish().await.is_ok());
    }

    #[tokio::test]
    async fn test_panicking_producer_fails_finish() {
        let mut reader = RowReader::spawn(|tx| async move {
            let _ = tx.send(Ok(Batch::new(vec![vec![SqlValue::I32(1)]]))).await;
            let out_of_range = true;
            if out_of_range {
                panic!("numeric value out of range");
            }
            Ok(())
        });

        assert!(matches!(reader.next().await, Some(Ok(_))));
        assert!(reader.next().await.is_none());
        let err = reader.finish().await.unwrap_err();
        assert!(err.is_panic());
    }
}
