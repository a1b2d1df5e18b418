//! Durable queue backend over SQLite
//!
//! Re-creation of the hand-rolled relational queue: one row per pending
//! batch plus two singleton counter rows, `high_mark` (next id to assign on
//! enqueue) and `low_mark` (next id to hand out on dequeue). Counter reads
//! and updates run inside `BEGIN IMMEDIATE` transactions so several broker
//! processes sharing one store never assign the same id and never dequeue
//! the same row twice.
//!
//! Dequeue advances the low mark and then fetches the row in a separate
//! step; deletion happens later still, in `mark_processed`. A crash between
//! the advance and the delete leaves an orphaned row that is never
//! revisited — an accepted at-most-once risk of this contract, preserved
//! rather than silently fixed.

use crate::queue::batch::{NotificationBatch, QueuedBatch};
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::traits::DeliveryQueue;
use crate::queue::{next_wait, WAIT_STEP};
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use std::path::Path;
use tokio_rusqlite::Connection;

/// Status flag stored per row; reserved for future use, always "open"
const STATUS_OPEN: i64 = 0;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS queue (
    id       INTEGER PRIMARY KEY,
    track_id INTEGER NOT NULL,
    message  TEXT NOT NULL,
    status   INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS high_mark (value INTEGER NOT NULL);
CREATE TABLE IF NOT EXISTS low_mark  (value INTEGER NOT NULL);
";

/// SQLite-backed delivery queue surviving process restarts
pub struct DurableQueue {
    conn: Connection,
}

enum Advance {
    Ready(i64),
    Empty,
    Uninitialised,
}

impl DurableQueue {
    /// Open (or create) the store at `path` and seed the counter rows
    pub async fn open<P: AsRef<Path> + Send + 'static>(path: P) -> QueueResult<Self> {
        let conn = Connection::open(path).await?;
        let queue = Self { conn };
        queue.init_storage().await?;
        Ok(queue)
    }

    async fn init_storage(&self) -> QueueResult<()> {
        self.conn
            .call(|conn| {
                conn.pragma_update(None, "journal_mode", "WAL")?;
                conn.pragma_update(None, "busy_timeout", 5000)?;

                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                tx.execute_batch(SCHEMA)?;

                // Seed the marks on first run only; an existing store keeps
                // its counters so pending rows survive a restart.
                let high: Option<i64> = tx
                    .query_row("SELECT value FROM high_mark", [], |r| r.get(0))
                    .optional()?;
                if high.is_none() {
                    tx.execute("INSERT INTO high_mark (value) VALUES (1)", [])?;
                }
                let low: Option<i64> = tx
                    .query_row("SELECT value FROM low_mark", [], |r| r.get(0))
                    .optional()?;
                if low.is_none() {
                    tx.execute("INSERT INTO low_mark (value) VALUES (1)", [])?;
                }
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Claim the next sequence id if the queue is non-empty
    ///
    /// Reads both marks under the write transaction; when low < high the low
    /// mark is advanced by one and the claimed id returned. The emptiness
    /// check is race-free because concurrent enqueues and dequeues all
    /// serialize on the same write transaction.
    async fn advance_low_mark(&self) -> QueueResult<Option<u64>> {
        let advance = self
            .conn
            .call(|conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let low: Option<i64> = tx
                    .query_row("SELECT value FROM low_mark", [], |r| r.get(0))
                    .optional()?;
                let high: Option<i64> = tx
                    .query_row("SELECT value FROM high_mark", [], |r| r.get(0))
                    .optional()?;
                let (low, high) = match (low, high) {
                    (Some(low), Some(high)) => (low, high),
                    _ => return Ok(Advance::Uninitialised),
                };
                if high > low {
                    tx.execute("UPDATE low_mark SET value = value + 1", [])?;
                    tx.commit()?;
                    Ok(Advance::Ready(low))
                } else {
                    Ok(Advance::Empty)
                }
            })
            .await?;

        match advance {
            Advance::Ready(sequence) => Ok(Some(sequence as u64)),
            Advance::Empty => Ok(None),
            Advance::Uninitialised => Err(QueueError::CountersMissing),
        }
    }

    /// Fetch the row at a claimed sequence id
    async fn fetch(&self, sequence: u64) -> QueueResult<NotificationBatch> {
        let seq = sequence as i64;
        let encoded: Option<String> = self
            .conn
            .call(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT message FROM queue WHERE id = ?1",
                        params![seq],
                        |r| r.get(0),
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;

        let encoded = encoded.ok_or(QueueError::RowMissing { sequence })?;
        Ok(serde_json::from_str(&encoded)?)
    }
}

#[async_trait]
impl DeliveryQueue for DurableQueue {
    async fn enqueue(&self, batch: NotificationBatch) -> QueueResult<u64> {
        let track_id = batch.metadata.track_id as i64;
        let encoded = serde_json::to_string(&batch)?;

        let sequence = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let next: Option<i64> = tx
                    .query_row("SELECT value FROM high_mark", [], |r| r.get(0))
                    .optional()?;
                let next = match next {
                    Some(value) => value,
                    None => return Ok(None),
                };
                tx.execute("UPDATE high_mark SET value = value + 1", [])?;
                tx.execute(
                    "INSERT INTO queue (id, track_id, message, status) VALUES (?1, ?2, ?3, ?4)",
                    params![next, track_id, encoded, STATUS_OPEN],
                )?;
                tx.commit()?;
                Ok(Some(next))
            })
            .await?;

        let sequence = sequence.ok_or(QueueError::CountersMissing)?;
        log::trace!("Enqueued batch at sequence {sequence}");
        Ok(sequence as u64)
    }

    async fn try_dequeue(&self) -> QueueResult<Option<QueuedBatch>> {
        loop {
            let Some(sequence) = self.advance_low_mark().await? else {
                return Ok(None);
            };
            match self.fetch(sequence).await {
                Ok(batch) => return Ok(Some(QueuedBatch { sequence, batch })),
                Err(QueueError::Encoding(err)) => {
                    // The low mark already moved past this row; all we can
                    // do is skip it.
                    log::error!(
                        "Batch at sequence {sequence} is undecodable and will be skipped: {err}"
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn blocking_dequeue(&self) -> QueueResult<QueuedBatch> {
        let mut wait = WAIT_STEP;
        loop {
            match self.try_dequeue().await {
                Ok(Some(entry)) => return Ok(entry),
                Ok(None) => {
                    log::trace!("Queue empty, sleeping {}ms", wait.as_millis());
                    tokio::time::sleep(wait).await;
                    wait = next_wait(wait);
                }
                Err(err @ QueueError::CountersMissing) => return Err(err),
                Err(err) => {
                    // Store connectivity problems are survivable; keep
                    // retrying and recover once the store returns.
                    log::error!("Dequeue failed, backing off and retrying: {err}");
                    tokio::time::sleep(wait).await;
                    wait = next_wait(wait);
                }
            }
        }
    }

    async fn mark_processed(&self, sequence: u64) -> QueueResult<()> {
        let seq = sequence as i64;
        let deleted = self
            .conn
            .call(move |conn| {
                let deleted = conn.execute("DELETE FROM queue WHERE id = ?1", params![seq])?;
                Ok(deleted)
            })
            .await?;

        if deleted == 0 {
            log::debug!("mark_processed({sequence}) found no row to delete");
        }
        Ok(())
    }

    async fn size(&self) -> QueueResult<usize> {
        let count: i64 = self
            .conn
            .call(|conn| {
                let count = conn.query_row("SELECT COUNT(*) FROM queue", [], |r| r.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count as usize)
    }

    async fn cleanup(&self) -> QueueResult<()> {
        self.conn
            .call(|conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                tx.execute("DELETE FROM queue", [])?;
                tx.execute("UPDATE high_mark SET value = 1", [])?;
                tx.execute("UPDATE low_mark SET value = 1", [])?;
                tx.commit()?;
                Ok(())
            })
            .await?;
        log::info!("Durable queue purged");
        Ok(())
    }
}
