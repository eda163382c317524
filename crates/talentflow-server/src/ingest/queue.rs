//! Ingestion job queue
//!
//! Serializes ingestion runs: one worker task drains an unbounded channel
//! and only picks the next job after the previous run settles, so the
//! store sees at most one bulk write stream at a time and no job id can
//! ever be processed twice concurrently. The queue is an owned object
//! wired at service start, so tests construct isolated instances.

use std::collections::BTreeMap;

use talentflow_ingest::mapping::CanonicalField;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

use super::engine;
use crate::store::Stores;

/// One unit of queued work.
#[derive(Debug, Clone)]
pub struct QueuedIngest {
    pub job_id: Uuid,
    pub storage_path: String,
    pub source_file: String,
    pub mapping: BTreeMap<String, Option<CanonicalField>>,
}

#[derive(Debug, Error)]
#[error("ingest queue is not running")]
pub struct QueueClosed;

/// Handle to the running ingestion worker.
#[derive(Clone)]
pub struct IngestQueue {
    tx: mpsc::UnboundedSender<QueuedIngest>,
}

impl IngestQueue {
    /// Spawn the worker task and return the enqueue handle. The worker
    /// stops when every handle is dropped.
    pub fn start(stores: Stores) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<QueuedIngest>();

        tokio::spawn(async move {
            while let Some(item) = rx.recv().await {
                info!(job_id = %item.job_id, file = item.source_file, "picking up ingestion job");
                match engine::run(
                    &stores,
                    item.job_id,
                    &item.storage_path,
                    &item.source_file,
                    &item.mapping,
                )
                .await
                {
                    Ok(summary) => info!(
                        job_id = %item.job_id,
                        status = %summary.status,
                        processed = summary.processed_rows,
                        errors = summary.error_count,
                        "ingestion run settled"
                    ),
                    // A failed run is already a terminal job state; an Err
                    // here means the run could not even start. The worker
                    // carries on with the next job either way.
                    Err(e) => error!(job_id = %item.job_id, error = %e, "ingestion run errored"),
                }
            }
            info!("ingest queue worker stopped");
        });

        Self { tx }
    }

    pub fn enqueue(&self, item: QueuedIngest) -> Result<(), QueueClosed> {
        self.tx.send(item).map_err(|_| QueueClosed)
    }
}
