//! Per-site staging queues for pull-based federation sync.
//!
//! Publishers enqueue job references addressed to a site; the sync endpoint
//! drains a batch per pull. Duplicate jobs coalesce in place so the queue
//! stays bounded under event storms. There is no drain acknowledgement: a
//! crash between drain and response loses the batch, and redelivery happens
//! on the next catalog change. Downstream application must be idempotent.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use meridian_core::bus::Event;
use meridian_core::model::{JobAction, JobData, JobObjectType};

use crate::error::{ControlError, ControlResult};
use crate::managers::SitesManager;

/// One queued job addressed to a site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagingEntry {
    /// Destination site.
    pub site_id: String,
    /// The queued work.
    pub job: JobData,
    /// When the entry was first enqueued.
    pub enqueued_at: DateTime<Utc>,
}

type Fingerprint = (JobObjectType, String, JobAction);

#[derive(Debug, Default)]
struct SiteQueue {
    entries: VecDeque<StagingEntry>,
    fingerprints: HashSet<Fingerprint>,
}

/// Per-site FIFO work queues with fingerprint coalescing.
pub struct StagingManager {
    sites: Arc<SitesManager>,
    queues: DashMap<String, Arc<Mutex<SiteQueue>>>,
    batch_size: usize,
}

impl StagingManager {
    /// Create a staging manager validating destinations against `sites`.
    #[must_use]
    pub fn new(sites: Arc<SitesManager>, batch_size: usize) -> Self {
        Self {
            sites,
            queues: DashMap::new(),
            batch_size,
        }
    }

    /// Enqueue the job carried by an event for the site named in its
    /// metadata.
    ///
    /// Fails with `BadRequest` when the `site` metadata is missing or the
    /// body is not job data, and with `NotFound` when the site is not
    /// registered.
    pub async fn handle_job_event(&self, event: &Event) -> ControlResult<()> {
        let site = match event.metadata("site") {
            Some(site) if !site.is_empty() => site.to_owned(),
            _ => return Err(ControlError::bad_request("site is not supplied")),
        };
        let job: JobData = event
            .body_as()
            .map_err(|e| ControlError::bad_request(format!("event body is not job data: {e}")))?;

        // Invariant: entries may only address registered sites.
        self.sites.get_spec(&site).await?;

        self.enqueue(&site, job).await;
        Ok(())
    }

    async fn enqueue(&self, site: &str, job: JobData) {
        let queue = self
            .queues
            .entry(site.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(SiteQueue::default())))
            .clone();

        let mut queue = queue.lock().await;
        let fingerprint: Fingerprint = (job.object_type, job.id.clone(), job.action);

        if queue.fingerprints.contains(&fingerprint) {
            // Coalesce: replace the queued entry in place, keeping its
            // position and original enqueue time.
            if let Some(existing) = queue
                .entries
                .iter_mut()
                .find(|e| e.job.fingerprint() == job.fingerprint())
            {
                debug!(site, id = %job.id, "coalesced staged job");
                existing.job = job;
                return;
            }
        }

        queue.fingerprints.insert(fingerprint);
        queue.entries.push_back(StagingEntry {
            site_id: site.to_owned(),
            job,
            enqueued_at: Utc::now(),
        });
        debug!(site, depth = queue.entries.len(), "staged job enqueued");
    }

    /// Remove and return up to one batch from the head of a site's queue.
    ///
    /// The removal is transactional: either every returned entry is removed
    /// or none is. An unknown site drains empty.
    pub async fn get_batch_for_site(&self, site: &str) -> ControlResult<Vec<JobData>> {
        let Some(queue) = self.queues.get(site).map(|q| q.value().clone()) else {
            return Ok(Vec::new());
        };

        let mut queue = queue.lock().await;
        let count = queue.entries.len().min(self.batch_size);
        let mut batch = Vec::with_capacity(count);
        for _ in 0..count {
            let entry = queue
                .entries
                .pop_front()
                .ok_or_else(|| ControlError::internal("staging queue shrank during drain"))?;
            queue.fingerprints.remove(&(
                entry.job.object_type,
                entry.job.id.clone(),
                entry.job.action,
            ));
            batch.push(entry.job);
        }
        debug!(site, drained = batch.len(), "staging batch drained");
        Ok(batch)
    }

    /// Number of entries currently queued for a site.
    pub async fn queued_count(&self, site: &str) -> usize {
        match self.queues.get(site).map(|q| q.value().clone()) {
            Some(queue) => queue.lock().await.entries.len(),
            None => 0,
        }
    }
}

impl std::fmt::Debug for StagingManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingManager")
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}
