//! In-memory record store with optional JSON snapshot

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::errors::PipelineError;
use crate::filesys::file::File;
use crate::models::deployment::DeploymentRecord;
use crate::store::{DeploymentQuery, DeploymentStore, Mutation};

#[derive(Default)]
struct Records {
    by_id: HashMap<String, (u64, DeploymentRecord)>,
    next_seq: u64,
}

impl Records {
    fn sorted(&self) -> Vec<&(u64, DeploymentRecord)> {
        let mut rows: Vec<_> = self.by_id.values().collect();
        rows.sort_by(|(seq_a, a), (seq_b, b)| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| seq_b.cmp(seq_a))
        });
        rows
    }
}

/// Record store kept in memory, optionally mirrored to a JSON file
pub struct MemoryStore {
    records: RwLock<Records>,
    snapshot: Option<File>,
}

impl MemoryStore {
    /// Create an empty, purely in-memory store
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Records::default()),
            snapshot: None,
        }
    }

    /// Open a store mirrored to `snapshot`, loading any existing records
    pub async fn open(snapshot: File) -> Result<Self, PipelineError> {
        let mut records = Records::default();

        if snapshot.exists().await {
            let mut loaded: Vec<DeploymentRecord> = snapshot.read_json().await?;
            loaded.sort_by_key(|record| record.created_at);
            for record in loaded {
                let seq = records.next_seq;
                records.next_seq += 1;
                records.by_id.insert(record.id.clone(), (seq, record));
            }
            info!(
                "Loaded {} deployment records from {}",
                records.by_id.len(),
                snapshot.path().display()
            );
        }

        Ok(Self {
            records: RwLock::new(records),
            snapshot: Some(snapshot),
        })
    }

    async fn persist(&self, records: &Records) -> Result<(), PipelineError> {
        let Some(snapshot) = &self.snapshot else {
            return Ok(());
        };

        let rows: Vec<&DeploymentRecord> = records
            .sorted()
            .into_iter()
            .rev()
            .map(|(_, record)| record)
            .collect();
        snapshot.write_json(&rows).await?;
        debug!("Wrote {} records to snapshot", rows.len());
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeploymentStore for MemoryStore {
    async fn insert(&self, record: DeploymentRecord) -> Result<(), PipelineError> {
        let mut records = self.records.write().await;
        if records.by_id.contains_key(&record.id) {
            return Err(PipelineError::InvalidState(format!(
                "deployment {} already exists",
                record.id
            )));
        }

        let seq = records.next_seq;
        records.next_seq += 1;
        records.by_id.insert(record.id.clone(), (seq, record));
        self.persist(&records).await
    }

    async fn get(&self, id: &str) -> Result<Option<DeploymentRecord>, PipelineError> {
        let records = self.records.read().await;
        Ok(records.by_id.get(id).map(|(_, record)| record.clone()))
    }

    async fn list(&self, query: &DeploymentQuery) -> Result<Vec<DeploymentRecord>, PipelineError> {
        let records = self.records.read().await;
        let matching = records
            .sorted()
            .into_iter()
            .map(|(_, record)| record)
            .filter(|record| query.matches(record))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(matching)
    }

    async fn update(
        &self,
        id: &str,
        mutation: Mutation,
    ) -> Result<DeploymentRecord, PipelineError> {
        let mut records = self.records.write().await;
        let (_, stored) = records
            .by_id
            .get_mut(id)
            .ok_or_else(|| PipelineError::not_found("deployment", id))?;

        let mut candidate = stored.clone();
        mutation(&mut candidate)?;
        *stored = candidate.clone();

        self.persist(&records).await?;
        Ok(candidate)
    }

    async fn count_attempts(
        &self,
        repository_id: &str,
        commit_hash: &str,
    ) -> Result<usize, PipelineError> {
        let records = self.records.read().await;
        Ok(records
            .by_id
            .values()
            .filter(|(_, record)| {
                record.repository_id == repository_id && record.commit_hash == commit_hash
            })
            .count())
    }
}
