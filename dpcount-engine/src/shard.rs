//! Sharded ingestion.
//!
//! Events are routed by entity so every entity's bounder state lives in
//! exactly one shard; shards therefore never need to coordinate on the
//! contribution bound. Each shard owns its own accumulators, so per-key
//! increments never race. Shard results are folded back into the engine
//! before any accumulator can be finalized.

use std::fmt;

use rayon::prelude::*;
use tracing::debug;

use crate::{
    engine::PartitionCountEngine,
    errors::{IngestError, StateError},
    event::Partitioned,
    summary::RunSummary,
};

impl<K> PartitionCountEngine<K>
where
    K: Ord + Clone + fmt::Debug + Send + Sync,
{
    /// Parallel equivalent of [`PartitionCountEngine::ingest_all`]. Ingestion
    /// order is preserved per entity, so first-seen-wins still holds.
    pub fn ingest_sharded<E>(&mut self, events: &[E], shards: usize) -> Result<RunSummary, StateError>
    where
        E: Partitioned<Key = K> + Sync,
    {
        if self.is_published() {
            return Err(StateError::AlreadyFinalized);
        }
        let shards = shards.max(1);
        let mut buckets: Vec<Vec<&E>> = (0..shards).map(|_| Vec::new()).collect();
        for event in events {
            buckets[event.entity_id().shard(shards)].push(event);
        }

        let workers: Vec<PartitionCountEngine<K>> = self
            .bounder
            .split(shards)
            .into_iter()
            .map(|bounder| self.fork(bounder))
            .collect();

        let finished = buckets
            .into_par_iter()
            .zip(workers)
            .map(|(bucket, mut worker)| {
                for event in bucket {
                    match worker.ingest(event) {
                        Ok(_) | Err(IngestError::OutOfDomain { .. }) => {}
                        Err(IngestError::State(err)) => return Err(err),
                    }
                }
                Ok(worker)
            })
            .collect::<Result<Vec<_>, StateError>>()?;

        for worker in finished {
            self.absorb(worker)?;
        }
        debug!(shards, events = events.len(), "sharded ingestion complete");
        Ok(self.summary())
    }

    fn absorb(&mut self, worker: PartitionCountEngine<K>) -> Result<(), StateError> {
        let PartitionCountEngine {
            bounder,
            raw,
            private,
            events_seen,
            accepted,
            out_of_domain,
            ..
        } = worker;
        for (key, count) in raw {
            if let Some(target) = self.raw.get_mut(&key) {
                target.merge(&count);
            }
        }
        for (key, count) in private {
            if let Some(target) = self.private.get_mut(&key) {
                target.merge(count)?;
            }
        }
        self.bounder.absorb(bounder);
        self.events_seen += events_seen;
        self.accepted += accepted;
        self.out_of_domain += out_of_domain;
        Ok(())
    }
}
