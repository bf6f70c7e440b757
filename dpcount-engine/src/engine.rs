use std::{collections::BTreeMap, fmt, sync::Arc};

use tracing::{debug, info, warn};

use crate::{
    accumulator::{PrivateCount, RawCount},
    bounder::{Admission, ContributionBounder, DropReason},
    config::PrivacyParameters,
    domain::PartitionDomain,
    errors::{ConfigError, IngestError, StateError},
    event::Partitioned,
    noise::{NoiseMechanism, NoiseRng},
    result::ResultMap,
    summary::RunSummary,
};

/// Single-shot partitioned count over a closed key domain.
///
/// One raw and one private accumulator exist per domain key from construction
/// on. Events are bounded, validated against the domain and routed to both
/// sets in the same pass. [`PartitionCountEngine::private_counts`] spends the
/// privacy budget once; every later call returns the cached map.
pub struct PartitionCountEngine<K: Ord> {
    domain: PartitionDomain<K>,
    params: PrivacyParameters,
    mechanism: NoiseMechanism,
    rng: Arc<NoiseRng>,
    pub(crate) bounder: ContributionBounder<K>,
    pub(crate) raw: BTreeMap<K, RawCount>,
    pub(crate) private: BTreeMap<K, PrivateCount>,
    published: Option<ResultMap<K>>,
    pub(crate) events_seen: u64,
    pub(crate) accepted: u64,
    pub(crate) out_of_domain: u64,
}

impl<K> PartitionCountEngine<K>
where
    K: Ord + Clone + fmt::Debug,
{
    /// Builds an engine backed by a ChaCha20 generator seeded from OS entropy.
    pub fn new(domain: PartitionDomain<K>, params: PrivacyParameters) -> Result<Self, ConfigError> {
        Self::with_rng(domain, params, Arc::new(NoiseRng::secure()))
    }

    pub fn with_rng(
        domain: PartitionDomain<K>,
        params: PrivacyParameters,
        rng: Arc<NoiseRng>,
    ) -> Result<Self, ConfigError> {
        params.validate()?;
        let mechanism = NoiseMechanism::calibrate(params.noise, params.epsilon, params.l1_sensitivity())?;
        let bounder = ContributionBounder::new(&params);
        let engine = Self::assemble(domain, params, mechanism, rng, bounder);
        info!(
            partitions = engine.domain.len(),
            epsilon = engine.params.epsilon,
            sensitivity = mechanism.sensitivity(),
            scale = mechanism.scale(),
            noise = mechanism.kind().as_str(),
            "partition count engine ready"
        );
        Ok(engine)
    }

    fn assemble(
        domain: PartitionDomain<K>,
        params: PrivacyParameters,
        mechanism: NoiseMechanism,
        rng: Arc<NoiseRng>,
        bounder: ContributionBounder<K>,
    ) -> Self {
        let raw = domain.iter().map(|k| (k.clone(), RawCount::default())).collect();
        let private = domain
            .iter()
            .map(|k| (k.clone(), PrivateCount::new(mechanism, Arc::clone(&rng))))
            .collect();
        Self {
            domain,
            params,
            mechanism,
            rng,
            bounder,
            raw,
            private,
            published: None,
            events_seen: 0,
            accepted: 0,
            out_of_domain: 0,
        }
    }

    /// Fresh engine over the same domain and calibration that takes over the
    /// given bounder state. Used for shards.
    pub(crate) fn fork(&self, bounder: ContributionBounder<K>) -> Self {
        Self::assemble(
            self.domain.clone(),
            self.params.clone(),
            self.mechanism,
            Arc::clone(&self.rng),
            bounder,
        )
    }

    pub fn ingest<E>(&mut self, event: &E) -> Result<Admission, IngestError>
    where
        E: Partitioned<Key = K>,
    {
        if self.published.is_some() {
            return Err(StateError::AlreadyFinalized.into());
        }
        self.events_seen += 1;
        let key = event.partition_key();
        if !self.domain.contains(&key) {
            return Err(self.reject_out_of_domain(&key));
        }
        let admission = self.bounder.admit(event.entity_id(), &key);
        if admission.is_accepted() {
            let routed = match (self.raw.get_mut(&key), self.private.get_mut(&key)) {
                (Some(raw), Some(private)) => {
                    private.increment()?;
                    raw.increment();
                    true
                }
                _ => false,
            };
            if !routed {
                return Err(self.reject_out_of_domain(&key));
            }
            self.accepted += 1;
        }
        Ok(admission)
    }

    fn reject_out_of_domain(&mut self, key: &K) -> IngestError {
        self.out_of_domain += 1;
        warn!(?key, "event partition key outside the declared domain");
        IngestError::OutOfDomain {
            key: format!("{key:?}"),
        }
    }

    /// Ingests every event, skipping and counting out-of-domain keys.
    /// Only a protocol violation (ingesting after publication) stops the run.
    pub fn ingest_all<'a, E, I>(&mut self, events: I) -> Result<RunSummary, StateError>
    where
        E: Partitioned<Key = K> + 'a,
        I: IntoIterator<Item = &'a E>,
    {
        for event in events {
            match self.ingest(event) {
                Ok(_) | Err(IngestError::OutOfDomain { .. }) => {}
                Err(IngestError::State(err)) => return Err(err),
            }
        }
        debug!(
            events = self.events_seen,
            accepted = self.accepted,
            "ingestion pass complete"
        );
        Ok(self.summary())
    }

    /// Exact counts for every domain key, consistent with everything ingested so far.
    pub fn raw_counts(&self) -> ResultMap<K> {
        ResultMap::new(
            self.raw
                .iter()
                .map(|(k, count)| (k.clone(), count.value()))
                .collect(),
        )
    }

    /// Finalizes every private accumulator on the first call and caches the map.
    pub fn private_counts(&mut self) -> Result<&ResultMap<K>, StateError> {
        let published = match self.published.take() {
            Some(published) => published,
            None => self.finalize_private()?,
        };
        Ok(self.published.insert(published))
    }

    /// Draws one noise sample per key. The accumulators are discarded only
    /// once every key has a result; a failed finalization leaves them in place
    /// so later calls keep failing instead of publishing a partial map.
    fn finalize_private(&mut self) -> Result<ResultMap<K>, StateError> {
        let counts = self
            .private
            .iter_mut()
            .map(|(key, accumulator)| accumulator.result().map(|count| (key.clone(), count)))
            .collect::<Result<BTreeMap<K, i64>, StateError>>()?;
        self.private.clear();
        info!(
            partitions = counts.len(),
            epsilon = self.params.epsilon,
            scale = self.mechanism.scale(),
            "private counts published"
        );
        Ok(ResultMap::new(counts))
    }

    pub fn is_published(&self) -> bool {
        self.published.is_some()
    }

    /// Events rejected by the contribution bounder.
    pub fn dropped_contributions(&self) -> u64 {
        self.bounder.dropped()
    }

    pub fn out_of_domain(&self) -> u64 {
        self.out_of_domain
    }

    pub fn domain(&self) -> &PartitionDomain<K> {
        &self.domain
    }

    pub fn params(&self) -> &PrivacyParameters {
        &self.params
    }

    pub fn mechanism(&self) -> &NoiseMechanism {
        &self.mechanism
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            events_seen: self.events_seen,
            accepted: self.accepted,
            dropped_partition_limit: self.bounder.dropped_by(DropReason::PartitionLimit),
            dropped_contribution_limit: self.bounder.dropped_by(DropReason::ContributionLimit),
            out_of_domain: self.out_of_domain,
            partitions: self.domain.len(),
            distinct_entities: self.bounder.distinct_entities(),
            noise: self.mechanism.kind(),
            epsilon: self.mechanism.epsilon(),
            sensitivity: self.mechanism.sensitivity(),
            noise_scale: self.mechanism.scale(),
            published: self.is_published(),
        }
    }
}

impl<K: Ord + fmt::Debug> fmt::Debug for PartitionCountEngine<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionCountEngine")
            .field("partitions", &self.domain.len())
            .field("params", &self.params)
            .field("events_seen", &self.events_seen)
            .field("published", &self.published.is_some())
            .finish_non_exhaustive()
    }
}
