use std::sync::Arc;

use dpcount_engine::{
    Admission, DropReason, Event, IngestError, NoiseKind, NoiseRng, PartitionCountEngine,
    PartitionDomain, PrivacyParameters,
};
use proptest::prelude::*;

fn seeded_engine(
    keys: impl IntoIterator<Item = i64>,
    params: PrivacyParameters,
    seed: u8,
) -> PartitionCountEngine<i64> {
    let domain = PartitionDomain::new(keys).expect("non-empty domain");
    PartitionCountEngine::with_rng(domain, params, Arc::new(NoiseRng::from_seed([seed; 32])))
        .expect("valid engine")
}

fn ln3() -> PrivacyParameters {
    PrivacyParameters::new(3f64.ln(), 1, NoiseKind::Laplace)
}

#[test]
fn raw_counts_for_restaurant_example() {
    let mut engine = seeded_engine([9, 10, 15, 20], ln3(), 1);
    let events = [
        Event::new(1, 9),
        Event::new(2, 9),
        Event::new(3, 10),
        Event::new(4, 15),
        Event::new(5, 20),
    ];
    engine.ingest_all(&events).unwrap();
    let raw = engine.raw_counts();
    assert_eq!(
        raw.into_inner().into_iter().collect::<Vec<_>>(),
        vec![(9, 2), (10, 1), (15, 1), (20, 1)]
    );
}

#[test]
fn second_partition_of_an_entity_is_dropped() {
    let mut engine = seeded_engine(9..=20, ln3(), 2);
    assert_eq!(engine.ingest(&Event::new(1, 9)).unwrap(), Admission::Accepted);
    assert_eq!(
        engine.ingest(&Event::new(1, 10)).unwrap(),
        Admission::Dropped(DropReason::PartitionLimit)
    );
    assert_eq!(engine.ingest(&Event::new(2, 10)).unwrap(), Admission::Accepted);

    assert_eq!(engine.dropped_contributions(), 1);
    let raw = engine.raw_counts();
    assert_eq!(raw.get(&9), Some(1));
    assert_eq!(raw.get(&10), Some(1));
}

#[test]
fn key_outside_domain_never_reaches_results() {
    let mut engine = seeded_engine(9..=20, ln3(), 3);
    assert!(matches!(
        engine.ingest(&Event::new(1, 3)),
        Err(IngestError::OutOfDomain { .. })
    ));
    assert_eq!(engine.raw_counts().len(), 12);
    assert!(engine.raw_counts().get(&3).is_none());
    let private = engine.private_counts().unwrap();
    assert_eq!(private.len(), 12);
    assert!(private.get(&3).is_none());
}

#[test]
fn private_counts_are_cached_after_first_call() {
    let mut engine = seeded_engine(9..=20, ln3(), 4);
    engine.ingest_all(&[Event::new(1, 9), Event::new(2, 12)]).unwrap();
    let first = engine.private_counts().unwrap().clone();
    let second = engine.private_counts().unwrap().clone();
    assert_eq!(first, second);
    assert!(engine.summary().published);
}

#[test]
fn empty_run_private_counts_average_to_zero() {
    // 400 independent engines x 12 partitions of pure noise with scale 1/ln3.
    let mut samples = Vec::new();
    for run in 0..400u32 {
        let domain = PartitionDomain::new(9..=20).unwrap();
        let rng = Arc::new(NoiseRng::from_label(format!("empty-run-{run}")));
        let mut engine = PartitionCountEngine::with_rng(domain, ln3(), rng).unwrap();
        assert!(engine.raw_counts().iter().all(|(_, v)| *v == 0));
        samples.extend(engine.private_counts().unwrap().iter().map(|(_, v)| *v as f64));
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let scale = 1.0 / 3f64.ln();
    // Rounding adds at most 1/12 to the variance of the continuous sample.
    let se = ((2.0 * scale * scale + 1.0 / 12.0) / n).sqrt();
    assert!(mean.abs() < 5.0 * se, "mean {mean} exceeds 5 standard errors ({se})");
}

#[test]
fn larger_epsilon_means_less_spread_in_private_counts() {
    fn spread(epsilon: f64) -> f64 {
        let mut samples = Vec::new();
        for run in 0..300u32 {
            let domain = PartitionDomain::new(0..10).unwrap();
            let rng = Arc::new(NoiseRng::from_label(format!("spread-{epsilon}-{run}")));
            let params = PrivacyParameters::new(epsilon, 1, NoiseKind::Laplace);
            let mut engine = PartitionCountEngine::with_rng(domain, params, rng).unwrap();
            samples.extend(engine.private_counts().unwrap().iter().map(|(_, v)| *v as f64));
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
    }
    assert!(spread(2.0) < spread(0.25));
}

#[test]
fn sharded_ingestion_matches_sequential_raw_counts() {
    let events: Vec<Event<i64>> = (0..2_000)
        .map(|i| Event::new(i % 350, 9 + (i * 7) % 14))
        .collect();

    let mut sequential = seeded_engine(9..=20, ln3(), 9);
    let seq_summary = sequential.ingest_all(&events).unwrap();

    let mut sharded = seeded_engine(9..=20, ln3(), 9);
    let shard_summary = sharded.ingest_sharded(&events, 4).unwrap();

    assert_eq!(sequential.raw_counts(), sharded.raw_counts());
    assert_eq!(seq_summary.accepted, shard_summary.accepted);
    assert_eq!(seq_summary.out_of_domain, shard_summary.out_of_domain);
    assert_eq!(
        seq_summary.dropped_contributions(),
        shard_summary.dropped_contributions()
    );
    assert_eq!(seq_summary.distinct_entities, shard_summary.distinct_entities);
    assert_eq!(sharded.private_counts().unwrap().len(), 12);
}

#[test]
fn sharded_ingestion_keeps_earlier_bounder_state() {
    let mut engine = seeded_engine(9..=20, ln3(), 10);
    engine.ingest(&Event::new(42, 9)).unwrap();
    engine.ingest_sharded(&[Event::new(42, 10)], 3).unwrap();
    assert_eq!(engine.dropped_contributions(), 1);
    assert_eq!(engine.raw_counts().get(&10), Some(0));
}

#[test]
fn summary_serializes_as_kebab_case_json() {
    let mut engine = seeded_engine([9, 10], ln3(), 11);
    engine.ingest_all(&[Event::new(1, 9)]).unwrap();
    let json = serde_json::to_value(engine.summary()).unwrap();
    assert_eq!(json["events-seen"], 1);
    assert_eq!(json["noise"], "laplace");
    assert_eq!(json["published"], false);
}

proptest! {
    #[test]
    fn result_keys_always_equal_the_domain(
        keys in proptest::collection::btree_set(0i64..48, 1..24),
        events in proptest::collection::vec((0i64..40, 0i64..64), 0..200),
    ) {
        let mut engine = seeded_engine(keys.iter().copied(), ln3(), 12);
        let events: Vec<_> = events.into_iter().map(|(entity, key)| Event::new(entity, key)).collect();
        engine.ingest_all(&events).unwrap();

        let raw_keys: Vec<i64> = engine.raw_counts().keys().copied().collect();
        let private_keys: Vec<i64> = engine.private_counts().unwrap().keys().copied().collect();
        let expected: Vec<i64> = keys.into_iter().collect();
        prop_assert_eq!(&raw_keys, &expected);
        prop_assert_eq!(&private_keys, &expected);
    }

    #[test]
    fn accepted_events_equal_raw_total(
        events in proptest::collection::vec((0i64..20, 0i64..30), 0..300),
        partitions in 1u32..4,
    ) {
        let params = PrivacyParameters::new(1.0, partitions, NoiseKind::Laplace);
        let mut engine = seeded_engine(0..24, params, 13);
        let events: Vec<_> = events.into_iter().map(|(entity, key)| Event::new(entity, key)).collect();
        let summary = engine.ingest_all(&events).unwrap();
        prop_assert_eq!(engine.raw_counts().total() as u64, summary.accepted);
        prop_assert_eq!(
            summary.accepted + summary.dropped_contributions() + summary.out_of_domain,
            summary.events_seen
        );
    }
}
