use std::sync::Arc;

use dpcount_engine::{
    EngineError, NoiseRng, PartitionCountEngine, PartitionDomain, ResultMap, RunSummary,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    config::Config,
    report::{write_results, ReportError},
    visit::{read_visits, Visit, VisitError},
};

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Visits(#[from] VisitError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Report(#[from] ReportError),
}

#[derive(Clone, Debug)]
pub struct ScenarioOutcome {
    pub raw: ResultMap<i64>,
    pub private: ResultMap<i64>,
    pub summary: RunSummary,
    /// Visits dropped by the day filter before they reached the engine.
    pub skipped_other_days: u64,
}

/// Counts restaurant visits per opening hour, once exactly and once with
/// Laplace noise, each visitor contributing to at most the configured number
/// of hours.
pub struct VisitsPerHour {
    config: Config,
}

impl VisitsPerHour {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn run(&self, visits: &[Visit], rng: Arc<NoiseRng>) -> Result<ScenarioOutcome, EngineError> {
        let domain = PartitionDomain::new(self.config.domain.hours())?;
        let mut engine = PartitionCountEngine::with_rng(domain, self.config.privacy.clone(), rng)?;

        let selected: Vec<Visit> = match self.config.scenario.day {
            Some(day) => visits.iter().filter(|v| v.day == day).cloned().collect(),
            None => visits.to_vec(),
        };
        let skipped_other_days = (visits.len() - selected.len()) as u64;
        if skipped_other_days > 0 {
            info!(
                skipped = skipped_other_days,
                day = ?self.config.scenario.day,
                "visits from other days skipped"
            );
        }

        match self.config.scenario.shards {
            0 | 1 => engine.ingest_all(&selected)?,
            shards => engine.ingest_sharded(&selected, shards)?,
        };
        if engine.out_of_domain() > 0 {
            warn!(
                visits = engine.out_of_domain(),
                "visits outside opening hours were not counted"
            );
        }

        let raw = engine.raw_counts();
        let private = engine.private_counts()?.clone();
        Ok(ScenarioOutcome {
            raw,
            private,
            summary: engine.summary(),
            skipped_other_days,
        })
    }

    /// Reads the configured CSV, runs the counts and writes both result files.
    pub fn run_files(&self, rng: Arc<NoiseRng>) -> Result<ScenarioOutcome, ScenarioError> {
        let io = &self.config.io;
        let visits = read_visits(&io.input)?;
        info!(path = %io.input.display(), visits = visits.len(), "visits loaded");
        let outcome = self.run(&visits, rng)?;
        write_results(&io.non_private_output, &outcome.raw)?;
        write_results(&io.private_output, &outcome.private)?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;

    fn visit(visitor_id: i64, hour: u32, day: i64) -> Visit {
        Visit {
            visitor_id,
            visit_time: NaiveTime::from_hms_opt(hour, 15, 0).unwrap(),
            minutes_spent: 30,
            euros_spent: 12,
            day,
        }
    }

    fn seeded() -> Arc<NoiseRng> {
        Arc::new(NoiseRng::from_seed([7; 32]))
    }

    #[test]
    fn counts_every_opening_hour() {
        let scenario = VisitsPerHour::new(Config::sample());
        let visits = [visit(1, 9, 1), visit(2, 9, 1), visit(3, 14, 2), visit(4, 22, 1)];
        let outcome = scenario.run(&visits, seeded()).unwrap();
        assert_eq!(outcome.raw.len(), 12);
        assert_eq!(outcome.private.len(), 12);
        assert_eq!(outcome.raw.get(&9), Some(2));
        assert_eq!(outcome.raw.get(&14), Some(1));
        assert_eq!(outcome.raw.get(&22), None);
        assert_eq!(outcome.summary.out_of_domain, 1);
        assert!(outcome.summary.published);
        assert_eq!(outcome.skipped_other_days, 0);
    }

    #[test]
    fn day_filter_drops_other_days() {
        let mut config = Config::sample();
        config.scenario.day = Some(1);
        let scenario = VisitsPerHour::new(config);
        let visits = [visit(1, 9, 1), visit(2, 10, 2), visit(3, 10, 3)];
        let outcome = scenario.run(&visits, seeded()).unwrap();
        assert_eq!(outcome.skipped_other_days, 2);
        assert_eq!(outcome.summary.events_seen, 1);
        assert_eq!(outcome.raw.get(&10), Some(0));
    }

    #[test]
    fn sharded_run_matches_sequential_run() {
        let visits: Vec<Visit> = (0..500)
            .map(|i| visit(i % 120, 8 + (i % 14) as u32, 1))
            .collect();
        let sequential = VisitsPerHour::new(Config::sample()).run(&visits, seeded()).unwrap();
        let mut config = Config::sample();
        config.scenario.shards = 4;
        let sharded = VisitsPerHour::new(config).run(&visits, seeded()).unwrap();
        assert_eq!(sequential.raw, sharded.raw);
        assert_eq!(sequential.summary.accepted, sharded.summary.accepted);
    }
}
