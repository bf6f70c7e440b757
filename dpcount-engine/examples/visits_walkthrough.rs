use dpcount_engine::{Event, NoiseKind, PartitionCountEngine, PartitionDomain, PrivacyParameters};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let domain = PartitionDomain::new(9..=20)?;
    let params = PrivacyParameters::new(3f64.ln(), 1, NoiseKind::Laplace);
    let mut engine = PartitionCountEngine::new(domain, params)?;

    let visits = [
        Event::new(1, 9),
        Event::new(2, 9),
        Event::new(3, 10),
        Event::new(4, 15),
        Event::new(5, 20),
        // Second visit of visitor 1 lands in another hour and is dropped.
        Event::new(1, 13),
        // Before opening hours.
        Event::new(6, 3),
    ];
    let summary = engine.ingest_all(&visits)?;

    println!(
        "{} hours, epsilon={:.4}, laplace scale={:.4}",
        engine.domain().len(),
        engine.params().epsilon,
        engine.mechanism().scale()
    );
    let raw = engine.raw_counts();
    let private = engine.private_counts()?;
    println!("hour  raw  private");
    for (hour, count) in &raw {
        println!("{hour:>4} {count:>4} {:>8}", private.get(hour).unwrap_or_default());
    }
    println!(
        "accepted={} dropped={} out_of_domain={}",
        summary.accepted,
        summary.dropped_contributions(),
        summary.out_of_domain
    );
    Ok(())
}
