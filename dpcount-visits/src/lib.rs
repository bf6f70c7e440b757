//! Library facade for the `dpcount-visits` binary.
//!
//! The visits-per-hour scenario: read restaurant visits from CSV, count them
//! per opening hour with `dpcount-engine`, and write the exact and the
//! differentially-private counts side by side.

pub mod config;
pub mod report;
pub mod scenario;
pub mod visit;

pub use config::{load_config, Config, ConfigError, ConfigFormat};
pub use report::{write_results, ErrorList, ReportError};
pub use scenario::{ScenarioError, ScenarioOutcome, VisitsPerHour};
pub use visit::{parse_visits, read_visits, Visit, VisitError};
