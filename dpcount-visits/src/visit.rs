//! Restaurant visit records and the CSV source that produces them.
//!
//! Expected layout, one header record followed by rows of
//! `VisitorID,VisitTime,MinutesSpent,EurosSpent,Day` where `VisitTime` uses
//! the 12-hour kitchen format (`3:04PM`). Blank lines are ignored and CRLF
//! line endings are accepted.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use chrono::{NaiveTime, Timelike};
use dpcount_engine::{EntityId, Partitioned};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const FIELDS: usize = 5;

#[derive(Debug, Error)]
pub enum VisitError {
    #[error("couldn't open the csv file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("couldn't read the csv file {source_name} at line {line}: {source}")]
    Read {
        source_name: String,
        line: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("{source_name} line {line}: expected {FIELDS} fields, found {found}")]
    Format {
        source_name: String,
        line: usize,
        found: usize,
    },
    #[error("{source_name} line {line}: couldn't read {field} = {value:?}: {reason}")]
    Field {
        source_name: String,
        line: usize,
        field: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    pub visitor_id: i64,
    pub visit_time: NaiveTime,
    pub minutes_spent: i64,
    pub euros_spent: i64,
    pub day: i64,
}

impl Visit {
    pub fn hour(&self) -> i64 {
        i64::from(self.visit_time.hour())
    }
}

/// Visits are partitioned by the hour the visitor entered.
impl Partitioned for Visit {
    type Key = i64;

    fn entity_id(&self) -> EntityId {
        EntityId(self.visitor_id)
    }

    fn partition_key(&self) -> i64 {
        self.hour()
    }
}

pub fn read_visits(path: &Path) -> Result<Vec<Visit>, VisitError> {
    let file = File::open(path).map_err(|source| VisitError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    parse_visits(BufReader::new(file), &path.display().to_string())
}

pub fn parse_visits<R: BufRead>(reader: R, source_name: &str) -> Result<Vec<Visit>, VisitError> {
    let mut visits = Vec::new();
    let mut header_seen = false;
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|source| VisitError::Read {
            source_name: source_name.to_owned(),
            line: line_no,
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let record: Vec<&str> = line.split(',').map(clean_field).collect();
        if record.len() != FIELDS {
            return Err(VisitError::Format {
                source_name: source_name.to_owned(),
                line: line_no,
                found: record.len(),
            });
        }
        // The first non-blank record is the header.
        if !header_seen {
            header_seen = true;
            continue;
        }
        let field_error = |field: &'static str, value: &str, reason: String| VisitError::Field {
            source_name: source_name.to_owned(),
            line: line_no,
            field,
            value: value.to_owned(),
            reason,
        };
        let int = |field: &'static str, value: &str| {
            value
                .parse::<i64>()
                .map_err(|err| field_error(field, value, err.to_string()))
        };
        let visit_time = parse_kitchen_time(record[1])
            .map_err(|err| field_error("VisitTime", record[1], err.to_string()))?;
        visits.push(Visit {
            visitor_id: int("VisitorID", record[0])?,
            visit_time,
            minutes_spent: int("MinutesSpent", record[2])?,
            euros_spent: int("EurosSpent", record[3])?,
            day: int("Day", record[4])?,
        });
    }
    Ok(visits)
}

fn clean_field(raw: &str) -> &str {
    raw.trim().trim_matches('"')
}

/// Parses `3:04PM` style times, case-insensitive on the meridiem.
pub fn parse_kitchen_time(value: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(&value.to_ascii_uppercase(), "%I:%M%p")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "VisitorId,Time entered,Time spent (minutes),Money spent (euros),Day
1,9:30AM,26,24,1
2,11:54AM,53,32,1
3,1:03PM,34,21,1
";

    #[test]
    fn parses_rows_after_header() {
        let visits = parse_visits(SAMPLE.as_bytes(), "sample").unwrap();
        assert_eq!(visits.len(), 3);
        assert_eq!(visits[0].visitor_id, 1);
        assert_eq!(visits[0].hour(), 9);
        assert_eq!(visits[2].hour(), 13);
        assert_eq!(visits[1].euros_spent, 32);
        assert_eq!(visits[2].partition_key(), 13);
        assert_eq!(visits[2].entity_id(), EntityId(3));
    }

    #[test]
    fn header_is_the_first_non_blank_record() {
        let input = format!("\n\n{SAMPLE}\n");
        let visits = parse_visits(input.as_bytes(), "padded").unwrap();
        assert_eq!(visits.len(), 3);
        assert_eq!(visits[0].visitor_id, 1);
    }

    #[test]
    fn accepts_crlf_line_endings() {
        let input = SAMPLE.replace('\n', "\r\n");
        let visits = parse_visits(input.as_bytes(), "crlf").unwrap();
        assert_eq!(visits.len(), 3);
        assert_eq!(visits[2].day, 1);
        assert_eq!(visits[2].hour(), 13);
    }

    #[test]
    fn kitchen_time_handles_noon_and_midnight() {
        assert_eq!(parse_kitchen_time("12:15PM").unwrap().hour(), 12);
        assert_eq!(parse_kitchen_time("12:15AM").unwrap().hour(), 0);
        assert_eq!(parse_kitchen_time("3:04pm").unwrap().hour(), 15);
        assert!(parse_kitchen_time("15:04").is_err());
    }

    #[test]
    fn wrong_field_count_is_a_format_error() {
        let err = parse_visits("a,b,c,d,e\n1,9:30AM,26\n".as_bytes(), "short").unwrap_err();
        assert!(matches!(err, VisitError::Format { line: 2, found: 3, .. }));
    }

    #[test]
    fn bad_value_names_the_field() {
        let err = parse_visits("a,b,c,d,e\nx,9:30AM,26,24,1\n".as_bytes(), "bad").unwrap_err();
        match err {
            VisitError::Field { field, line, .. } => {
                assert_eq!(field, "VisitorID");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error {other}"),
        }
    }
}
