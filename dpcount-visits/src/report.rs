//! `hour,count` CSV output.

use std::{
    fmt,
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use dpcount_engine::ResultMap;
use thiserror::Error;
use tracing::info;

/// Every I/O failure hit while writing one file, in the order they happened.
#[derive(Debug, Default)]
pub struct ErrorList(Vec<io::Error>);

impl ErrorList {
    pub fn push(&mut self, err: io::Error) {
        self.0.push(err);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &io::Error> {
        self.0.iter()
    }

    fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => write!(f, "no errors"),
            [only] => write!(f, "{only}"),
            many => {
                write!(f, "{} errors occurred:", many.len())?;
                for err in many {
                    write!(f, "\n\t* {err}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ErrorList {}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("couldn't create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("couldn't write results to {path}: {errors}")]
    Write { path: PathBuf, errors: ErrorList },
}

/// Writes one `key,count` row per partition in key order. Row failures do
/// not stop the remaining rows; all of them are reported together.
pub fn write_results<K>(path: &Path, results: &ResultMap<K>) -> Result<(), ReportError>
where
    K: Ord + fmt::Display,
{
    let file = File::create(path).map_err(|source| ReportError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    let mut errors = ErrorList::default();
    let mut writer = BufWriter::new(file);
    for (key, count) in results {
        if let Err(err) = writeln!(writer, "{key},{count}") {
            errors.push(err);
        }
    }
    match writer.into_inner() {
        Ok(file) => {
            if let Err(err) = file.sync_all() {
                errors.push(err);
            }
        }
        Err(err) => errors.push(err.into_error()),
    }
    errors.into_result().map_err(|errors| ReportError::Write {
        path: path.to_path_buf(),
        errors,
    })?;
    info!(path = %path.display(), rows = results.len(), "results written");
    Ok(())
}
