use std::collections::HashSet;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

const GETENT: &str = "getent";

/// Account databases known to the name service switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Database {
    Passwd,
    Group,
}

impl Database {
    pub fn name(&self) -> &'static str {
        return match self {
            Database::Passwd => "passwd",
            Database::Group => "group",
        };
    }
}

impl fmt::Display for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str(self.name());
    }
}

#[derive(Debug, Error)]
pub enum IdError {
    #[error("No unused id left in {min}..={max}")]
    Exhausted {
        min: u32,
        max: u32,
    },

    #[error("Failed to read account database {path:?}")]
    Database {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to run getent {database}")]
    Lookup {
        database: Database,
        #[source]
        source: io::Error,
    },

    #[error("getent {database} exited with {status}")]
    LookupFailed {
        database: Database,
        status: ExitStatus,
    },
}

/// Inclusive range of numeric user or group ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct IdRange {
    min: u32,
    max: u32,
}

impl IdRange {
    pub fn new(min: u32, max: u32) -> Option<Self> {
        if min == 0 || min > max {
            return None;
        }

        return Some(Self { min, max });
    }

    pub fn min(&self) -> u32 {
        return self.min;
    }

    pub fn max(&self) -> u32 {
        return self.max;
    }

    pub fn contains(&self, id: u32) -> bool {
        return (self.min..=self.max).contains(&id);
    }

    /// Returns the lowest id of the range which is not in `used`
    pub fn allocate(&self, used: &HashSet<u32>) -> Result<u32, IdError> {
        return (self.min..=self.max)
            .find(|id| !used.contains(id))
            .ok_or(IdError::Exhausted {
                min: self.min,
                max: self.max,
            });
    }
}

/// Collects the numeric ids of all accounts visible through NSS, including those served by LDAP.
pub fn lookup(database: Database) -> Result<HashSet<u32>, IdError> {
    debug!("Running {} {}", GETENT, database);

    let output = Command::new(GETENT)
        .arg(database.name())
        .stdin(Stdio::null())
        .stderr(Stdio::inherit())
        .output()
        .map_err(|source| IdError::Lookup { database, source })?;

    if !output.status.success() {
        return Err(IdError::LookupFailed {
            database,
            status: output.status,
        });
    }

    return Ok(parse_ids(&String::from_utf8_lossy(&output.stdout)));
}

/// Collects the numeric ids (third field) of a passwd(5) or group(5) formatted file.
pub fn used_ids(path: impl AsRef<Path>) -> Result<HashSet<u32>, IdError> {
    let path = path.as_ref();

    let data = std::fs::read_to_string(path)
        .map_err(|source| IdError::Database {
            path: path.to_owned(),
            source,
        })?;

    return Ok(parse_ids(&data));
}

fn parse_ids(data: &str) -> HashSet<u32> {
    return data.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let id = line.split(':').nth(2)
                .and_then(|id| id.parse().ok());
            if id.is_none() {
                debug!("Skipping malformed account entry: {:?}", line);
            }
            return id;
        })
        .collect();
}
