use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Location of a value in the config file: a whole section or one key in it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    section: String,
    key: Option<String>,
}

impl Field {
    pub fn section(section: impl Into<String>) -> Self {
        return Self {
            section: section.into(),
            key: None,
        };
    }

    pub fn key(section: impl Into<String>, key: impl Into<String>) -> Self {
        return Self {
            section: section.into(),
            key: Some(key.into()),
        };
    }

    pub fn section_name(&self) -> &str {
        return &self.section;
    }

    pub fn key_name(&self) -> Option<&str> {
        return self.key.as_deref();
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return match &self.key {
            Some(key) => write!(f, "[{}] {}", self.section, key),
            None => write!(f, "[{}]", self.section),
        };
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Can not read config file {path:?}")]
    NotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed section header on line {line}: {content:?}")]
    MalformedSection {
        line: usize,
        content: String,
    },

    #[error("Expected `key = value` on line {line}: {content:?}")]
    MalformedLine {
        line: usize,
        content: String,
    },

    #[error("Entry outside of any section on line {line}")]
    MissingSectionHeader {
        line: usize,
    },

    #[error("Duplicate {field} on line {line}")]
    Duplicate {
        line: usize,
        field: Field,
    },

    #[error("Missing {0}")]
    MissingField(Field),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        field: Field,
        reason: String,
    },

    #[error("Expected an integer for {field}, got {value:?}")]
    TypeMismatch {
        field: Field,
        value: String,
    },

    #[error("Invalid id range in [{section}]: {reason}")]
    RangeViolation {
        section: String,
        reason: String,
    },

    #[error("Home template {template:?} must contain exactly one `{{}}` placeholder")]
    TemplateViolation {
        template: String,
    },

    #[error("Binary {binary} is not executable: {path:?}")]
    BinaryUnavailable {
        binary: String,
        path: PathBuf,
        #[source]
        source: which::Error,
    },

    #[error("Unknown {0}")]
    UnknownField(Field),
}
