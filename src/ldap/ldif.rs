use std::fmt;

use itertools::Itertools;
use thiserror::Error;

use super::dn::DN;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LdifError {
    #[error("Value of {attribute} can not be written to LDIF: {value:?}")]
    UnsafeValue {
        attribute: String,
        value: String,
    },

    #[error("Both first and last name are required to change the name")]
    IncompleteName,

    #[error("Nothing to change for {0}")]
    NoChanges(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modification {
    Add,
    Delete,
    Replace,
}

impl Modification {
    fn keyword(&self) -> &'static str {
        return match self {
            Modification::Add => "add",
            Modification::Delete => "delete",
            Modification::Replace => "replace",
        };
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Value(&'static str, String),
    Separator,
}

/// One entry or change record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    dn: DN,
    lines: Vec<Line>,
}

/// A sequence of records as consumed by `ldapadd` and `ldapmodify`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ldif {
    records: Vec<Record>,
}

// Values are written verbatim, so everything which would need base64 encoding is rejected
fn check(attribute: &str, value: &str) -> Result<(), LdifError> {
    let unsafe_start = value.starts_with(|c: char| c == ' ' || c == ':' || c == '<');
    let unsafe_char = value.contains(|c: char| c == '\0' || c == '\n' || c == '\r');

    if unsafe_start || unsafe_char || value.ends_with(' ') {
        return Err(LdifError::UnsafeValue {
            attribute: attribute.to_owned(),
            value: value.to_owned(),
        });
    }

    return Ok(());
}

impl Record {
    /// An entry to be added
    pub fn entry(dn: DN) -> Result<Self, LdifError> {
        check("dn", &dn.to_string())?;

        return Ok(Self {
            dn,
            lines: Vec::new(),
        });
    }

    /// A `changetype: modify` record
    pub fn modify(dn: DN) -> Result<Self, LdifError> {
        let mut record = Self::entry(dn)?;
        record.lines.push(Line::Value("changetype", "modify".to_owned()));
        return Ok(record);
    }

    /// A `changetype: modrdn` record moving the entry to `rdn` below its parent
    pub fn rename(dn: DN, rdn: impl Into<DN>) -> Result<Self, LdifError> {
        let rdn = rdn.into();

        let mut record = Self::entry(dn)?;
        record.lines.push(Line::Value("changetype", "modrdn".to_owned()));
        record.push("newrdn", rdn)?;
        record.push("deleteoldrdn", 1)?;
        return Ok(record);
    }

    pub fn push(&mut self, attribute: &'static str, value: impl ToString) -> Result<(), LdifError> {
        let value = value.to_string();
        check(attribute, &value)?;

        self.lines.push(Line::Value(attribute, value));
        return Ok(());
    }

    pub fn extend<I>(&mut self, attribute: &'static str, values: I) -> Result<(), LdifError>
        where
            I: IntoIterator,
            I::Item: ToString,
    {
        for value in values {
            self.push(attribute, value)?;
        }

        return Ok(());
    }

    /// Appends one modification of a `changetype: modify` record
    pub fn change<I>(&mut self, modification: Modification, attribute: &'static str, values: I) -> Result<(), LdifError>
        where
            I: IntoIterator,
            I::Item: ToString,
    {
        self.lines.push(Line::Value(modification.keyword(), attribute.to_owned()));
        self.extend(attribute, values)?;
        self.lines.push(Line::Separator);
        return Ok(());
    }

    /// Number of modifications added by [`Record::change`]
    pub fn changes(&self) -> usize {
        return self.lines.iter()
            .filter(|line| matches!(line, Line::Separator))
            .count();
    }
}

impl Ldif {
    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[Record] {
        return &self.records;
    }

    pub fn is_empty(&self) -> bool {
        return self.records.is_empty();
    }
}

impl From<Record> for Ldif {
    fn from(record: Record) -> Self {
        return Self { records: vec![record] };
    }
}

impl FromIterator<Record> for Ldif {
    fn from_iter<T: IntoIterator<Item=Record>>(iter: T) -> Self {
        return Self { records: iter.into_iter().collect() };
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return match self {
            Line::Value(attribute, value) => write!(f, "{}: {}", attribute, value),
            Line::Separator => f.write_str("-"),
        };
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "dn: {}", self.dn)?;

        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }

        return Ok(());
    }
}

impl fmt::Display for Ldif {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "{}", self.records.iter().format("\n"));
    }
}
