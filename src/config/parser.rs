use nom::{Finish, IResult};
use nom::branch::alt;
use nom::bytes::complete::take_till1;
use nom::character::complete::{char, one_of, space0};
use nom::combinator::{all_consuming, map, rest, verify};
use nom::error::Error;
use nom::sequence::{delimited, preceded, separated_pair};
use tracing::trace;

use super::error::{ConfigError, Field};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'a> {
    Blank,
    Comment(&'a str),
    Header(&'a str),
    Entry(&'a str, &'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub value: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub line: usize,
    pub entries: Vec<Entry>,
}

impl Section {
    pub fn get(&self, key: &str) -> Option<&Entry> {
        return self.entries.iter().find(|entry| entry.key == key);
    }
}

/// Sections of a config file in source order, not yet validated
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    pub sections: Vec<Section>,
}

impl Document {
    pub fn section(&self, name: &str) -> Option<&Section> {
        return self.sections.iter().find(|section| section.name == name);
    }
}

pub fn blank(i: &str) -> IResult<&str, Line, Error<&str>> {
    return map(all_consuming(space0), |_| Line::Blank)(i);
}

pub fn comment(i: &str) -> IResult<&str, Line, Error<&str>> {
    return map(preceded(space0, preceded(one_of("#;"), rest)),
               |text: &str| Line::Comment(text.trim()))(i);
}

pub fn header(i: &str) -> IResult<&str, Line, Error<&str>> {
    let name = verify(take_till1(|c: char| c == '[' || c == ']'),
                      |name: &str| !name.trim().is_empty());

    return map(all_consuming(delimited(space0,
                                       delimited(char('['), name, char(']')),
                                       space0)),
               |name: &str| Line::Header(name.trim()))(i);
}

pub fn entry(i: &str) -> IResult<&str, Line, Error<&str>> {
    let key = verify(take_till1(|c: char| c == '=' || c == ':'),
                     |key: &str| {
                         let key = key.trim();
                         return !key.is_empty() && !key.starts_with('[');
                     });

    return map(separated_pair(key, one_of("=:"), rest),
               |(key, value): (&str, &str)| Line::Entry(key.trim(), value.trim()))(i);
}

pub fn line(i: &str) -> IResult<&str, Line, Error<&str>> {
    return alt((blank, comment, header, entry))(i);
}

pub fn document(text: &str) -> Result<Document, ConfigError> {
    let mut document = Document::default();

    for (index, raw) in text.lines().enumerate() {
        let number = index + 1;

        let parsed = match line(raw).finish() {
            Ok((_, parsed)) => parsed,
            Err(_) if raw.trim_start().starts_with('[') => {
                return Err(ConfigError::MalformedSection {
                    line: number,
                    content: raw.to_owned(),
                });
            }
            Err(_) => {
                return Err(ConfigError::MalformedLine {
                    line: number,
                    content: raw.to_owned(),
                });
            }
        };

        trace!("Line {}: {:?}", number, parsed);

        match parsed {
            Line::Blank | Line::Comment(_) => {}

            Line::Header(name) => {
                if document.section(name).is_some() {
                    return Err(ConfigError::Duplicate {
                        line: number,
                        field: Field::section(name),
                    });
                }

                document.sections.push(Section {
                    name: name.to_owned(),
                    line: number,
                    entries: Vec::new(),
                });
            }

            Line::Entry(key, value) => {
                let section = match document.sections.last_mut() {
                    Some(section) => section,
                    None => return Err(ConfigError::MissingSectionHeader { line: number }),
                };

                let key = key.to_lowercase();
                if section.get(&key).is_some() {
                    return Err(ConfigError::Duplicate {
                        line: number,
                        field: Field::key(&section.name, &key),
                    });
                }

                section.entries.push(Entry {
                    key,
                    value: value.to_owned(),
                    line: number,
                });
            }
        }
    }

    return Ok(document);
}
