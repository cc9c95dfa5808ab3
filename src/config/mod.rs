use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, trace};

use crate::ids::IdRange;

pub use self::error::{ConfigError, Field};
use self::parser::Document;

mod error;
mod parser;

#[cfg(test)]
mod proptests;

pub const DEFAULT_PATH: &str = "/etc/ldaptools.conf";

const PLACEHOLDER: &str = "{}";

/// Required sections and their required keys
const SCHEMA: [(&str, &[&str]); 4] = [
    ("common", &["master", "domain"]),
    ("binaries", &["slappasswd", "ldapadd", "ldapmodify", "ldapdelete"]),
    ("user", &["ou", "classes", "home", "shell", "min_uid", "max_uid"]),
    ("group", &["ou", "classes", "min_gid", "max_gid"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadOptions {
    /// Reject sections and keys not known to the schema
    pub strict: bool,

    /// Require every configured binary to be an executable file
    pub check_binaries: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Binary {
    Slappasswd,
    Ldapadd,
    Ldapmodify,
    Ldapdelete,
}

impl Binary {
    pub const ALL: [Binary; 4] = [
        Binary::Slappasswd,
        Binary::Ldapadd,
        Binary::Ldapmodify,
        Binary::Ldapdelete,
    ];

    pub fn name(&self) -> &'static str {
        return match self {
            Binary::Slappasswd => "slappasswd",
            Binary::Ldapadd => "ldapadd",
            Binary::Ldapmodify => "ldapmodify",
            Binary::Ldapdelete => "ldapdelete",
        };
    }
}

impl fmt::Display for Binary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str(self.name());
    }
}

/// The validated configuration.
///
/// Built once by [`Config::load`] and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    common: CommonConfig,
    binaries: BinariesConfig,
    user: UserConfig,
    group: GroupConfig,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    extra: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommonConfig {
    master: String,
    domain: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinariesConfig {
    slappasswd: PathBuf,
    ldapadd: PathBuf,
    ldapmodify: PathBuf,
    ldapdelete: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityConfig {
    ou: String,
    classes: Vec<String>,
    ids: IdRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserConfig {
    #[serde(flatten)]
    entity: EntityConfig,

    home: HomeTemplate,
    shell: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupConfig {
    #[serde(flatten)]
    entity: EntityConfig,
}

/// Home directory path with a single `{}` standing in for the login name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HomeTemplate(String);

impl HomeTemplate {
    pub fn new(template: impl Into<String>) -> Option<Self> {
        let template = template.into();

        if template.matches(PLACEHOLDER).count() != 1 {
            return None;
        }

        if template.replacen(PLACEHOLDER, "", 1).contains(|c: char| c == '{' || c == '}') {
            return None;
        }

        return Some(Self(template));
    }

    pub fn render(&self, name: &str) -> String {
        return self.0.replacen(PLACEHOLDER, name, 1);
    }

    pub fn as_str(&self) -> &str {
        return &self.0;
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>, options: &LoadOptions) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::NotFound {
                path: path.to_owned(),
                source,
            })?;

        debug!("Read config file {:?}", path);

        return Self::parse(&text, options);
    }

    pub fn parse(text: &str, options: &LoadOptions) -> Result<Self, ConfigError> {
        let document = parser::document(text)?;
        return Self::from_document(&document, options);
    }

    fn from_document(document: &Document, options: &LoadOptions) -> Result<Self, ConfigError> {
        for (section, _) in SCHEMA {
            if document.section(section).is_none() {
                return Err(ConfigError::MissingField(Field::section(section)));
            }
        }

        for (section, keys) in SCHEMA {
            for key in keys {
                value(document, section, key)?;
            }
        }

        let common = CommonConfig {
            master: scalar(document, "common", "master")?,
            domain: scalar(document, "common", "domain")?,
        };

        let binaries = BinariesConfig {
            slappasswd: scalar(document, "binaries", "slappasswd")?.into(),
            ldapadd: scalar(document, "binaries", "ldapadd")?.into(),
            ldapmodify: scalar(document, "binaries", "ldapmodify")?.into(),
            ldapdelete: scalar(document, "binaries", "ldapdelete")?.into(),
        };

        let user_ou = scalar(document, "user", "ou")?;
        let user_classes = classes(document, "user")?;
        let home = scalar(document, "user", "home")?;
        let shell = scalar(document, "user", "shell")?;

        let group_ou = scalar(document, "group", "ou")?;
        let group_classes = classes(document, "group")?;

        let user_ids = id_range(document, "user", "min_uid", "max_uid")?;
        let group_ids = id_range(document, "group", "min_gid", "max_gid")?;

        let home = HomeTemplate::new(home.as_str())
            .ok_or(ConfigError::TemplateViolation { template: home })?;

        for binary in Binary::ALL {
            absolute(binaries.get(binary), Field::key("binaries", binary.name()))?;
        }

        absolute(Path::new(&shell), Field::key("user", "shell"))?;

        if options.check_binaries {
            for binary in Binary::ALL {
                let path = binaries.get(binary);
                which::which(path)
                    .map_err(|source| ConfigError::BinaryUnavailable {
                        binary: binary.name().to_owned(),
                        path: path.to_owned(),
                        source,
                    })?;
                trace!("Found {} at {:?}", binary, path);
            }
        }

        let extra = unknown(document);
        if options.strict {
            if let Some((section, entries)) = extra.iter().next() {
                let known = SCHEMA.iter().any(|(name, _)| name == section);
                return Err(ConfigError::UnknownField(match entries.keys().next() {
                    Some(key) if known => Field::key(section, key),
                    _ => Field::section(section),
                }));
            }
        }

        for (section, entries) in &extra {
            debug!("Ignoring unknown entries in [{}]: {:?}", section, entries.keys().collect::<Vec<_>>());
        }

        return Ok(Self {
            common,
            binaries,
            user: UserConfig {
                entity: EntityConfig {
                    ou: user_ou,
                    classes: user_classes,
                    ids: user_ids,
                },
                home,
                shell: shell.into(),
            },
            group: GroupConfig {
                entity: EntityConfig {
                    ou: group_ou,
                    classes: group_classes,
                    ids: group_ids,
                },
            },
            extra,
        });
    }

    pub fn common(&self) -> &CommonConfig {
        return &self.common;
    }

    pub fn binaries(&self) -> &BinariesConfig {
        return &self.binaries;
    }

    pub fn user(&self) -> &UserConfig {
        return &self.user;
    }

    pub fn group(&self) -> &GroupConfig {
        return &self.group;
    }

    /// Sections and keys not known to the schema, kept as plain strings
    pub fn extra(&self) -> &BTreeMap<String, BTreeMap<String, String>> {
        return &self.extra;
    }
}

impl CommonConfig {
    pub fn master(&self) -> &str {
        return &self.master;
    }

    pub fn domain(&self) -> &str {
        return &self.domain;
    }
}

impl BinariesConfig {
    pub fn get(&self, binary: Binary) -> &Path {
        return match binary {
            Binary::Slappasswd => &self.slappasswd,
            Binary::Ldapadd => &self.ldapadd,
            Binary::Ldapmodify => &self.ldapmodify,
            Binary::Ldapdelete => &self.ldapdelete,
        };
    }

    pub fn slappasswd(&self) -> &Path {
        return &self.slappasswd;
    }

    pub fn ldapadd(&self) -> &Path {
        return &self.ldapadd;
    }

    pub fn ldapmodify(&self) -> &Path {
        return &self.ldapmodify;
    }

    pub fn ldapdelete(&self) -> &Path {
        return &self.ldapdelete;
    }
}

impl EntityConfig {
    pub fn ou(&self) -> &str {
        return &self.ou;
    }

    /// Object classes in the order given in the config file
    pub fn classes(&self) -> &[String] {
        return &self.classes;
    }

    pub fn ids(&self) -> IdRange {
        return self.ids;
    }

    pub fn min_id(&self) -> u32 {
        return self.ids.min();
    }

    pub fn max_id(&self) -> u32 {
        return self.ids.max();
    }
}

impl UserConfig {
    pub fn home(&self) -> &HomeTemplate {
        return &self.home;
    }

    pub fn shell(&self) -> &Path {
        return &self.shell;
    }
}

impl Deref for UserConfig {
    type Target = EntityConfig;

    fn deref(&self) -> &Self::Target {
        return &self.entity;
    }
}

impl Deref for GroupConfig {
    type Target = EntityConfig;

    fn deref(&self) -> &Self::Target {
        return &self.entity;
    }
}

fn value<'d>(document: &'d Document, section: &str, key: &str) -> Result<&'d str, ConfigError> {
    return document.section(section)
        .and_then(|s| s.get(key))
        .map(|entry| entry.value.as_str())
        .ok_or_else(|| ConfigError::MissingField(Field::key(section, key)));
}

fn scalar(document: &Document, section: &str, key: &str) -> Result<String, ConfigError> {
    let value = value(document, section, key)?;
    if value.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: Field::key(section, key),
            reason: "must not be empty".to_owned(),
        });
    }

    return Ok(value.to_owned());
}

fn classes(document: &Document, section: &str) -> Result<Vec<String>, ConfigError> {
    let field = || Field::key(section, "classes");

    let classes: Vec<String> = value(document, section, "classes")?
        .split(',')
        .map(str::trim)
        .filter(|class| !class.is_empty())
        .map(str::to_owned)
        .collect();

    if classes.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: field(),
            reason: "at least one object class is required".to_owned(),
        });
    }

    // Object class names compare case-insensitive in LDAP
    let mut seen = HashSet::new();
    for class in &classes {
        if !seen.insert(class.to_ascii_lowercase()) {
            return Err(ConfigError::InvalidValue {
                field: field(),
                reason: format!("duplicate object class {:?}", class),
            });
        }
    }

    return Ok(classes);
}

fn id(document: &Document, section: &str, key: &str) -> Result<u32, ConfigError> {
    let value = value(document, section, key)?;

    let id: i64 = value.parse()
        .map_err(|_| ConfigError::TypeMismatch {
            field: Field::key(section, key),
            value: value.to_owned(),
        })?;

    return u32::try_from(id).ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ConfigError::RangeViolation {
            section: section.to_owned(),
            reason: format!("{} must be between 1 and {}, got {}", key, u32::MAX, id),
        });
}

fn id_range(document: &Document, section: &str, min_key: &str, max_key: &str) -> Result<IdRange, ConfigError> {
    let min = id(document, section, min_key)?;
    let max = id(document, section, max_key)?;

    return IdRange::new(min, max)
        .ok_or_else(|| ConfigError::RangeViolation {
            section: section.to_owned(),
            reason: format!("{} ({}) exceeds {} ({})", min_key, min, max_key, max),
        });
}

fn absolute(path: &Path, field: Field) -> Result<(), ConfigError> {
    if !path.to_string_lossy().starts_with('/') {
        return Err(ConfigError::InvalidValue {
            field,
            reason: format!("{:?} is not an absolute path", path),
        });
    }

    return Ok(());
}

fn unknown(document: &Document) -> BTreeMap<String, BTreeMap<String, String>> {
    let mut extra: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();

    for section in &document.sections {
        let keys = SCHEMA.iter()
            .find(|(name, _)| *name == section.name)
            .map(|(_, keys)| *keys);

        let entries = section.entries.iter()
            .filter(|entry| !keys.map_or(false, |keys| keys.contains(&entry.key.as_str())))
            .map(|entry| (entry.key.clone(), entry.value.clone()));

        match keys {
            Some(_) => {
                let entries: BTreeMap<_, _> = entries.collect();
                if !entries.is_empty() {
                    extra.insert(section.name.clone(), entries);
                }
            }
            None => {
                extra.insert(section.name.clone(), entries.collect());
            }
        }
    }

    return extra;
}
