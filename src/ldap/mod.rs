use crate::config::{Config, EntityConfig};

pub use self::dn::DN;
pub use self::ldif::{Ldif, LdifError, Modification, Record};

pub mod dn;
pub mod group;
pub mod ldif;
pub mod user;

/// The organizational unit below the domain where one kind of entries lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Branch<'a> {
    entity: &'a EntityConfig,
    ou: &'a str,
    domain: &'a str,
}

impl<'a> Branch<'a> {
    pub fn users(config: &'a Config) -> Self {
        return Self::new(config.user(), config.common().domain());
    }

    pub fn groups(config: &'a Config) -> Self {
        return Self::new(config.group(), config.common().domain());
    }

    fn new(entity: &'a EntityConfig, domain: &'a str) -> Self {
        return Self {
            entity,
            ou: entity.ou(),
            domain,
        };
    }

    pub fn with_ou(self, ou: Option<&'a str>) -> Self {
        return Self {
            ou: ou.unwrap_or(self.ou),
            ..self
        };
    }

    pub fn with_domain(self, domain: Option<&'a str>) -> Self {
        return Self {
            domain: domain.unwrap_or(self.domain),
            ..self
        };
    }

    /// Object classes assigned to new entries
    pub fn classes(&self) -> &'a [String] {
        return self.entity.classes();
    }

    pub fn base(&self) -> DN {
        return DN::domain(self.domain).join(("ou", self.ou));
    }
}

/// The DN used to bind for administrative operations
pub fn master_dn(config: &Config) -> DN {
    return DN::for_master(config.common().master(), config.common().domain());
}
