use std::path::Path;

use crate::config::{Config, HomeTemplate};

use super::{Branch, DN, Ldif, LdifError, Modification, Record};

/// Everything needed to create a user entry
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub password_hash: &'a str,
    pub uid: u32,
    pub gid: u32,

    /// Defaults to the configured home template, a `{}` is replaced by the user name
    pub home: Option<&'a str>,

    /// Defaults to the configured shell
    pub shell: Option<&'a Path>,
}

#[derive(Debug, Clone, Default)]
pub struct UserChanges<'a> {
    pub new_name: Option<&'a str>,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub password_hash: Option<&'a str>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub home: Option<&'a str>,
    pub shell: Option<&'a Path>,
}

pub fn dn(branch: &Branch, name: &str) -> DN {
    return branch.base().join(("uid", name));
}

fn common_name(first_name: &str, last_name: &str) -> String {
    return format!("{} {}", first_name, last_name);
}

pub fn create(config: &Config, branch: &Branch, user: &NewUser) -> Result<Ldif, LdifError> {
    let home = match user.home {
        Some(home) => match HomeTemplate::new(home) {
            Some(template) => template.render(user.name),
            None => home.to_owned(),
        },
        None => config.user().home().render(user.name),
    };

    let shell = user.shell.unwrap_or_else(|| config.user().shell());

    let mut record = Record::entry(dn(branch, user.name))?;
    record.extend("objectClass", branch.classes())?;
    record.push("uid", user.name)?;
    record.push("cn", common_name(user.first_name, user.last_name))?;
    record.push("sn", user.last_name)?;
    record.push("givenName", user.first_name)?;
    record.push("userPassword", user.password_hash)?;
    record.push("loginShell", shell.display())?;
    record.push("uidNumber", user.uid)?;
    record.push("gidNumber", user.gid)?;
    record.push("homeDirectory", home)?;

    return Ok(Ldif::from(record));
}

pub fn modify(branch: &Branch, name: &str, changes: &UserChanges) -> Result<Ldif, LdifError> {
    let dn = dn(branch, name);

    let mut record = Record::modify(dn.clone())?;

    match (changes.first_name, changes.last_name) {
        (Some(first_name), Some(last_name)) => {
            record.change(Modification::Replace, "cn", [common_name(first_name, last_name)])?;
            record.change(Modification::Replace, "sn", [last_name])?;
            record.change(Modification::Replace, "givenName", [first_name])?;
        }
        (None, None) => {}
        _ => return Err(LdifError::IncompleteName),
    }

    if let Some(password_hash) = changes.password_hash {
        record.change(Modification::Replace, "userPassword", [password_hash])?;
    }

    if let Some(shell) = changes.shell {
        record.change(Modification::Replace, "loginShell", [shell.display()])?;
    }

    if let Some(uid) = changes.uid {
        record.change(Modification::Replace, "uidNumber", [uid])?;
    }

    if let Some(gid) = changes.gid {
        record.change(Modification::Replace, "gidNumber", [gid])?;
    }

    if let Some(home) = changes.home {
        record.change(Modification::Replace, "homeDirectory", [home])?;
    }

    let mut ldif = Ldif::default();

    if record.changes() > 0 {
        ldif.push(record);
    }

    if let Some(new_name) = changes.new_name {
        ldif.push(Record::rename(dn, ("uid", new_name))?);
    }

    if ldif.is_empty() {
        return Err(LdifError::NoChanges(name.to_owned()));
    }

    return Ok(ldif);
}
