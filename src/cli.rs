use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use structopt::StructOpt;
use tracing::{info, warn};

use ldaptools::config::Config;
use ldaptools::ids::{self, Database, IdRange};
use ldaptools::ldap::{self, Branch, DN, Ldif};
use ldaptools::ldap::group::{self, GroupChanges, NewGroup};
use ldaptools::ldap::user::{self, NewUser, UserChanges};
use ldaptools::tools::Tools;

#[derive(Debug, StructOpt)]
pub enum Command {
    /// Manage LDAP users
    User(UserOpt),

    /// Manage LDAP groups and members
    Group(GroupOpt),

    /// Inspect the configuration
    Config(ConfigOpt),
}

#[derive(Debug, StructOpt)]
pub struct Location {
    /// Organizational unit, instead of the configured one
    #[structopt(short, long)]
    pub ou: Option<String>,

    /// LDAP domain, instead of the configured one
    #[structopt(short = "m", long)]
    pub domain: Option<String>,
}

/// Options accepted both before and after the user action
#[derive(Debug, StructOpt)]
pub struct UserFields {
    /// The user's password
    #[structopt(short, long, conflicts_with = "pwhash")]
    pub passwd: Option<String>,

    /// The user's password, already hashed
    #[structopt(long)]
    pub pwhash: Option<String>,

    /// The user's user ID
    #[structopt(short, long)]
    pub uid: Option<u32>,

    /// The user's group ID
    #[structopt(short, long)]
    pub gid: Option<u32>,

    /// The user's login shell
    #[structopt(short, long, parse(from_os_str))]
    pub shell: Option<PathBuf>,

    /// The user's home directory, `{}` is replaced by the user name
    #[structopt(short = "d", long)]
    pub home: Option<String>,

    #[structopt(flatten)]
    pub location: Location,

    /// Print LDIF instead of applying it
    #[structopt(short = "n", long)]
    pub dry_run: bool,
}

#[derive(Debug, StructOpt)]
pub struct UserOpt {
    #[structopt(flatten)]
    pub fields: UserFields,

    #[structopt(subcommand)]
    pub action: UserAction,
}

#[derive(Debug, StructOpt)]
pub enum UserAction {
    /// Add a user
    Add {
        user_name: String,
        first_name: String,
        last_name: String,

        #[structopt(flatten)]
        fields: UserFields,
    },

    /// Modify a user
    Modify {
        user_name: String,
        first_name: Option<String>,
        last_name: Option<String>,

        /// Rename the user
        #[structopt(long)]
        new_name: Option<String>,

        #[structopt(flatten)]
        fields: UserFields,
    },

    /// Delete a user
    Delete {
        user_name: String,

        #[structopt(flatten)]
        fields: UserFields,
    },
}

/// Options accepted both before and after the group action
#[derive(Debug, StructOpt)]
pub struct GroupFields {
    /// The group ID
    #[structopt(short, long)]
    pub gid: Option<u32>,

    #[structopt(flatten)]
    pub location: Location,

    /// Print LDIF instead of applying it
    #[structopt(short = "n", long)]
    pub dry_run: bool,
}

#[derive(Debug, StructOpt)]
pub struct GroupOpt {
    #[structopt(flatten)]
    pub fields: GroupFields,

    #[structopt(subcommand)]
    pub action: GroupAction,
}

#[derive(Debug, StructOpt)]
pub enum GroupAction {
    /// Add a group
    Add {
        group: String,
        member: Vec<String>,

        #[structopt(flatten)]
        fields: GroupFields,
    },

    /// Modify a group
    Modify {
        group: String,

        /// Rename the group
        #[structopt(long)]
        new_name: Option<String>,

        #[structopt(flatten)]
        fields: GroupFields,
    },

    /// Add members to a group
    AddMember {
        group: String,
        #[structopt(required = true)]
        member: Vec<String>,

        #[structopt(flatten)]
        fields: GroupFields,
    },

    /// Remove members from a group
    RemoveMember {
        group: String,
        #[structopt(required = true)]
        member: Vec<String>,

        #[structopt(flatten)]
        fields: GroupFields,
    },

    /// Delete a group
    Delete {
        group: String,

        #[structopt(flatten)]
        fields: GroupFields,
    },
}

#[derive(Debug, StructOpt)]
pub enum ConfigOpt {
    /// Validate the configuration file
    Check,

    /// Print the validated configuration as YAML
    Show,
}

impl Location {
    fn merge(&self, outer: &Location) -> Location {
        return Location {
            ou: self.ou.clone().or_else(|| outer.ou.clone()),
            domain: self.domain.clone().or_else(|| outer.domain.clone()),
        };
    }
}

impl UserFields {
    /// Options given after the action take precedence
    fn merge(&self, outer: &UserFields) -> UserFields {
        return UserFields {
            passwd: self.passwd.clone().or_else(|| outer.passwd.clone()),
            pwhash: self.pwhash.clone().or_else(|| outer.pwhash.clone()),
            uid: self.uid.or(outer.uid),
            gid: self.gid.or(outer.gid),
            shell: self.shell.clone().or_else(|| outer.shell.clone()),
            home: self.home.clone().or_else(|| outer.home.clone()),
            location: self.location.merge(&outer.location),
            dry_run: self.dry_run || outer.dry_run,
        };
    }

    fn password_hash(&self, tools: &Tools) -> Result<Option<String>> {
        return match (&self.passwd, &self.pwhash) {
            (Some(passwd), None) => {
                let hash = tools.hash_password(passwd)
                    .context("Failed to hash password")?;
                Ok(Some(hash))
            }
            (None, Some(pwhash)) => Ok(Some(pwhash.clone())),
            (None, None) => Ok(None),
            (Some(_), Some(_)) => bail!("Specify either --passwd or --pwhash, not both"),
        };
    }
}

impl GroupFields {
    fn merge(&self, outer: &GroupFields) -> GroupFields {
        return GroupFields {
            gid: self.gid.or(outer.gid),
            location: self.location.merge(&outer.location),
            dry_run: self.dry_run || outer.dry_run,
        };
    }
}

impl UserAction {
    fn fields(&self) -> &UserFields {
        return match self {
            UserAction::Add { fields, .. } |
            UserAction::Modify { fields, .. } |
            UserAction::Delete { fields, .. } => fields,
        };
    }
}

impl GroupAction {
    fn fields(&self) -> &GroupFields {
        return match self {
            GroupAction::Add { fields, .. } |
            GroupAction::Modify { fields, .. } |
            GroupAction::AddMember { fields, .. } |
            GroupAction::RemoveMember { fields, .. } |
            GroupAction::Delete { fields, .. } => fields,
        };
    }
}

/// Applies changes using the configured binaries, or prints them on a dry run
struct Executor<'a> {
    tools: Tools<'a>,
    dry_run: bool,
    out: &'a mut dyn Write,
}

impl<'a> Executor<'a> {
    fn new(config: &'a Config, dry_run: bool, out: &'a mut dyn Write) -> Self {
        return Self {
            tools: Tools::new(config.binaries(), ldap::master_dn(config)),
            dry_run,
            out,
        };
    }

    fn add(&mut self, ldif: &Ldif) -> Result<()> {
        if self.dry_run {
            write!(self.out, "{}", ldif)?;
            return Ok(());
        }

        return Ok(self.tools.add(ldif)?);
    }

    fn modify(&mut self, ldif: &Ldif) -> Result<()> {
        if self.dry_run {
            write!(self.out, "{}", ldif)?;
            return Ok(());
        }

        return Ok(self.tools.modify(ldif)?);
    }

    fn delete(&mut self, dn: &DN) -> Result<()> {
        if self.dry_run {
            writeln!(self.out, "{}", dn)?;
            return Ok(());
        }

        return Ok(self.tools.delete(dn)?);
    }
}

fn allocate(range: IdRange, database: Database) -> Result<u32> {
    let used: HashSet<u32> = ids::lookup(database)
        .with_context(|| format!("Failed to collect used ids from {}", database))?;

    let id = range.allocate(&used)
        .with_context(|| format!("No id available for {}", database))?;

    info!("Allocated id {} from {}", id, database);
    return Ok(id);
}

fn check_range(kind: &str, id: u32, range: IdRange) {
    if !range.contains(id) {
        warn!("{} {} is outside of the configured range {}..={}", kind, id, range.min(), range.max());
    }
}

impl Command {
    pub fn run(self, config: &Config, dry_run: bool, out: &mut dyn Write) -> Result<()> {
        return match self {
            Command::User(opt) => opt.run(config, dry_run, out),
            Command::Group(opt) => opt.run(config, dry_run, out),
            Command::Config(opt) => opt.run(config, out),
        };
    }
}

impl UserOpt {
    fn run(&self, config: &Config, dry_run: bool, out: &mut dyn Write) -> Result<()> {
        let fields = self.action.fields().merge(&self.fields);
        let mut executor = Executor::new(config, dry_run || fields.dry_run, out);

        let branch = Branch::users(config)
            .with_ou(fields.location.ou.as_deref())
            .with_domain(fields.location.domain.as_deref());

        if let Some(uid) = fields.uid {
            check_range("UID", uid, config.user().ids());
        }

        if let Some(gid) = fields.gid {
            check_range("GID", gid, config.group().ids());
        }

        match &self.action {
            UserAction::Add { user_name, first_name, last_name, .. } => {
                let password_hash = match fields.password_hash(&executor.tools)? {
                    Some(password_hash) => password_hash,
                    None => bail!("Specify either --passwd or --pwhash for a new user"),
                };

                let uid = match fields.uid {
                    Some(uid) => uid,
                    None => allocate(config.user().ids(), Database::Passwd)?,
                };

                let gid = match fields.gid {
                    Some(gid) => gid,
                    None => allocate(config.group().ids(), Database::Group)?,
                };

                let ldif = user::create(config, &branch, &NewUser {
                    name: user_name,
                    first_name,
                    last_name,
                    password_hash: &password_hash,
                    uid,
                    gid,
                    home: fields.home.as_deref(),
                    shell: fields.shell.as_deref(),
                }).with_context(|| format!("Failed to build entry for user {}", user_name))?;

                executor.add(&ldif)
                    .with_context(|| format!("Failed to add user {}", user_name))?;
                info!("Added user {} ({})", user_name, user::dn(&branch, user_name));
            }

            UserAction::Modify { user_name, first_name, last_name, new_name, .. } => {
                let password_hash = fields.password_hash(&executor.tools)?;

                let ldif = user::modify(&branch, user_name, &UserChanges {
                    new_name: new_name.as_deref(),
                    first_name: first_name.as_deref(),
                    last_name: last_name.as_deref(),
                    password_hash: password_hash.as_deref(),
                    uid: fields.uid,
                    gid: fields.gid,
                    home: fields.home.as_deref(),
                    shell: fields.shell.as_deref(),
                }).with_context(|| format!("Failed to build changes for user {}", user_name))?;

                executor.modify(&ldif)
                    .with_context(|| format!("Failed to modify user {}", user_name))?;
                info!("Modified user {}", user_name);
            }

            UserAction::Delete { user_name, .. } => {
                executor.delete(&user::dn(&branch, user_name))
                    .with_context(|| format!("Failed to delete user {}", user_name))?;
                info!("Deleted user {}", user_name);
            }
        }

        return Ok(());
    }
}

impl GroupOpt {
    fn run(&self, config: &Config, dry_run: bool, out: &mut dyn Write) -> Result<()> {
        let fields = self.action.fields().merge(&self.fields);
        let mut executor = Executor::new(config, dry_run || fields.dry_run, out);

        let branch = Branch::groups(config)
            .with_ou(fields.location.ou.as_deref())
            .with_domain(fields.location.domain.as_deref());

        if let Some(gid) = fields.gid {
            check_range("GID", gid, config.group().ids());
        }

        match &self.action {
            GroupAction::Add { group, member, .. } => {
                let gid = match fields.gid {
                    Some(gid) => gid,
                    None => allocate(config.group().ids(), Database::Group)?,
                };

                let ldif = group::create(&branch, &NewGroup {
                    name: group,
                    gid,
                    members: member,
                }).with_context(|| format!("Failed to build entry for group {}", group))?;

                executor.add(&ldif)
                    .with_context(|| format!("Failed to add group {}", group))?;
                info!("Added group {} ({})", group, group::dn(&branch, group));
            }

            GroupAction::Modify { group, new_name, .. } => {
                let ldif = group::modify(&branch, group, &GroupChanges {
                    new_name: new_name.as_deref(),
                    gid: fields.gid,
                }).with_context(|| format!("Failed to build changes for group {}", group))?;

                executor.modify(&ldif)
                    .with_context(|| format!("Failed to modify group {}", group))?;
                info!("Modified group {}", group);
            }

            GroupAction::AddMember { group, member, .. } => {
                let ldif = group::add_members(&branch, group, member)
                    .with_context(|| format!("Failed to build changes for group {}", group))?;

                executor.modify(&ldif)
                    .with_context(|| format!("Failed to add members to group {}", group))?;
                info!("Added {} member(s) to group {}", member.len(), group);
            }

            GroupAction::RemoveMember { group, member, .. } => {
                let ldif = group::remove_members(&branch, group, member)
                    .with_context(|| format!("Failed to build changes for group {}", group))?;

                executor.modify(&ldif)
                    .with_context(|| format!("Failed to remove members from group {}", group))?;
                info!("Removed {} member(s) from group {}", member.len(), group);
            }

            GroupAction::Delete { group, .. } => {
                executor.delete(&group::dn(&branch, group))
                    .with_context(|| format!("Failed to delete group {}", group))?;
                info!("Deleted group {}", group);
            }
        }

        return Ok(());
    }
}

impl ConfigOpt {
    fn run(&self, config: &Config, out: &mut dyn Write) -> Result<()> {
        match self {
            ConfigOpt::Check => {
                for (section, entries) in config.extra() {
                    for key in entries.keys() {
                        warn!("Unknown entry [{}] {}", section, key);
                    }
                }

                writeln!(out, "Configuration is valid")?;
            }

            ConfigOpt::Show => {
                let yaml = serde_yaml::to_string(config)
                    .context("Failed to serialize configuration")?;
                write!(out, "{}", yaml)?;
            }
        }

        return Ok(());
    }
}

#[cfg(test)]
mod test {
    use ldaptools::config::LoadOptions;

    use super::*;

    const REFERENCE: &str = include_str!("../ldaptools.conf");

    fn parse(args: &[&str]) -> Result<Command, structopt::clap::Error> {
        return Command::from_iter_safe(std::iter::once("ldaptools").chain(args.iter().copied()));
    }

    fn dry_run(args: &[&str]) -> String {
        let config = Config::parse(REFERENCE, &LoadOptions::default()).unwrap();

        let mut out = Vec::new();
        parse(args).unwrap().run(&config, true, &mut out).unwrap();

        return String::from_utf8(out).unwrap();
    }

    #[test]
    fn test_parse_user_add() {
        let command = parse(&["user", "-p", "secret", "-u", "2001", "add", "alice", "Alice", "Liddell"]).unwrap();

        match command {
            Command::User(opt) => {
                assert_eq!(opt.fields.passwd.as_deref(), Some("secret"));
                assert_eq!(opt.fields.uid, Some(2001));
                assert!(matches!(opt.action, UserAction::Add { ref user_name, .. } if user_name == "alice"));
            }
            other => panic!("Unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_options_after_action() {
        let command = parse(&["user", "add", "alice", "Alice", "Liddell", "-p", "secret", "-u", "2001", "--dry-run"]).unwrap();

        match command {
            Command::User(UserOpt { fields: outer, action: UserAction::Add { fields, .. } }) => {
                let fields = fields.merge(&outer);
                assert_eq!(fields.passwd.as_deref(), Some("secret"));
                assert_eq!(fields.uid, Some(2001));
                assert!(fields.dry_run);
            }
            other => panic!("Unexpected command: {:?}", other),
        }

        assert!(parse(&["user", "delete", "alice", "--dry-run", "-o", "Staff"]).is_ok());
        assert!(parse(&["group", "delete", "staff", "-n", "-m", "example.org"]).is_ok());
    }

    #[test]
    fn test_merge_prefers_action_options() {
        let command = parse(&["user", "-u", "2001", "-s", "/bin/sh", "modify", "alice", "-u", "2002"]).unwrap();

        match command {
            Command::User(UserOpt { fields: outer, action }) => {
                let fields = action.fields().merge(&outer);
                assert_eq!(fields.uid, Some(2002));
                assert_eq!(fields.shell, Some(PathBuf::from("/bin/sh")));
                assert!(!fields.dry_run);
            }
            other => panic!("Unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_password_conflict() {
        assert!(parse(&["user", "-p", "secret", "--pwhash", "{SSHA}x", "delete", "alice"]).is_err());
        assert!(parse(&["user", "delete", "alice", "-p", "secret", "--pwhash", "{SSHA}x"]).is_err());
    }

    #[test]
    fn test_parse_group_members() {
        let command = parse(&["group", "-m", "example.org", "add-member", "staff", "alice", "bob"]).unwrap();

        match command {
            Command::Group(GroupOpt { fields, action: GroupAction::AddMember { group, member, .. } }) => {
                assert_eq!(fields.location.domain.as_deref(), Some("example.org"));
                assert_eq!(group, "staff");
                assert_eq!(member, vec!["alice", "bob"]);
            }
            other => panic!("Unexpected command: {:?}", other),
        }

        assert!(parse(&["group", "remove-member", "staff"]).is_err());
    }

    #[test]
    fn test_dry_run_user_add() {
        let expected = "\
dn: uid=alice,ou=People,dc=example,dc=com
objectClass: top
objectClass: person
objectClass: organizationalPerson
objectClass: inetOrgPerson
objectClass: posixAccount
objectClass: shadowAccount
uid: alice
cn: Alice Liddell
sn: Liddell
givenName: Alice
userPassword: {SSHA}secret
loginShell: /bin/bash
uidNumber: 2001
gidNumber: 2002
homeDirectory: /srv/alice
";

        assert_eq!(dry_run(&["user", "add", "alice", "Alice", "Liddell",
                             "--pwhash", "{SSHA}secret", "-u", "2001", "-g", "2002", "-d", "/srv/{}"]), expected);

        assert_eq!(dry_run(&["user", "--pwhash", "{SSHA}secret", "-u", "2001", "-g", "2002", "-d", "/srv/{}",
                             "add", "alice", "Alice", "Liddell"]), expected);
    }

    #[test]
    fn test_dry_run_delete() {
        assert_eq!(dry_run(&["user", "delete", "alice"]), "uid=alice,ou=People,dc=example,dc=com\n");
        assert_eq!(dry_run(&["group", "delete", "staff", "-o", "Teams"]), "cn=staff,ou=Teams,dc=example,dc=com\n");
    }

    #[test]
    fn test_dry_run_group_add_allocates_free_gid() {
        let output = dry_run(&["group", "add", "staff", "alice"]);

        let gid: u32 = output.lines()
            .find_map(|line| line.strip_prefix("gidNumber: "))
            .unwrap()
            .parse()
            .unwrap();

        let config = Config::parse(REFERENCE, &LoadOptions::default()).unwrap();
        assert!(config.group().ids().contains(gid));
        assert!(!ids::lookup(Database::Group).unwrap().contains(&gid));
        assert!(output.ends_with("memberUid: alice\n"));
    }

    #[test]
    fn test_config_commands() {
        assert_eq!(dry_run(&["config", "check"]), "Configuration is valid\n");

        let yaml = dry_run(&["config", "show"]);
        assert!(yaml.contains("master: admin"));
        assert!(yaml.contains("domain: example.com"));
        assert!(yaml.contains("ldapadd: /usr/bin/ldapadd"));
    }
}
