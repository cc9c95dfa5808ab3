use super::{Branch, DN, Ldif, LdifError, Modification, Record};

#[derive(Debug, Clone)]
pub struct NewGroup<'a> {
    pub name: &'a str,
    pub gid: u32,
    pub members: &'a [String],
}

#[derive(Debug, Clone, Default)]
pub struct GroupChanges<'a> {
    pub new_name: Option<&'a str>,
    pub gid: Option<u32>,
}

pub fn dn(branch: &Branch, name: &str) -> DN {
    return branch.base().join(("cn", name));
}

pub fn create(branch: &Branch, group: &NewGroup) -> Result<Ldif, LdifError> {
    let mut record = Record::entry(dn(branch, group.name))?;
    record.push("cn", group.name)?;
    record.push("gidNumber", group.gid)?;
    record.extend("objectClass", branch.classes())?;
    record.extend("memberUid", group.members)?;

    return Ok(Ldif::from(record));
}

pub fn modify(branch: &Branch, name: &str, changes: &GroupChanges) -> Result<Ldif, LdifError> {
    let dn = dn(branch, name);

    let mut ldif = Ldif::default();

    if let Some(gid) = changes.gid {
        let mut record = Record::modify(dn.clone())?;
        record.change(Modification::Replace, "gidNumber", [gid])?;
        ldif.push(record);
    }

    if let Some(new_name) = changes.new_name {
        ldif.push(Record::rename(dn, ("cn", new_name))?);
    }

    if ldif.is_empty() {
        return Err(LdifError::NoChanges(name.to_owned()));
    }

    return Ok(ldif);
}

fn members(branch: &Branch, name: &str, modification: Modification, members: &[String]) -> Result<Ldif, LdifError> {
    if members.is_empty() {
        return Err(LdifError::NoChanges(name.to_owned()));
    }

    let mut record = Record::modify(dn(branch, name))?;
    record.change(modification, "memberUid", members)?;

    return Ok(Ldif::from(record));
}

pub fn add_members(branch: &Branch, name: &str, new_members: &[String]) -> Result<Ldif, LdifError> {
    return members(branch, name, Modification::Add, new_members);
}

pub fn remove_members(branch: &Branch, name: &str, old_members: &[String]) -> Result<Ldif, LdifError> {
    return members(branch, name, Modification::Delete, old_members);
}

#[cfg(test)]
mod test {
    use crate::config::test::reference;

    use super::*;

    fn names(names: &[&str]) -> Vec<String> {
        return names.iter().map(ToString::to_string).collect();
    }

    #[test]
    fn test_create() {
        let config = reference();
        let members = names(&["alice", "bob"]);

        let ldif = create(&Branch::groups(&config), &NewGroup {
            name: "staff",
            gid: 2000,
            members: &members,
        }).unwrap();

        assert_eq!(ldif.to_string(), "\
dn: cn=staff,ou=Group,dc=example,dc=com
cn: staff
gidNumber: 2000
objectClass: top
objectClass: posixGroup
memberUid: alice
memberUid: bob
");
    }

    #[test]
    fn test_create_without_members() {
        let config = reference();

        let ldif = create(&Branch::groups(&config), &NewGroup {
            name: "empty",
            gid: 2001,
            members: &[],
        }).unwrap();

        assert!(!ldif.to_string().contains("memberUid"));
    }

    #[test]
    fn test_modify() {
        let config = reference();
        let branch = Branch::groups(&config);

        let ldif = modify(&branch, "staff", &GroupChanges {
            new_name: Some("crew"),
            gid: Some(3000),
        }).unwrap();

        assert_eq!(ldif.to_string(), "\
dn: cn=staff,ou=Group,dc=example,dc=com
changetype: modify
replace: gidNumber
gidNumber: 3000
-

dn: cn=staff,ou=Group,dc=example,dc=com
changetype: modrdn
newrdn: cn=crew
deleteoldrdn: 1
");

        assert_eq!(modify(&branch, "staff", &GroupChanges::default()),
                   Err(LdifError::NoChanges("staff".to_owned())));
    }

    #[test]
    fn test_members() {
        let config = reference();
        let branch = Branch::groups(&config);

        let ldif = add_members(&branch, "staff", &names(&["carol"])).unwrap();
        assert_eq!(ldif.to_string(), "\
dn: cn=staff,ou=Group,dc=example,dc=com
changetype: modify
add: memberUid
memberUid: carol
-
");

        let ldif = remove_members(&branch, "staff", &names(&["alice", "bob"])).unwrap();
        assert_eq!(ldif.to_string(), "\
dn: cn=staff,ou=Group,dc=example,dc=com
changetype: modify
delete: memberUid
memberUid: alice
memberUid: bob
-
");

        assert!(add_members(&branch, "staff", &[]).is_err());
    }
}
