use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

use itertools::{Itertools, Position};

/// A distinguished name, most specific component first
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DN {
    components: Vec<RDN>,
}

/// A single-valued relative distinguished name like `uid=alice`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RDN {
    name: AttributeName,
    value: String,
}

#[derive(Debug, Clone, Eq)]
pub struct AttributeName(Cow<'static, str>);

impl PartialEq for AttributeName {
    fn eq(&self, other: &Self) -> bool {
        return self.0.eq_ignore_ascii_case(&other.0);
    }
}

impl Hash for AttributeName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_ascii_lowercase().hash(state);
    }
}

impl DN {
    pub const ROOT: Self = Self { components: Vec::new() };

    /// `dc` components of a DNS domain, empty labels are dropped
    pub fn domain(domain: &str) -> Self {
        return domain.split('.')
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(|label| ("dc", label))
            .collect();
    }

    pub fn for_user(uid: &str, ou: &str, domain: &str) -> Self {
        return Self::domain(domain)
            .join(("ou", ou))
            .join(("uid", uid));
    }

    pub fn for_group(cn: &str, ou: &str, domain: &str) -> Self {
        return Self::domain(domain)
            .join(("ou", ou))
            .join(("cn", cn));
    }

    pub fn for_master(cn: &str, domain: &str) -> Self {
        return Self::domain(domain)
            .join(("cn", cn));
    }

    /// The most specific component
    pub fn rdn(&self) -> Option<&RDN> {
        return self.components.first();
    }

    /// Prepends `dn` below this one
    pub fn join(&self, dn: impl Into<DN>) -> Self {
        let mut out = dn.into();
        out.components.extend(self.components.iter().cloned());
        return out;
    }

    pub fn parent(&self) -> Self {
        return Self {
            components: self.components.iter().skip(1).cloned().collect(),
        };
    }

    /// Replaces the most specific component, keeping the parent
    pub fn renamed(&self, rdn: impl Into<RDN>) -> Self {
        return self.parent().join(rdn.into());
    }
}

impl RDN {
    pub fn value(&self) -> &str {
        return &self.value;
    }
}

impl From<RDN> for DN {
    fn from(value: RDN) -> Self {
        return Self { components: vec![value] };
    }
}

impl<E> FromIterator<E> for DN
    where
        E: Into<RDN> {
    fn from_iter<T: IntoIterator<Item=E>>(iter: T) -> Self {
        return Self { components: iter.into_iter().map(Into::into).collect() };
    }
}

impl<N, V> From<(N, V)> for DN
    where
        N: Into<AttributeName>,
        V: Into<String>,
{
    fn from((name, value): (N, V)) -> Self {
        return DN::from(RDN::from((name, value)));
    }
}

impl<N, V> From<(N, V)> for RDN
    where
        N: Into<AttributeName>,
        V: Into<String>,
{
    fn from((name, value): (N, V)) -> Self {
        return RDN {
            name: name.into(),
            value: value.into(),
        };
    }
}

impl From<&'static str> for AttributeName {
    fn from(value: &'static str) -> Self {
        return Self(Cow::Borrowed(value));
    }
}

impl From<String> for AttributeName {
    fn from(value: String) -> Self {
        return Self(Cow::Owned(value));
    }
}

impl fmt::Display for DN {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "{}", self.components.iter().format(","));
    }
}

impl fmt::Display for RDN {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // RFC 4514, section 2.4
        const ESCAPED: [char; 8] = [',', '+', '"', '\\', '<', '>', ';', '='];

        write!(f, "{}=", self.name)?;

        for c in self.value.chars().with_position() {
            match c {
                Position::First('#') |
                Position::Only('#') |
                Position::First(' ') |
                Position::Last(' ') |
                Position::Only(' ') => {
                    write!(f, "\\{}", c.into_inner())?;
                }

                Position::First(c) |
                Position::Middle(c) |
                Position::Last(c) |
                Position::Only(c) => {
                    if c < ' ' || c == '\x7f' {
                        write!(f, "\\{:02x}", c as u8)?;
                    } else if ESCAPED.contains(&c) {
                        write!(f, "\\{}", c)?;
                    } else {
                        write!(f, "{}", c)?;
                    }
                }
            }
        }

        return Ok(());
    }
}

impl fmt::Display for AttributeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str(&self.0);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_join() {
        assert_eq!(DN::from_iter([("dc", "example"), ("dc", "com")]).join(("ou", "test")),
                   DN::from_iter([("ou", "test"), ("dc", "example"), ("dc", "com")]));
    }

    #[test]
    fn test_parent() {
        assert_eq!(DN::from_iter([("cn", "myself"), ("ou", "test"), ("dc", "example"), ("dc", "com")]).parent(),
                   DN::from_iter([("ou", "test"), ("dc", "example"), ("dc", "com")]));

        assert_eq!(DN::from_iter([("dc", "com")]).parent(), DN::ROOT);
        assert_eq!(DN::ROOT.parent(), DN::ROOT);
    }

    #[test]
    fn test_domain() {
        assert_eq!(DN::domain("example.com"), DN::from_iter([("dc", "example"), ("dc", "com")]));
        assert_eq!(DN::domain("ldap.example.com."), DN::from_iter([("dc", "ldap"), ("dc", "example"), ("dc", "com")]));
        assert_eq!(DN::domain(""), DN::ROOT);
    }

    #[test]
    fn test_constructors() {
        assert_eq!(DN::for_user("alice", "People", "example.com").to_string(),
                   "uid=alice,ou=People,dc=example,dc=com");
        assert_eq!(DN::for_group("staff", "Group", "example.com").to_string(),
                   "cn=staff,ou=Group,dc=example,dc=com");
        assert_eq!(DN::for_master("admin", "example.com").to_string(),
                   "cn=admin,dc=example,dc=com");
    }

    #[test]
    fn test_renamed() {
        let dn = DN::for_user("alice", "People", "example.com");

        assert_eq!(dn.renamed(("uid", "bob")), DN::for_user("bob", "People", "example.com"));
        assert_eq!(dn.rdn().map(RDN::value), Some("alice"));
    }

    #[test]
    fn test_attribute_name_case() {
        assert_eq!(AttributeName::from("objectClass"), AttributeName::from("OBJECTCLASS"));
        assert_eq!(DN::from(("UID", "alice")), DN::from(("uid", "alice")));
        assert_ne!(DN::from(("uid", "alice")), DN::from(("uid", "Alice")));
    }

    #[test]
    fn test_escaping() {
        assert_eq!(DN::from(("cn", "Doe, John")).to_string(), "cn=Doe\\, John");
        assert_eq!(DN::from(("cn", "a+b=c")).to_string(), "cn=a\\+b\\=c");
        assert_eq!(DN::from(("cn", "#hash#")).to_string(), "cn=\\#hash#");
        assert_eq!(DN::from(("cn", " padded ")).to_string(), "cn=\\ padded\\ ");
        assert_eq!(DN::from(("cn", " ")).to_string(), "cn=\\ ");
        assert_eq!(DN::from(("cn", "line\nbreak")).to_string(), "cn=line\\0abreak");
        assert_eq!(DN::from(("cn", "Jürgen")).to_string(), "cn=Jürgen");
    }
}
