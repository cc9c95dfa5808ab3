//! Manage users and groups of an LDAP directory through the OpenLDAP client tools.

pub mod config;
pub mod ids;
pub mod ldap;
pub mod tools;
