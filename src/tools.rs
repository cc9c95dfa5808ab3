use std::ffi::OsStr;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::string::FromUtf8Error;

use itertools::Itertools;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{BinariesConfig, Binary};
use crate::ldap::{DN, Ldif};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Failed to run {binary:?}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{binary:?} exited with {status}")]
    Failed {
        binary: PathBuf,
        status: ExitStatus,
    },

    #[error("{binary:?} produced invalid output")]
    Output {
        binary: PathBuf,
        #[source]
        source: FromUtf8Error,
    },

    #[error("Failed to write temporary LDIF file")]
    TempFile(#[source] io::Error),
}

/// Runs the configured OpenLDAP client binaries, binding as the master DN
pub struct Tools<'a> {
    binaries: &'a BinariesConfig,
    master: DN,
}

impl<'a> Tools<'a> {
    pub fn new(binaries: &'a BinariesConfig, master: DN) -> Self {
        return Self { binaries, master };
    }

    pub fn master(&self) -> &DN {
        return &self.master;
    }

    /// Hashes a plain text password with `slappasswd -s`
    pub fn hash_password(&self, password: &str) -> Result<String, ToolError> {
        let binary = self.binaries.get(Binary::Slappasswd);
        debug!("Running {:?} -s <redacted>", binary);

        let output = Command::new(binary)
            .arg("-s")
            .arg(password)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .map_err(|source| ToolError::Spawn {
                binary: binary.to_owned(),
                source,
            })?;

        if !output.status.success() {
            return Err(ToolError::Failed {
                binary: binary.to_owned(),
                status: output.status,
            });
        }

        let hash = String::from_utf8(output.stdout)
            .map_err(|source| ToolError::Output {
                binary: binary.to_owned(),
                source,
            })?;

        return Ok(hash.trim().to_owned());
    }

    pub fn add(&self, ldif: &Ldif) -> Result<(), ToolError> {
        return self.apply(Binary::Ldapadd, ldif);
    }

    pub fn modify(&self, ldif: &Ldif) -> Result<(), ToolError> {
        return self.apply(Binary::Ldapmodify, ldif);
    }

    pub fn delete(&self, dn: &DN) -> Result<(), ToolError> {
        let dn = dn.to_string();
        let master = self.master.to_string();

        return self.run(Binary::Ldapdelete, ["-D", master.as_str(), dn.as_str(), "-W"]);
    }

    fn apply(&self, binary: Binary, ldif: &Ldif) -> Result<(), ToolError> {
        let mut file = tempfile::Builder::new()
            .prefix("ldaptools-")
            .suffix(".ldif")
            .tempfile()
            .map_err(ToolError::TempFile)?;

        write!(file, "{}", ldif)
            .and_then(|_| file.flush())
            .map_err(ToolError::TempFile)?;

        debug!("Wrote {} record(s) to {:?}", ldif.records().len(), file.path());

        let master = self.master.to_string();
        return self.run(binary, [OsStr::new("-D"), OsStr::new(&master), OsStr::new("-W"), OsStr::new("-f"), file.path().as_os_str()]);
    }

    fn run<I, S>(&self, binary: Binary, args: I) -> Result<(), ToolError>
        where
            I: IntoIterator<Item=S>,
            S: AsRef<OsStr>,
    {
        let path = self.binaries.get(binary);
        let args: Vec<S> = args.into_iter().collect();

        info!("Running {}", binary);
        debug!("Command line: {:?} {}", path, args.iter().map(|arg| arg.as_ref().to_string_lossy()).join(" "));

        let status = Command::new(path)
            .args(&args)
            .status()
            .map_err(|source| ToolError::Spawn {
                binary: path.to_owned(),
                source,
            })?;

        return check(path, status);
    }
}

fn check(binary: &Path, status: ExitStatus) -> Result<(), ToolError> {
    if !status.success() {
        return Err(ToolError::Failed {
            binary: binary.to_owned(),
            status,
        });
    }

    return Ok(());
}
