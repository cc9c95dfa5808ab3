use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use structopt::StructOpt;
use tracing::level_filters::LevelFilter;

use ldaptools::config::{self, Config, LoadOptions};

use crate::cli::Command;

mod cli;

#[derive(Debug, StructOpt)]
#[structopt(name = "ldaptools", about = "Manage LDAP users and groups")]
pub struct Opt {
    #[structopt(short, long, parse(from_occurrences))]
    pub verbose: u32,

    #[structopt(short, long, default_value(config::DEFAULT_PATH))]
    pub config: PathBuf,

    /// Reject unknown sections and keys in the config file
    #[structopt(long)]
    pub strict: bool,

    /// Check that the configured binaries are executable
    #[structopt(long)]
    pub check_binaries: bool,

    /// Print LDIF instead of applying it
    #[structopt(short = "n", long)]
    pub dry_run: bool,

    #[structopt(subcommand)]
    pub command: Command,
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(match opt.verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        })
        .init();

    let options = LoadOptions {
        strict: opt.strict,
        check_binaries: opt.check_binaries,
    };

    let config = Config::load(&opt.config, &options)
        .with_context(|| format!("Failed to load config: {:?}", &opt.config))?;

    let stdout = io::stdout();
    return opt.command.run(&config, opt.dry_run, &mut stdout.lock());
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_dry_run_position() {
        assert!(Opt::from_iter_safe(["ldaptools", "--dry-run", "user", "delete", "alice"]).unwrap().dry_run);
        assert!(Opt::from_iter_safe(["ldaptools", "user", "delete", "alice", "--dry-run"]).is_ok());
        assert!(Opt::from_iter_safe(["ldaptools", "user", "add", "alice", "A", "L", "-p", "x"]).is_ok());
        assert!(Opt::from_iter_safe(["ldaptools", "-c", "/tmp/ldaptools.conf", "config", "check"]).is_ok());
    }
}
