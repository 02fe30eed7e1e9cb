//! Process-level plumbing around the gateway: configuration, logging,
//! preflight checks and signal handling.

use clap::Parser;

use crate::runtime::{
    cli::Cli,
    conf::{Conf, ConfError},
};

pub mod capabilities;
pub mod cli;
pub mod conf;
pub mod logging;
pub mod shutdown;

pub struct Runtime {
    #[allow(dead_code)]
    pub cli: Cli,
    pub conf: Conf,
}

impl Runtime {
    /// Parse the command line (and `XDPGW_*` env) and layer it over the
    /// optional YAML file.
    pub fn new() -> Result<Self, ConfError> {
        let (conf, cli) = Conf::new(Cli::parse())?;
        Ok(Self { cli, conf })
    }
}
