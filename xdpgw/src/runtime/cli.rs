use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::runtime::conf::{XdpMode, conf_serde::level};

/// Command-line surface. Every value can also come from an `XDPGW_*`
/// environment variable or the YAML file given with `--config`.
#[derive(Parser, Debug, Serialize, Deserialize)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Set the path to the configuration file (e.g., "xdpgw.yaml").
    #[arg(short, long, value_name = "FILE", env = "XDPGW_CONFIG_PATH")]
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Set the application's log level (e.g., "debug", "warn").
    #[arg(short, long, value_name = "LEVEL", env = "XDPGW_LOG_LEVEL")]
    #[serde(default, with = "level::option", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<Level>,

    /// Source (physical) interface name.
    #[arg(long = "sif", value_name = "IFACE", env = "XDPGW_SIF")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_interface: Option<String>,

    /// IPv4 address of the source interface; used as the backend table key.
    #[arg(long = "sip", value_name = "ADDR", env = "XDPGW_SIP")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_address: Option<String>,

    /// Destination (bridge) interface name.
    #[arg(long = "dif", value_name = "IFACE", env = "XDPGW_DIF")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_interface: Option<String>,

    /// IPv4 address of the bridge; used as the rewritten source.
    #[arg(long = "bip", value_name = "ADDR", env = "XDPGW_BIP")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge_address: Option<String>,

    /// IPv4 address of the container; used as the rewritten destination.
    #[arg(long = "cip", value_name = "ADDR", env = "XDPGW_CIP")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_address: Option<String>,

    /// MAC address of the container, colon-separated hex.
    #[arg(long = "cmac", value_name = "MAC", env = "XDPGW_CMAC")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_mac: Option<String>,

    /// Path to the compiled XDP object file.
    #[arg(long = "object", value_name = "FILE", env = "XDPGW_OBJECT")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_path: Option<PathBuf>,

    /// XDP attach mode.
    #[arg(long, value_enum, value_name = "MODE", env = "XDPGW_XDP_MODE")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xdp_mode: Option<XdpMode>,
}
