use std::{
    error::Error,
    fmt,
    path::{Path, PathBuf},
};

use figment::{
    Figment,
    providers::{Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};
use tracing::Level;
use xdpgw_common::{BACKENDS_MAP, DESTINATION_PROGRAM, SOURCE_PROGRAM};

use crate::{
    addr::AddressError,
    runtime::{cli::Cli, conf::conf_serde::level},
};

/// How the XDP programs are attached to their interfaces.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum XdpMode {
    /// Let the kernel pick native mode when the driver supports it.
    #[default]
    Auto,
    /// Generic (skb) mode, works on every interface.
    Skb,
    /// Native driver mode.
    Driver,
    /// Offloaded to the NIC.
    Hardware,
}

impl fmt::Display for XdpMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XdpMode::Auto => write!(f, "auto"),
            XdpMode::Skb => write!(f, "skb"),
            XdpMode::Driver => write!(f, "driver"),
            XdpMode::Hardware => write!(f, "hardware"),
        }
    }
}

/// Names of the kernel objects looked up inside the loaded ELF.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProgramsConf {
    /// Program attached to the source interface.
    pub source: String,
    /// Program attached to the destination interface.
    pub destination: String,
    /// Hash map holding the backend entry.
    pub backends_map: String,
}

impl Default for ProgramsConf {
    fn default() -> Self {
        Self {
            source: SOURCE_PROGRAM.to_string(),
            destination: DESTINATION_PROGRAM.to_string(),
            backends_map: BACKENDS_MAP.to_string(),
        }
    }
}

/// Effective configuration after layering defaults, the YAML file, environment
/// variables and command-line flags.
///
/// The six gateway parameters have no defaults: they stay `None` until some
/// layer provides them, and `GatewayPlan::from_conf` rejects any that are
/// still missing.
#[derive(Debug, Deserialize, Serialize)]
pub struct Conf {
    /// Path of the YAML file this configuration was read from, if any.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    #[serde(with = "level")]
    pub log_level: Level,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_interface: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_interface: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_mac: Option<String>,

    /// Compiled XDP object loaded at startup.
    pub object_path: PathBuf,

    #[serde(default)]
    pub xdp_mode: XdpMode,

    #[serde(default)]
    pub programs: ProgramsConf,
}

impl Default for Conf {
    fn default() -> Self {
        Self {
            config_path: None,
            log_level: Level::INFO,
            source_interface: None,
            source_address: None,
            destination_interface: None,
            bridge_address: None,
            container_address: None,
            container_mac: None,
            object_path: defaults::object_path(),
            xdp_mode: XdpMode::default(),
            programs: ProgramsConf::default(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn object_path() -> PathBuf {
        PathBuf::from("/usr/lib/xdpgw/xdpgw.bpf.o")
    }
}

impl Conf {
    /// Builds the configuration with the priority
    /// Defaults < Configuration File < Environment Variables / CLI Arguments.
    ///
    /// Environment variables are resolved by clap, so by the time the CLI is
    /// merged they already sit in the same layer as the flags.
    ///
    /// # Errors
    /// * `ConfError::NoConfigFile` - the given path does not exist.
    /// * `ConfError::InvalidConfigPath` - the given path is a directory.
    /// * `ConfError::InvalidExtension` - the file is not `.yaml`/`.yml`.
    /// * `ConfError::Extraction` - the merged values do not form a `Conf`.
    pub fn new(cli: Cli) -> Result<(Self, Cli), ConfError> {
        let file = cli.config.as_deref().map(validate_config_path).transpose()?;

        let layered = file
            .iter()
            .fold(Figment::from(Serialized::defaults(Conf::default())), |f, path| {
                f.merge(Yaml::file(path))
            })
            .merge(Serialized::defaults(&cli));

        let conf = Conf {
            config_path: file,
            ..layered.extract()?
        };
        Ok((conf, cli))
    }
}

/// Accept only an existing regular file with a YAML extension.
fn validate_config_path(path: &Path) -> Result<PathBuf, ConfError> {
    if !path.exists() {
        return Err(ConfError::NoConfigFile);
    }
    if !path.is_file() {
        return Err(ConfError::InvalidConfigPath(path.display().to_string()));
    }

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml" | "yml") => Ok(path.to_path_buf()),
        other => Err(ConfError::InvalidExtension(
            other.unwrap_or("none").to_string(),
        )),
    }
}

#[derive(Debug)]
pub enum ConfError {
    /// The specified configuration file does not exist.
    NoConfigFile,
    /// The path exists but is not a file (e.g., it's a directory).
    InvalidConfigPath(String),
    /// The file has an unsupported extension.
    InvalidExtension(String),
    /// Failed to extract configuration data.
    Extraction(Box<figment::Error>),
    /// Mandatory gateway parameters that no layer provided, by flag name.
    MissingParameters(Vec<&'static str>),
    /// A gateway parameter was provided but does not parse.
    InvalidParameter {
        parameter: &'static str,
        source: AddressError,
    },
}

impl fmt::Display for ConfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfError::NoConfigFile => write!(f, "no config file provided"),
            ConfError::InvalidConfigPath(p) => write!(f, "path '{p}' is not a valid file"),
            ConfError::InvalidExtension(ext) => {
                write!(f, "invalid file extension '.{ext}', expected 'yaml' or 'yml'")
            }
            ConfError::Extraction(e) => write!(f, "failed to extract configuration: {e}"),
            ConfError::MissingParameters(names) => {
                let flags: Vec<String> = names.iter().map(|n| format!("--{n}")).collect();
                write!(f, "missing mandatory parameter(s): {}", flags.join(", "))
            }
            ConfError::InvalidParameter { parameter, source } => {
                write!(f, "invalid value for --{parameter}: {source}")
            }
        }
    }
}

impl Error for ConfError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfError::Extraction(e) => Some(e),
            ConfError::InvalidParameter { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<figment::Error> for ConfError {
    fn from(e: figment::Error) -> Self {
        ConfError::Extraction(Box::from(e))
    }
}

/// Serde adapters for `tracing::Level`, which has no serde impls of its own.
pub mod conf_serde {
    pub mod level {
        use serde::{Deserialize, Deserializer, Serializer, de};
        use tracing::Level;

        fn parse<E: de::Error>(text: &str) -> Result<Level, E> {
            text.parse().map_err(E::custom)
        }

        pub fn serialize<S: Serializer>(level: &Level, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(level.as_str())
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Level, D::Error> {
            parse(&String::deserialize(deserializer)?)
        }

        pub mod option {
            use super::*;

            pub fn serialize<S: Serializer>(
                level: &Option<Level>,
                serializer: S,
            ) -> Result<S::Ok, S::Error> {
                match level.as_ref().map(Level::as_str) {
                    Some(name) => serializer.serialize_some(name),
                    None => serializer.serialize_none(),
                }
            }

            pub fn deserialize<'de, D: Deserializer<'de>>(
                deserializer: D,
            ) -> Result<Option<Level>, D::Error> {
                Option::<String>::deserialize(deserializer)?
                    .as_deref()
                    .map(parse::<D::Error>)
                    .transpose()
            }
        }
    }
}
