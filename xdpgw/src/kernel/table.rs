use aya::{
    Ebpf,
    maps::{HashMap, MapData, MapError},
};
use xdpgw_common::Backend;

use crate::error::{BoxError, GatewayError, Result};

const BPF_ANY: u64 = 0;
const BPF_NOEXIST: u64 = 1;
const BPF_EXIST: u64 = 2;

/// Conditional write semantics of a table update.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    /// Create the entry or overwrite an existing one.
    #[default]
    CreateOrReplace,
    /// Fail if the key is already present.
    CreateOnly,
    /// Fail if the key is absent.
    ReplaceOnly,
}

impl UpdateMode {
    pub fn flags(self) -> u64 {
        match self {
            UpdateMode::CreateOrReplace => BPF_ANY,
            UpdateMode::CreateOnly => BPF_NOEXIST,
            UpdateMode::ReplaceOnly => BPF_EXIST,
        }
    }
}

/// The `u32 -> Backend` hash map inside a loaded object.
pub struct BackendTable<'a> {
    name: String,
    map: HashMap<&'a mut MapData, u32, Backend>,
}

impl<'a> BackendTable<'a> {
    pub fn open(ebpf: &'a mut Ebpf, name: &str) -> Result<Self> {
        let write_error = |source: BoxError| GatewayError::TableWrite {
            map: name.to_string(),
            source,
        };

        let map = ebpf
            .map_mut(name)
            .ok_or_else(|| write_error("map not found in loaded object".into()))?;
        let map = HashMap::try_from(map).map_err(|e: MapError| write_error(e.into()))?;

        Ok(Self {
            name: name.to_string(),
            map,
        })
    }

    pub fn update(&mut self, key: u32, backend: Backend, mode: UpdateMode) -> Result<()> {
        self.map
            .insert(key, backend, mode.flags())
            .map_err(|e| GatewayError::TableWrite {
                map: self.name.clone(),
                source: e.into(),
            })
    }

    /// Read one entry back. A missing key is `Ok(None)`.
    pub fn get(&self, key: u32) -> Result<Option<Backend>> {
        match self.map.get(&key, 0) {
            Ok(backend) => Ok(Some(backend)),
            Err(MapError::KeyNotFound) => Ok(None),
            Err(e) => Err(GatewayError::TableRead {
                map: self.name.clone(),
                source: e.into(),
            }),
        }
    }
}
