//! In-memory kernel double. Records every kernel-facing call in order and
//! fails the ones it is told to.

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    rc::Rc,
};

use xdpgw_common::Backend;

use crate::{
    error::{GatewayError, Result},
    kernel::{AttachedLink, Dataplane, InterfaceResolver, ProgramLoader, ProgramRole, UpdateMode},
    runtime::conf::Conf,
};

pub fn full_conf() -> Conf {
    Conf {
        source_interface: Some("eth1".to_string()),
        source_address: Some("10.0.0.10".to_string()),
        destination_interface: Some("br0".to_string()),
        bridge_address: Some("172.16.0.1".to_string()),
        container_address: Some("172.16.0.2".to_string()),
        container_mac: Some("02:42:ac:11:00:02".to_string()),
        ..Conf::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Resolve(String),
    Load,
    Attach(ProgramRole, u32),
    Publish(u32, Backend, UpdateMode),
    Detach(ProgramRole, u32),
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Load,
    Attach(ProgramRole),
    Publish,
    Detach(ProgramRole),
    Close,
}

#[derive(Default)]
struct Recorder {
    calls: Vec<Call>,
    table: HashMap<u32, Backend>,
}

#[derive(Clone)]
pub struct FakeKernel {
    interfaces: HashMap<String, u32>,
    failures: HashSet<FailPoint>,
    recorder: Rc<RefCell<Recorder>>,
}

impl Default for FakeKernel {
    fn default() -> Self {
        Self {
            interfaces: HashMap::from([("eth1".to_string(), 3), ("br0".to_string(), 9)]),
            failures: HashSet::new(),
            recorder: Rc::default(),
        }
    }
}

impl FakeKernel {
    pub fn with_interface(mut self, name: &str, index: u32) -> Self {
        self.interfaces.insert(name.to_string(), index);
        self
    }

    pub fn without_interface(mut self, name: &str) -> Self {
        self.interfaces.remove(name);
        self
    }

    pub fn failing(mut self, point: FailPoint) -> Self {
        self.failures.insert(point);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.recorder.borrow().calls.clone()
    }

    /// Calls made on the loaded object, i.e. everything after `Load`.
    pub fn calls_since_load(&self) -> Vec<Call> {
        let calls = self.calls();
        match calls.iter().position(|c| *c == Call::Load) {
            Some(i) => calls[i + 1..].to_vec(),
            None => Vec::new(),
        }
    }

    pub fn count(&self, call: &Call) -> usize {
        self.recorder
            .borrow()
            .calls
            .iter()
            .filter(|c| *c == call)
            .count()
    }

    pub fn table(&self) -> HashMap<u32, Backend> {
        self.recorder.borrow().table.clone()
    }

    fn record(&self, call: Call) {
        self.recorder.borrow_mut().calls.push(call);
    }

    fn check(&self, point: FailPoint) -> std::result::Result<(), crate::error::BoxError> {
        if self.failures.contains(&point) {
            Err(format!("injected failure at {point:?}").into())
        } else {
            Ok(())
        }
    }
}

impl InterfaceResolver for FakeKernel {
    fn resolve(&self, name: &str) -> Result<u32> {
        self.record(Call::Resolve(name.to_string()));
        self.interfaces
            .get(name)
            .copied()
            .ok_or_else(|| GatewayError::InterfaceNotFound {
                name: name.to_string(),
            })
    }
}

impl ProgramLoader for FakeKernel {
    type Dataplane = FakeDataplane;

    fn load(&self) -> Result<FakeDataplane> {
        self.record(Call::Load);
        self.check(FailPoint::Load)
            .map_err(|e| GatewayError::load("fake.bpf.o", e))?;
        Ok(FakeDataplane {
            kernel: self.clone(),
        })
    }
}

pub struct FakeDataplane {
    kernel: FakeKernel,
}

impl Dataplane for FakeDataplane {
    type Link = FakeLink;

    fn attach(&mut self, role: ProgramRole, ifindex: u32) -> Result<FakeLink> {
        self.kernel.record(Call::Attach(role, ifindex));
        self.kernel
            .check(FailPoint::Attach(role))
            .map_err(|source| GatewayError::Attach {
                role,
                ifindex,
                source,
            })?;
        Ok(FakeLink {
            kernel: self.kernel.clone(),
            role,
            ifindex,
        })
    }

    fn publish_backend(&mut self, key: u32, backend: Backend, mode: UpdateMode) -> Result<()> {
        self.kernel.record(Call::Publish(key, backend, mode));
        self.kernel
            .check(FailPoint::Publish)
            .map_err(|source| GatewayError::TableWrite {
                map: "backends".to_string(),
                source,
            })?;
        self.kernel.recorder.borrow_mut().table.insert(key, backend);
        Ok(())
    }

    fn close(self) -> Result<()> {
        self.kernel.record(Call::Close);
        self.kernel
            .check(FailPoint::Close)
            .map_err(|source| GatewayError::Close { source })
    }
}

pub struct FakeLink {
    kernel: FakeKernel,
    role: ProgramRole,
    ifindex: u32,
}

impl AttachedLink for FakeLink {
    fn role(&self) -> ProgramRole {
        self.role
    }

    fn ifindex(&self) -> u32 {
        self.ifindex
    }

    fn detach(self) -> Result<()> {
        self.kernel.record(Call::Detach(self.role, self.ifindex));
        self.kernel
            .check(FailPoint::Detach(self.role))
            .map_err(|source| GatewayError::Detach {
                role: self.role,
                ifindex: self.ifindex,
                source,
            })
    }
}
