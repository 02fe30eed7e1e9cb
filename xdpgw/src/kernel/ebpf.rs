use std::path::PathBuf;

use aya::{
    Ebpf,
    programs::{ProgramError, Xdp, XdpFlags, links::Link as _, xdp::XdpLink},
    util::KernelVersion,
};
use tracing::{debug, info, warn};
use xdpgw_common::Backend;

use crate::{
    addr,
    error::{BoxError, GatewayError, Result},
    kernel::{
        dataplane::{AttachedLink, Dataplane, ProgramLoader, ProgramRole},
        table::{BackendTable, UpdateMode},
    },
    runtime::conf::{Conf, ProgramsConf, XdpMode},
};

/// Loads the compiled XDP object from disk.
#[derive(Debug, Clone)]
pub struct KernelLoader {
    object_path: PathBuf,
    programs: ProgramsConf,
    mode: XdpMode,
}

impl KernelLoader {
    pub fn new(object_path: impl Into<PathBuf>, programs: ProgramsConf, mode: XdpMode) -> Self {
        Self {
            object_path: object_path.into(),
            programs,
            mode,
        }
    }

    pub fn from_conf(conf: &Conf) -> Self {
        Self::new(&conf.object_path, conf.programs.clone(), conf.xdp_mode)
    }
}

impl ProgramLoader for KernelLoader {
    type Dataplane = KernelPrograms;

    fn load(&self) -> Result<KernelPrograms> {
        raise_memlock_rlimit();

        let object = self.object_path.display().to_string();
        let mut ebpf =
            Ebpf::load_file(&self.object_path).map_err(|e| GatewayError::load(&object, e))?;

        for name in [&self.programs.source, &self.programs.destination] {
            let program: &mut Xdp = ebpf
                .program_mut(name)
                .ok_or_else(|| {
                    GatewayError::load(&object, format!("program '{name}' not found in object"))
                })?
                .try_into()
                .map_err(|e: ProgramError| GatewayError::load(&object, e))?;
            program.load().map_err(|e| GatewayError::load(&object, e))?;

            debug!(
                event.name = "ebpf.program_loaded",
                ebpf.program.name = %name,
                "xdp program passed the verifier"
            );
        }

        if ebpf.map(&self.programs.backends_map).is_none() {
            return Err(GatewayError::load(
                &object,
                format!("map '{}' not found in object", self.programs.backends_map),
            ));
        }

        info!(
            event.name = "ebpf.object_loaded",
            ebpf.object.path = %object,
            "ebpf object loaded"
        );

        Ok(KernelPrograms {
            ebpf,
            programs: self.programs.clone(),
            flags: attach_flags(self.mode, uses_bpf_link()),
        })
    }
}

/// Kernels without memcg accounting (< 5.11) charge BPF maps to RLIMIT_MEMLOCK.
fn raise_memlock_rlimit() {
    let rlim = libc::rlimit {
        rlim_cur: libc::RLIM_INFINITY,
        rlim_max: libc::RLIM_INFINITY,
    };
    let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
    if ret != 0 {
        debug!(
            event.name = "ebpf.rlimit_failed",
            system.rlimit.type = "memlock",
            error.code = ret,
            "failed to remove limit on locked memory"
        );
    }
}

/// From 5.9 on, aya attaches XDP through `bpf_link_create` instead of netlink.
fn uses_bpf_link() -> bool {
    match KernelVersion::current() {
        Ok(version) => version >= KernelVersion::new(5, 9, 0),
        Err(e) => {
            debug!(
                event.name = "ebpf.kernel_version_unknown",
                error = %e,
                "failed to read kernel version, assuming netlink attach"
            );
            false
        }
    }
}

fn attach_flags(mode: XdpMode, bpf_link: bool) -> XdpFlags {
    let mode_flag = match mode {
        XdpMode::Auto => XdpFlags::empty(),
        XdpMode::Skb => XdpFlags::SKB_MODE,
        XdpMode::Driver => XdpFlags::DRV_MODE,
        XdpMode::Hardware => XdpFlags::HW_MODE,
    };
    // Links only take a mode flag and already fail with EBUSY on an occupied
    // hook. Netlink replaces silently unless told not to.
    if bpf_link {
        mode_flag
    } else {
        XdpFlags::UPDATE_IF_NOEXIST | mode_flag
    }
}

/// A loaded object holding both XDP programs and the backend table.
pub struct KernelPrograms {
    ebpf: Ebpf,
    programs: ProgramsConf,
    flags: XdpFlags,
}

impl KernelPrograms {
    fn program_name(&self, role: ProgramRole) -> &str {
        match role {
            ProgramRole::Source => &self.programs.source,
            ProgramRole::Destination => &self.programs.destination,
        }
    }
}

impl Dataplane for KernelPrograms {
    type Link = XdpBinding;

    fn attach(&mut self, role: ProgramRole, ifindex: u32) -> Result<XdpBinding> {
        let attach_error = |source: BoxError| GatewayError::Attach {
            role,
            ifindex,
            source,
        };
        let name = self.program_name(role).to_string();

        let program: &mut Xdp = self
            .ebpf
            .program_mut(&name)
            .ok_or_else(|| attach_error(format!("program '{name}' not found").into()))?
            .try_into()
            .map_err(|e: ProgramError| attach_error(e.into()))?;

        let link_id = program
            .attach_to_if_index(ifindex, self.flags)
            .map_err(|e| attach_error(e.into()))?;
        let link = program
            .take_link(link_id)
            .map_err(|e| attach_error(e.into()))?;

        info!(
            event.name = "ebpf.program_attached",
            ebpf.program.name = %name,
            ebpf.program.role = %role,
            network.interface.index = ifindex,
            "xdp program attached to interface"
        );

        Ok(XdpBinding {
            role,
            ifindex,
            link,
        })
    }

    fn publish_backend(&mut self, key: u32, backend: Backend, mode: UpdateMode) -> Result<()> {
        let map_name = self.programs.backends_map.clone();
        let mut table = BackendTable::open(&mut self.ebpf, &map_name)?;
        table.update(key, backend, mode)?;

        log_read_back(&map_name, key, table.get(key));
        Ok(())
    }

    fn close(self) -> Result<()> {
        // Dropping the handle closes every program and map fd it owns.
        drop(self.ebpf);
        Ok(())
    }
}

/// The write already succeeded, so a failed read only costs the log line.
fn log_read_back(map_name: &str, key: u32, read: Result<Option<Backend>>) -> Option<Backend> {
    match read {
        Ok(Some(stored)) => {
            debug!(
                event.name = "ebpf.backend_read_back",
                ebpf.map.name = %map_name,
                backend.key = %addr::decode_ipv4(key),
                backend.saddr = %addr::decode_ipv4(stored.saddr),
                backend.daddr = %addr::decode_ipv4(stored.daddr),
                backend.hwaddr = %addr::format_mac(&stored.hwaddr),
                backend.ifindex = stored.ifindex,
                "backend entry present in map"
            );
            Some(stored)
        }
        Ok(None) => {
            warn!(
                event.name = "ebpf.backend_missing",
                ebpf.map.name = %map_name,
                backend.key = %addr::decode_ipv4(key),
                "backend entry not found right after writing it"
            );
            None
        }
        Err(e) => {
            warn!(
                event.name = "ebpf.backend_read_failed",
                ebpf.map.name = %map_name,
                backend.key = %addr::decode_ipv4(key),
                error = %e,
                "failed to read backend entry back"
            );
            None
        }
    }
}

/// An XDP program attached to one interface. Owns the link independently of
/// the program it came from.
pub struct XdpBinding {
    role: ProgramRole,
    ifindex: u32,
    link: XdpLink,
}

impl AttachedLink for XdpBinding {
    fn role(&self) -> ProgramRole {
        self.role
    }

    fn ifindex(&self) -> u32 {
        self.ifindex
    }

    fn detach(self) -> Result<()> {
        self.link.detach().map_err(|e| GatewayError::Detach {
            role: self.role,
            ifindex: self.ifindex,
            source: e.into(),
        })
    }
}
