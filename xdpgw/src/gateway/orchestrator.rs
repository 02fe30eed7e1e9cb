use tracing::info;

use crate::{
    addr,
    error::{GatewayError, Result},
    gateway::{plan::GatewayPlan, session::GatewaySession, state::GatewayState},
    kernel::{InterfaceResolver, ProgramLoader, ProgramRole, UpdateMode},
    runtime::conf::Conf,
};

/// Drives startup: validate, resolve, load, attach both sides, publish.
pub struct Orchestrator<R, L> {
    resolver: R,
    loader: L,
}

impl<R, L> Orchestrator<R, L>
where
    R: InterfaceResolver,
    L: ProgramLoader,
{
    pub fn new(resolver: R, loader: L) -> Self {
        Self { resolver, loader }
    }

    /// Run the startup sequence and hand back a session in `Running`.
    ///
    /// Nothing touches the kernel until the configuration is valid and both
    /// interfaces resolve. Once the object is loaded, any failure drops the
    /// partially built session, which detaches and closes what it holds.
    pub fn start(&self, conf: &Conf) -> Result<GatewaySession<L::Dataplane>> {
        let state = GatewayState::Validating;
        info!(
            event.name = "gateway.state_changed",
            gateway.state.to = state.as_str(),
            "gateway state changed"
        );

        let plan = GatewayPlan::from_conf(conf)?;

        let source_ifindex = self.resolver.resolve(&plan.source_interface)?;
        let destination_ifindex = self.resolver.resolve(&plan.destination_interface)?;
        // The backend record stores the redirect target in 16 bits.
        let backend_ifindex = u16::try_from(destination_ifindex).map_err(|_| {
            GatewayError::InterfaceIndexOutOfRange {
                name: plan.destination_interface.clone(),
                index: destination_ifindex,
            }
        })?;

        let state = state.advance(GatewayState::LoadingProgram);
        let dataplane = self.loader.load()?;
        let mut session = GatewaySession::new(dataplane, state);

        session.enter(GatewayState::AttachingSource);
        session.attach(ProgramRole::Source, source_ifindex)?;

        session.enter(GatewayState::AttachingDestination);
        session.attach(ProgramRole::Destination, destination_ifindex)?;

        session.enter(GatewayState::PublishingBackend);
        let key = plan.key();
        let backend = plan.backend(backend_ifindex);
        session.publish(key, backend, UpdateMode::CreateOrReplace)?;

        info!(
            event.name = "gateway.backend_published",
            backend.key = %addr::decode_ipv4(key),
            backend.saddr = %addr::decode_ipv4(backend.saddr),
            backend.daddr = %addr::decode_ipv4(backend.daddr),
            backend.hwaddr = %addr::format_mac(&backend.hwaddr),
            backend.ifindex = backend.ifindex,
            "backend entry published"
        );

        session.enter(GatewayState::Running);
        Ok(session)
    }
}
