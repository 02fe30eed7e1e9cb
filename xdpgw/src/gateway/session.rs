use std::{future::Future, io};

use tracing::{info, warn};
use xdpgw_common::Backend;

use crate::{
    error::{GatewayError, Result},
    gateway::state::GatewayState,
    kernel::{AttachedLink, Dataplane, ProgramRole, UpdateMode},
};

/// Outcome of releasing a session. Release never stops at the first
/// failure; every step runs and its error, if any, is collected here.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    pub detached: usize,
    pub closed: bool,
    pub failures: Vec<GatewayError>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Owns the loaded program handle and both interface bindings for the
/// lifetime of one run.
///
/// Dropping a session that still holds kernel resources releases them, so a
/// startup step that fails with `?` leaves nothing attached behind it.
pub struct GatewaySession<D: Dataplane> {
    state: GatewayState,
    dataplane: Option<D>,
    source: Option<D::Link>,
    destination: Option<D::Link>,
}

impl<D: Dataplane> GatewaySession<D> {
    pub(crate) fn new(dataplane: D, state: GatewayState) -> Self {
        Self {
            state,
            dataplane: Some(dataplane),
            source: None,
            destination: None,
        }
    }

    pub fn state(&self) -> GatewayState {
        self.state
    }

    pub(crate) fn enter(&mut self, next: GatewayState) {
        self.state = self.state.advance(next);
    }

    fn dataplane_mut(&mut self) -> Result<&mut D> {
        self.dataplane
            .as_mut()
            .ok_or_else(|| GatewayError::internal("program handle already released"))
    }

    pub(crate) fn attach(&mut self, role: ProgramRole, ifindex: u32) -> Result<()> {
        let occupied = match role {
            ProgramRole::Source => self.source.is_some(),
            ProgramRole::Destination => self.destination.is_some(),
        };
        if occupied {
            return Err(GatewayError::internal(format!("{role} binding already attached")));
        }

        let link = self.dataplane_mut()?.attach(role, ifindex)?;
        match role {
            ProgramRole::Source => self.source = Some(link),
            ProgramRole::Destination => self.destination = Some(link),
        }
        Ok(())
    }

    pub(crate) fn publish(&mut self, key: u32, backend: Backend, mode: UpdateMode) -> Result<()> {
        self.dataplane_mut()?.publish_backend(key, backend, mode)
    }

    fn holds_resources(&self) -> bool {
        self.dataplane.is_some() || self.source.is_some() || self.destination.is_some()
    }

    /// Release everything in reverse order of acquisition: destination
    /// binding, source binding, program handle. Safe to call more than once.
    pub fn release(&mut self) -> ShutdownReport {
        let mut report = ShutdownReport::default();

        for link in [self.destination.take(), self.source.take()]
            .into_iter()
            .flatten()
        {
            let role = link.role();
            let ifindex = link.ifindex();
            match link.detach() {
                Ok(()) => {
                    report.detached += 1;
                    info!(
                        event.name = "gateway.program_detached",
                        ebpf.program.role = %role,
                        network.interface.index = ifindex,
                        "xdp program detached"
                    );
                }
                Err(e) => {
                    warn!(
                        event.name = "gateway.detach_failed",
                        ebpf.program.role = %role,
                        network.interface.index = ifindex,
                        error = %e,
                        "failed to detach xdp program"
                    );
                    report.failures.push(e);
                }
            }
        }

        if let Some(dataplane) = self.dataplane.take() {
            match dataplane.close() {
                Ok(()) => {
                    report.closed = true;
                    info!(
                        event.name = "gateway.program_closed",
                        "ebpf object released"
                    );
                }
                Err(e) => {
                    warn!(
                        event.name = "gateway.close_failed",
                        error = %e,
                        "failed to release ebpf object"
                    );
                    report.failures.push(e);
                }
            }
        }

        report
    }

    /// Block in `Running` until `signal` resolves, then release everything.
    ///
    /// Resources are released even when waiting for the signal fails; the
    /// wait error is returned afterwards.
    pub async fn run_until<F>(mut self, signal: F) -> Result<ShutdownReport>
    where
        F: Future<Output = io::Result<&'static str>>,
    {
        let received = signal.await;
        match &received {
            Ok(name) => info!(
                event.name = "gateway.signal_received",
                process.signal = %name,
                "termination signal received"
            ),
            Err(e) => warn!(
                event.name = "gateway.signal_failed",
                error = %e,
                "failed to wait for termination signal"
            ),
        }

        self.enter(GatewayState::ShuttingDown);
        let report = self.release();
        self.enter(GatewayState::Terminated);

        info!(
            event.name = "gateway.shutdown_completed",
            detached_count = report.detached,
            program_closed = report.closed,
            failed_count = report.failures.len(),
            "gateway shutdown completed"
        );

        received.map_err(GatewayError::Signal)?;
        Ok(report)
    }
}

impl<D: Dataplane> Drop for GatewaySession<D> {
    fn drop(&mut self) {
        if !self.holds_resources() {
            return;
        }

        warn!(
            event.name = "gateway.unwinding",
            gateway.state = %self.state,
            "releasing kernel resources acquired before failure"
        );
        self.enter(GatewayState::ShuttingDown);
        let report = self.release();
        self.enter(GatewayState::Terminated);

        if !report.is_clean() {
            warn!(
                event.name = "gateway.unwind_incomplete",
                failed_count = report.failures.len(),
                "some kernel resources could not be released"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::{
        gateway::testing::{Call, FailPoint, FakeDataplane, FakeKernel},
        kernel::ProgramLoader,
    };

    fn running_session(kernel: &FakeKernel) -> GatewaySession<FakeDataplane> {
        let mut session = GatewaySession::new(kernel.load().unwrap(), GatewayState::LoadingProgram);
        session.attach(ProgramRole::Source, 3).unwrap();
        session.attach(ProgramRole::Destination, 9).unwrap();
        session.enter(GatewayState::Running);
        session
    }

    #[test]
    fn release_runs_in_reverse_order() {
        let kernel = FakeKernel::default();
        let mut session = running_session(&kernel);

        let report = session.release();
        assert!(report.is_clean());
        assert_eq!(report.detached, 2);
        assert!(report.closed);
        assert_eq!(
            kernel.calls_since_load(),
            [
                Call::Attach(ProgramRole::Source, 3),
                Call::Attach(ProgramRole::Destination, 9),
                Call::Detach(ProgramRole::Destination, 9),
                Call::Detach(ProgramRole::Source, 3),
                Call::Close,
            ]
        );
    }

    #[test]
    fn release_is_idempotent() {
        let kernel = FakeKernel::default();
        let mut session = running_session(&kernel);

        session.release();
        let second = session.release();
        assert_eq!(second.detached, 0);
        assert!(!second.closed);
        assert!(second.is_clean());
        assert_eq!(kernel.count(&Call::Close), 1);
    }

    #[test]
    fn failed_detach_does_not_stop_the_rest() {
        let kernel = FakeKernel::default().failing(FailPoint::Detach(ProgramRole::Destination));
        let mut session = running_session(&kernel);

        let report = session.release();
        assert_eq!(report.detached, 1);
        assert!(report.closed);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            report.failures[0],
            GatewayError::Detach {
                role: ProgramRole::Destination,
                ifindex: 9,
                ..
            }
        ));
        assert!(kernel.calls().ends_with(&[
            Call::Detach(ProgramRole::Destination, 9),
            Call::Detach(ProgramRole::Source, 3),
            Call::Close,
        ]));
    }

    #[test]
    fn failed_close_is_reported() {
        let kernel = FakeKernel::default().failing(FailPoint::Close);
        let mut session = running_session(&kernel);

        let report = session.release();
        assert_eq!(report.detached, 2);
        assert!(!report.closed);
        assert!(matches!(report.failures[..], [GatewayError::Close { .. }]));
    }

    #[test]
    fn drop_releases_held_resources() {
        let kernel = FakeKernel::default();
        {
            let mut session =
                GatewaySession::new(kernel.load().unwrap(), GatewayState::LoadingProgram);
            session.attach(ProgramRole::Source, 3).unwrap();
        }
        assert!(kernel.calls().ends_with(&[
            Call::Detach(ProgramRole::Source, 3),
            Call::Close,
        ]));
    }

    #[tokio::test]
    async fn run_until_releases_after_signal() {
        let kernel = FakeKernel::default();
        let session = running_session(&kernel);
        assert_eq!(session.state(), GatewayState::Running);

        let report = session.run_until(async { Ok("SIGTERM") }).await.unwrap();
        assert_eq!(report.detached, 2);
        assert!(report.closed);
        assert_eq!(kernel.count(&Call::Close), 1);
    }

    #[tokio::test]
    async fn run_until_releases_even_when_signal_wait_fails() {
        let kernel = FakeKernel::default();
        let session = running_session(&kernel);

        let err = session
            .run_until(async { Err(io::Error::other("no signal handler")) })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Signal(_)));
        assert!(kernel.calls().ends_with(&[
            Call::Detach(ProgramRole::Destination, 9),
            Call::Detach(ProgramRole::Source, 3),
            Call::Close,
        ]));
    }
}
