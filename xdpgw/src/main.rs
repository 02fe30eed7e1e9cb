mod addr;
mod error;
mod gateway;
mod kernel;
mod runtime;

use tracing::{info, warn};

use crate::{
    gateway::Orchestrator,
    kernel::{KernelLoader, SystemInterfaces},
    runtime::{capabilities, logging, shutdown},
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let runtime::Runtime { conf, .. } = runtime::Runtime::new()?;

    logging::init(conf.log_level);

    info!(
        event.name = "gateway.starting",
        config.path = ?conf.config_path,
        ebpf.object.path = %conf.object_path.display(),
        ebpf.xdp_mode = %conf.xdp_mode,
        "starting xdp gateway"
    );

    capabilities::check_required_capabilities();

    let orchestrator = Orchestrator::new(SystemInterfaces, KernelLoader::from_conf(&conf));
    let session = orchestrator.start(&conf)?;

    info!(
        event.name = "gateway.running",
        gateway.state = %session.state(),
        network.interface.source = conf.source_interface.as_deref().unwrap_or_default(),
        network.interface.destination = conf.destination_interface.as_deref().unwrap_or_default(),
        "xdp programs attached, press Ctrl-C to exit"
    );

    let report = session.run_until(shutdown::wait_for_termination()).await?;
    if !report.is_clean() {
        // Release failures never change the exit status.
        warn!(
            event.name = "gateway.shutdown_incomplete",
            failed_count = report.failures.len(),
            "gateway exited with kernel resources that could not be released"
        );
    }

    Ok(())
}
