use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use iotdcp_device::{serve, Device, DeviceLogic, Manifest};
use iotdcp_transport::DatagramSocket;

use crate::cmd::ServeArgs;
use crate::exit::{device_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_listening, print_stopped, OutputFormat};
use crate::sample::{self, SampleLamp};
use crate::store::MemoryLogic;

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let (manifest, logic): (Manifest, Box<dyn DeviceLogic>) = match &args.manifest {
        Some(path) => {
            let manifest =
                Manifest::load(path).map_err(|err| device_error("manifest rejected", err))?;
            let logic: Box<dyn DeviceLogic> = Box::new(MemoryLogic::new(&manifest.catalog));
            (manifest, logic)
        }
        None => {
            let logic: Box<dyn DeviceLogic> = Box::new(SampleLamp::default());
            (sample::manifest(), logic)
        }
    };

    let profile = manifest.settings.profile;
    let mut device = Device::new(manifest.settings, manifest.catalog, logic)
        .map_err(|err| device_error("device setup failed", err))?;
    let socket = DatagramSocket::bind(args.bind.as_str())
        .map_err(|err| transport_error("bind failed", err))?;
    let local = socket
        .local_addr()
        .map_err(|err| transport_error("bind failed", err))?;

    let shutdown = Arc::new(AtomicBool::new(false));
    install_ctrlc_handler(shutdown.clone())?;

    print_listening(local, device.catalog().display_name(), profile.name(), format);

    let stats = serve(&mut device, &socket, &shutdown)
        .map_err(|err| device_error("serve failed", err))?;
    print_stopped(&stats, format);
    Ok(SUCCESS)
}

fn install_ctrlc_handler(shutdown: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        shutdown.store(true, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
