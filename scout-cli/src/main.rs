//! Serial device presence scanner
//!
//! Scans the machine's serial ports for the devices listed in a settings
//! file and prints which of them are connected, updating whenever a device
//! appears or disappears. Ctrl-C stops the scan after the in-flight cycle.

mod settings;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use scout_detect::{DeviceProfile, SystemTransport};
use scout_sim::{SimDevice, SimTransport};
use scout_watch::{spawn_watcher, WatchConfig, WatchEvent, WatchHandle};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use settings::Settings;

#[derive(Debug, Parser)]
#[command(
    name = "scout",
    about = "Reports which configured serial devices are connected",
    version
)]
struct Args {
    /// Path to the settings file
    #[arg(short, long, default_value = "settings.json")]
    settings: PathBuf,

    /// Seconds to pause between scan cycles
    #[arg(long, default_value_t = 1)]
    interval: u64,

    /// Scan simulated ports seeded from the settings instead of real hardware
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "scout=info,scout_detect=info,scout_watch=info,scout_sim=info".into()
        }))
        .init();

    let args = Args::parse();
    let settings = Settings::load(&args.settings)?;
    tracing::info!(
        "Scanning for {} configured device(s) every {}s",
        settings.devices.len(),
        args.interval
    );

    let config = WatchConfig {
        cycle_interval: Duration::from_secs(args.interval),
        ..Default::default()
    };

    let (event_tx, mut event_rx) = mpsc::channel(16);
    let handle = if args.demo {
        let transport = demo_transport(&settings.devices);
        spawn_watcher(transport, settings.devices, config, event_tx)
    } else {
        spawn_watcher(SystemTransport::new(), settings.devices, config, event_tx)
    };

    spawn_ctrl_c_handler(&handle);

    let mut last_status: Option<String> = None;
    while let Some(event) = event_rx.recv().await {
        match event {
            WatchEvent::Status { text } => {
                if last_status.as_deref() != Some(text.as_str()) {
                    if text.is_empty() {
                        println!("no devices connected");
                    } else {
                        println!("{text}");
                    }
                    last_status = Some(text);
                }
            }
            WatchEvent::Error { message } => eprintln!("scan failed: {message}"),
            WatchEvent::Finished => break,
        }
    }

    handle.join().await.context("scan loop failed")?;
    Ok(())
}

/// Stop the scan when Ctrl-C arrives; the loop finishes its current cycle.
fn spawn_ctrl_c_handler(handle: &WatchHandle) {
    let stop = handle.stop_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, stopping after the current cycle");
            stop.request_stop();
        }
    });
}

/// Simulated ports for `--demo`: one device per configured profile, answering
/// its request correctly, plus a noise port nothing should bind to.
fn demo_transport(profiles: &[DeviceProfile]) -> SimTransport {
    let transport = SimTransport::new();
    for (i, profile) in profiles.iter().enumerate() {
        transport.add_port(
            format!("sim-{i}"),
            SimDevice::answering(profile.send.clone(), profile.receive.clone())
                .with_boot_chatter(&["hello from the simulator"]),
        );
    }
    transport.add_port("sim-noise", SimDevice::new().with_default_reply("UNKNOWN"));
    transport
}
