//! The scan loop
//!
//! One background worker repeatedly enumerates ports, probes them for the
//! profiles that are still unaccounted for, and reports the result. All
//! probing and sleeping happens sequentially on that worker; the controlling
//! side only flips the stop signal and receives events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use scout_detect::{DeviceProfile, HandshakeProber, ProbeConfig, SerialTransport};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::WatchError;
use crate::events::WatchEvent;
use crate::state::WatchState;

/// Timing configuration for the scan loop
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Pause between scan cycles
    pub cycle_interval: Duration,
    /// Handshake timing used for every probe
    pub probe: ProbeConfig,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            cycle_interval: Duration::from_secs(1),
            probe: ProbeConfig::default(),
        }
    }
}

/// Cooperative stop flag shared between the loop and its controller
///
/// Safe to clone and flip from any thread. The loop checks it at the top of
/// each cycle, so a request takes effect once the in-flight cycle completes.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// Create a signal in the "keep running" state
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the loop to stop
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop has been requested
    pub fn stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Control handle for a running scan loop
pub struct WatchHandle {
    stop: StopSignal,
    task: JoinHandle<Result<(), WatchError>>,
}

impl WatchHandle {
    /// Ask the loop to stop; it finishes the in-flight cycle first
    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    /// A cloneable stop signal, for wiring into Ctrl-C handlers and the like
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Wait for the loop to finish and surface how it ended
    pub async fn join(self) -> Result<(), WatchError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(WatchError::Worker(e.to_string())),
        }
    }
}

/// Start the scan loop on a background task
///
/// Status updates arrive on `event_tx`, ending with a single
/// [`WatchEvent::Finished`]. Use the returned [`WatchHandle`] to request a
/// stop and to collect the loop's result.
pub fn spawn_watcher<T>(
    transport: T,
    profiles: Vec<DeviceProfile>,
    config: WatchConfig,
    event_tx: mpsc::Sender<WatchEvent>,
) -> WatchHandle
where
    T: SerialTransport + Send + Sync + 'static,
{
    let stop = StopSignal::new();
    let task = tokio::spawn(run_watcher(
        transport,
        profiles,
        config,
        stop.clone(),
        event_tx,
    ));
    WatchHandle { stop, task }
}

/// Drive scan cycles until stopped or the transport breaks
///
/// Exposed separately from [`spawn_watcher`] so callers can run the loop on
/// a task of their own choosing.
pub async fn run_watcher<T>(
    transport: T,
    profiles: Vec<DeviceProfile>,
    config: WatchConfig,
    stop: StopSignal,
    event_tx: mpsc::Sender<WatchEvent>,
) -> Result<(), WatchError>
where
    T: SerialTransport,
{
    let prober = HandshakeProber::with_config(config.probe.clone());
    let mut state: WatchState<T::Port> = WatchState::new(profiles);
    info!("Scan loop started");

    let result = loop {
        if stop.stop_requested() {
            info!("Stop requested, finishing scan loop");
            break Ok(());
        }

        let ports = match transport.list_ports() {
            Ok(ports) => ports,
            Err(e) if e.is_fatal() => {
                warn!("Port enumeration is unusable: {}", e);
                let _ = event_tx
                    .send(WatchEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
                break Err(WatchError::from(e));
            }
            Err(e) => {
                warn!("Port enumeration failed, treating as no ports: {}", e);
                Vec::new()
            }
        };

        // A bound device whose port vanished is gone; its profile goes back
        // into the pool before this cycle's probing.
        for name in state.release_missing(&ports) {
            info!("{} disconnected", name);
        }

        for port in &ports {
            for profile in state.unbound_profiles() {
                if let Some(connection) = prober.probe_port(&transport, port, &profile).await {
                    info!("{} found on {}", profile.name, port);
                    state.bind(profile, port.clone(), connection);
                }
            }
        }

        let _ = event_tx
            .send(WatchEvent::Status {
                text: state.status_text(),
            })
            .await;

        sleep(config.cycle_interval).await;
    };

    let _ = event_tx.send(WatchEvent::Finished).await;
    info!("Scan loop stopped");
    result
}
