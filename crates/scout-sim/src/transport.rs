//! In-memory transport with pluggable ports
//!
//! Ports live in shared state behind the (cloneable) [`SimTransport`], so a
//! test can add or remove them while a scan loop holds its own clone. Opens
//! are exclusive: a port stays busy until the returned [`SimPort`] is
//! dropped.

use std::collections::BTreeMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use scout_detect::{DetectError, SerialTransport};
use tokio::io::{duplex, AsyncRead, AsyncWrite, DuplexStream, ReadBuf};

use crate::device::{spawn_device_task, SimDevice};

const PIPE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum EnumerationBehavior {
    #[default]
    Normal,
    FailRecoverably,
    Broken,
}

#[derive(Debug, Default)]
struct SimInner {
    ports: BTreeMap<String, PortSlot>,
    enumeration: EnumerationBehavior,
}

#[derive(Debug)]
struct PortSlot {
    device: SimDevice,
    in_use: Arc<AtomicBool>,
}

/// Simulated serial transport
///
/// Clones share the same port table; enumeration order is the sorted port
/// name order, which keeps scans deterministic.
#[derive(Debug, Clone, Default)]
pub struct SimTransport {
    inner: Arc<Mutex<SimInner>>,
}

impl SimTransport {
    /// Create a transport with no ports
    pub fn new() -> Self {
        Self::default()
    }

    /// Plug in a port served by the given device script
    pub fn add_port(&self, name: impl Into<String>, device: SimDevice) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.ports.insert(
                name.into(),
                PortSlot {
                    device,
                    in_use: Arc::new(AtomicBool::new(false)),
                },
            );
        }
    }

    /// Unplug a port; an already open connection keeps its pipe but the port
    /// disappears from enumeration
    pub fn remove_port(&self, name: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.ports.remove(name);
        }
    }

    /// Make `list_ports` fail recoverably until [`restore`](Self::restore)
    pub fn fail_enumeration(&self) {
        self.set_enumeration(EnumerationBehavior::FailRecoverably);
    }

    /// Make `list_ports` report the transport as unusable
    pub fn break_transport(&self) {
        self.set_enumeration(EnumerationBehavior::Broken);
    }

    /// Return enumeration to normal operation
    pub fn restore(&self) {
        self.set_enumeration(EnumerationBehavior::Normal);
    }

    fn set_enumeration(&self, behavior: EnumerationBehavior) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.enumeration = behavior;
        }
    }
}

impl SerialTransport for SimTransport {
    type Port = SimPort;

    fn list_ports(&self) -> Result<Vec<String>, DetectError> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| DetectError::EnumerationBroken("transport state poisoned".into()))?;

        match inner.enumeration {
            EnumerationBehavior::Normal => Ok(inner.ports.keys().cloned().collect()),
            EnumerationBehavior::FailRecoverably => Err(DetectError::EnumerationFailed(
                "injected enumeration failure".into(),
            )),
            EnumerationBehavior::Broken => Err(DetectError::EnumerationBroken(
                "injected transport breakage".into(),
            )),
        }
    }

    /// Open a port
    ///
    /// Spawns the device task, so this must be called from within a tokio
    /// runtime.
    fn open(&self, port: &str, baud_rate: u32) -> Result<SimPort, DetectError> {
        let inner = self.inner.lock().map_err(|_| DetectError::OpenFailed {
            port: port.to_string(),
            reason: "transport state poisoned".into(),
        })?;

        let slot = inner.ports.get(port).ok_or_else(|| DetectError::OpenFailed {
            port: port.to_string(),
            reason: "no such port".into(),
        })?;

        if slot.in_use.swap(true, Ordering::SeqCst) {
            return Err(DetectError::OpenFailed {
                port: port.to_string(),
                reason: "port is busy".into(),
            });
        }

        let (near, far) = duplex(PIPE_CAPACITY);
        spawn_device_task(slot.device.clone(), far, baud_rate);

        Ok(SimPort {
            io: near,
            _lease: PortLease {
                in_use: Arc::clone(&slot.in_use),
            },
        })
    }
}

/// Releases the port for reopening when dropped
#[derive(Debug)]
struct PortLease {
    in_use: Arc<AtomicBool>,
}

impl Drop for PortLease {
    fn drop(&mut self) {
        self.in_use.store(false, Ordering::SeqCst);
    }
}

/// Connection returned by [`SimTransport::open`]
#[derive(Debug)]
pub struct SimPort {
    io: DuplexStream,
    _lease: PortLease,
}

impl AsyncRead for SimPort {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_read(cx, buf)
    }
}

impl AsyncWrite for SimPort {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.io).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    #[test]
    fn ports_enumerate_in_sorted_order() {
        let transport = SimTransport::new();
        transport.add_port("B", SimDevice::new());
        transport.add_port("A", SimDevice::new());

        assert_eq!(
            transport.list_ports().unwrap(),
            vec!["A".to_string(), "B".to_string()]
        );

        transport.remove_port("A");
        assert_eq!(transport.list_ports().unwrap(), vec!["B".to_string()]);
    }

    #[tokio::test]
    async fn open_is_exclusive_until_drop() {
        let transport = SimTransport::new();
        transport.add_port("A", SimDevice::new());

        let first = transport.open("A", 9600).unwrap();
        assert!(matches!(
            transport.open("A", 9600),
            Err(DetectError::OpenFailed { .. })
        ));

        drop(first);
        assert!(transport.open("A", 9600).is_ok());
    }

    #[tokio::test]
    async fn unknown_port_cannot_be_opened() {
        let transport = SimTransport::new();
        assert!(matches!(
            transport.open("ghost", 9600),
            Err(DetectError::OpenFailed { .. })
        ));
    }

    #[tokio::test]
    async fn scripted_device_answers_requests() {
        let transport = SimTransport::new();
        transport.add_port("A", SimDevice::answering("ID?", "METER-OK"));

        let port = transport.open("A", 9600).unwrap();
        let (reader, mut writer) = tokio::io::split(port);
        let mut lines = BufReader::new(reader).lines();

        writer.write_all(b"ID?\r\n").await.unwrap();
        let reply = lines.next_line().await.unwrap().unwrap();
        assert_eq!(reply.trim_end_matches('\r'), "METER-OK");
    }

    #[tokio::test]
    async fn wrong_baud_rate_gets_no_answer() {
        let transport = SimTransport::new();
        transport.add_port(
            "A",
            SimDevice::answering("ID?", "METER-OK").expecting_baud(115_200),
        );

        let port = transport.open("A", 9600).unwrap();
        let (reader, mut writer) = tokio::io::split(port);
        let mut lines = BufReader::new(reader).lines();

        writer.write_all(b"ID?\r\n").await.unwrap();
        let reply = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            lines.next_line(),
        )
        .await;
        assert!(reply.is_err(), "mute device should never reply");
    }

    #[test]
    fn injected_failures_have_the_right_severity() {
        let transport = SimTransport::new();

        transport.fail_enumeration();
        let err = transport.list_ports().unwrap_err();
        assert!(!err.is_fatal());

        transport.break_transport();
        let err = transport.list_ports().unwrap_err();
        assert!(err.is_fatal());

        transport.restore();
        assert!(transport.list_ports().is_ok());
    }
}
