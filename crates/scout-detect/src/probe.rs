//! Handshake probing for device identification
//!
//! A probe opens a candidate port, waits out the device's boot-time chatter,
//! writes the profile's identification request and checks one reply line for
//! the expected substring. Every failure mode — busy port, timeout, wrong
//! reply, I/O error — is a quiet no-match; the caller just moves on.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{sleep, timeout};
use tracing::{debug, trace};

use crate::profile::DeviceProfile;
use crate::transport::SerialTransport;

/// Timing knobs for the handshake
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Upper bound on a single line read
    pub read_timeout: Duration,
    /// Grace period after opening, before the chatter drain starts
    pub settle: Duration,
    /// Consecutive empty reads that end the chatter drain
    pub quiet_reads: u32,
    /// Wait between writing the request and reading the reply
    pub reply_delay: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(100),
            settle: Duration::from_secs(1),
            quiet_reads: 3,
            reply_delay: Duration::from_secs(1),
        }
    }
}

/// Performs identification handshakes against serial ports
#[derive(Debug, Clone)]
pub struct HandshakeProber {
    config: ProbeConfig,
}

impl HandshakeProber {
    /// Create a prober with default timing
    pub fn new() -> Self {
        Self {
            config: ProbeConfig::default(),
        }
    }

    /// Create a prober with custom timing
    pub fn with_config(config: ProbeConfig) -> Self {
        Self { config }
    }

    /// Probe `port` for the device described by `profile`
    ///
    /// Returns the open connection when the device answered with the expected
    /// reply; the caller keeps it for as long as the device counts as
    /// present. Returns `None` on any failure, including a port that cannot
    /// be opened.
    pub async fn probe_port<T>(
        &self,
        transport: &T,
        port: &str,
        profile: &DeviceProfile,
    ) -> Option<T::Port>
    where
        T: SerialTransport,
    {
        debug!(
            "Probing {} for {} at {} baud",
            port, profile.name, profile.baud_rate
        );

        let mut connection = match transport.open(port, profile.baud_rate) {
            Ok(c) => c,
            Err(e) => {
                debug!("Failed to open {}: {}", port, e);
                return None;
            }
        };

        if self.identify(&mut connection, profile).await {
            Some(connection)
        } else {
            None
        }
    }

    /// Run the handshake against an already open connection
    pub async fn identify<S>(&self, io: &mut S, profile: &DeviceProfile) -> bool
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match self.handshake(io, profile).await {
            Ok(matched) => matched,
            Err(e) => {
                trace!("Handshake for {} failed: {}", profile.name, e);
                false
            }
        }
    }

    async fn handshake<S>(&self, io: &mut S, profile: &DeviceProfile) -> io::Result<bool>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        // Let the device finish whatever it prints at power-up before we
        // talk to it.
        sleep(self.config.settle).await;
        self.drain_chatter(io).await?;

        io.write_all(profile.send.as_bytes()).await?;
        io.write_all(b"\r\n").await?;
        io.flush().await?;

        sleep(self.config.reply_delay).await;
        let reply = self.read_line(io).await?;
        trace!("Reply for {}: {:?}", profile.name, reply);

        Ok(profile.matches_reply(&reply))
    }

    /// Discard output until the port stays quiet for `quiet_reads` reads in
    /// a row.
    ///
    /// A device that never goes quiet keeps the probe here indefinitely;
    /// physical devices are expected to settle after boot.
    async fn drain_chatter<S>(&self, io: &mut S) -> io::Result<()>
    where
        S: AsyncRead + Unpin,
    {
        loop {
            let mut quiet = 0;
            while quiet < self.config.quiet_reads {
                let line = self.read_line(io).await?;
                if line.trim().is_empty() {
                    quiet += 1;
                } else {
                    break;
                }
            }
            if quiet == self.config.quiet_reads {
                return Ok(());
            }
        }
    }

    /// Read one line, without the terminator
    ///
    /// Each byte read is bounded by `read_timeout`, so a silent port comes
    /// back as an empty line rather than blocking forever.
    async fn read_line<S>(&self, io: &mut S) -> io::Result<String>
    where
        S: AsyncRead + Unpin,
    {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];

        loop {
            match timeout(self.config.read_timeout, io.read(&mut byte)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(_)) => {
                    if byte[0] == b'\n' {
                        break;
                    }
                    line.push(byte[0]);
                }
                Ok(Err(e)) if e.kind() == io::ErrorKind::TimedOut => break,
                Ok(Err(e)) => return Err(e),
                Err(_) => break,
            }
        }

        Ok(String::from_utf8_lossy(&line).into_owned())
    }
}

impl Default for HandshakeProber {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DetectError;
    use tokio::io::{duplex, AsyncBufReadExt, BufReader, DuplexStream};

    fn fast_config() -> ProbeConfig {
        ProbeConfig {
            read_timeout: Duration::from_millis(20),
            settle: Duration::from_millis(5),
            quiet_reads: 3,
            reply_delay: Duration::from_millis(5),
        }
    }

    fn meter() -> DeviceProfile {
        DeviceProfile::new("Meter", "ID?", "METER-OK", 9600)
    }

    /// Spawn a device behind the far end of a duplex pipe: optionally prints
    /// boot chatter, then answers every request line with `reply` (or stays
    /// silent when `reply` is `None`).
    fn spawn_device(io: DuplexStream, chatter: &[&str], reply: Option<&str>) {
        let chatter: Vec<String> = chatter.iter().map(|s| s.to_string()).collect();
        let reply = reply.map(|s| s.to_string());

        tokio::spawn(async move {
            let (reader, mut writer) = tokio::io::split(io);
            let mut lines = BufReader::new(reader).lines();

            for line in chatter {
                if writer
                    .write_all(format!("{line}\r\n").as_bytes())
                    .await
                    .is_err()
                {
                    return;
                }
            }

            while let Ok(Some(_request)) = lines.next_line().await {
                if let Some(reply) = &reply {
                    if writer
                        .write_all(format!("{reply}\r\n").as_bytes())
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
            }
        });
    }

    #[tokio::test]
    async fn matching_reply_identifies_device() {
        let (mut near, far) = duplex(256);
        spawn_device(far, &[], Some("METER-OK v2.1"));

        let prober = HandshakeProber::with_config(fast_config());
        assert!(prober.identify(&mut near, &meter()).await);
    }

    #[tokio::test]
    async fn wrong_reply_is_rejected() {
        let (mut near, far) = duplex(256);
        spawn_device(far, &[], Some("NOPE"));

        let prober = HandshakeProber::with_config(fast_config());
        assert!(!prober.identify(&mut near, &meter()).await);
    }

    #[tokio::test]
    async fn silent_device_is_rejected() {
        let (mut near, far) = duplex(256);
        spawn_device(far, &[], None);

        let prober = HandshakeProber::with_config(fast_config());
        assert!(!prober.identify(&mut near, &meter()).await);
    }

    #[tokio::test]
    async fn boot_chatter_is_drained_before_the_request() {
        let (mut near, far) = duplex(256);
        spawn_device(
            far,
            &["booting...", "self test ok", "ready"],
            Some("METER-OK"),
        );

        let prober = HandshakeProber::with_config(fast_config());
        assert!(prober.identify(&mut near, &meter()).await);
    }

    #[tokio::test]
    async fn malformed_reply_is_rejected() {
        let (mut near, far) = duplex(256);
        tokio::spawn(async move {
            let (reader, mut writer) = tokio::io::split(far);
            let mut lines = BufReader::new(reader).lines();
            if let Ok(Some(_)) = lines.next_line().await {
                let _ = writer.write_all(&[0xFF, 0xFE, 0x01, b'\r', b'\n']).await;
            }
        });

        let prober = HandshakeProber::with_config(fast_config());
        assert!(!prober.identify(&mut near, &meter()).await);
    }

    #[tokio::test]
    async fn closed_connection_is_a_quiet_no_match() {
        let (mut near, far) = duplex(256);
        drop(far);

        let prober = HandshakeProber::with_config(fast_config());
        assert!(!prober.identify(&mut near, &meter()).await);
    }

    /// Transport whose ports exist but can never be opened.
    struct UnopenableTransport;

    impl SerialTransport for UnopenableTransport {
        type Port = DuplexStream;

        fn list_ports(&self) -> Result<Vec<String>, DetectError> {
            Ok(vec!["COM9".to_string()])
        }

        fn open(&self, port: &str, _baud_rate: u32) -> Result<DuplexStream, DetectError> {
            Err(DetectError::OpenFailed {
                port: port.to_string(),
                reason: "access denied".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn unopenable_port_is_a_quiet_no_match() {
        let prober = HandshakeProber::with_config(fast_config());
        let result = prober
            .probe_port(&UnopenableTransport, "COM9", &meter())
            .await;
        assert!(result.is_none());
    }

    #[test]
    fn default_timing_matches_the_wire_protocol() {
        let config = ProbeConfig::default();
        assert_eq!(config.read_timeout, Duration::from_millis(100));
        assert_eq!(config.settle, Duration::from_secs(1));
        assert_eq!(config.quiet_reads, 3);
        assert_eq!(config.reply_delay, Duration::from_secs(1));
    }
}
