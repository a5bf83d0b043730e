//! Scripted device behavior
//!
//! A [`SimDevice`] describes what sits behind a simulated port: what it
//! prints at power-up, how it answers request lines, and which baud rate it
//! expects. The device runs as a spawned task over one end of a duplex pipe.

use std::collections::HashMap;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tracing::trace;

/// Behavior of a simulated device sitting behind a port
#[derive(Debug, Clone, Default)]
pub struct SimDevice {
    boot_chatter: Vec<String>,
    replies: HashMap<String, String>,
    default_reply: Option<String>,
    expected_baud: Option<u32>,
}

impl SimDevice {
    /// Device that says nothing and answers nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Device that answers `request` with `reply` and is otherwise silent
    pub fn answering(request: impl Into<String>, reply: impl Into<String>) -> Self {
        Self::new().with_reply(request, reply)
    }

    /// Add lines the device prints as soon as the port opens
    pub fn with_boot_chatter(mut self, lines: &[&str]) -> Self {
        self.boot_chatter = lines.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Add an answer for a specific request line
    pub fn with_reply(mut self, request: impl Into<String>, reply: impl Into<String>) -> Self {
        self.replies.insert(request.into(), reply.into());
        self
    }

    /// Answer for requests that have no specific entry
    pub fn with_default_reply(mut self, reply: impl Into<String>) -> Self {
        self.default_reply = Some(reply.into());
        self
    }

    /// Require this baud rate; opening at any other leaves the device mute,
    /// the way a real device at the wrong speed reads as garbage or nothing
    pub fn expecting_baud(mut self, baud_rate: u32) -> Self {
        self.expected_baud = Some(baud_rate);
        self
    }

    fn reply_for(&self, request: &str) -> Option<&str> {
        self.replies
            .get(request)
            .or(self.default_reply.as_ref())
            .map(String::as_str)
    }

    fn speaks_at(&self, baud_rate: u32) -> bool {
        self.expected_baud.map_or(true, |expected| expected == baud_rate)
    }
}

/// Serve a device script over the far end of a port's duplex pipe
pub(crate) fn spawn_device_task(device: SimDevice, io: DuplexStream, baud_rate: u32) {
    tokio::spawn(async move {
        let (reader, mut writer) = tokio::io::split(io);
        let mut lines = BufReader::new(reader).lines();

        if !device.speaks_at(baud_rate) {
            trace!("Device opened at wrong baud rate {}, staying mute", baud_rate);
            // Swallow requests until the port closes.
            while let Ok(Some(_)) = lines.next_line().await {}
            return;
        }

        for line in &device.boot_chatter {
            if writer
                .write_all(format!("{line}\r\n").as_bytes())
                .await
                .is_err()
            {
                return;
            }
        }

        while let Ok(Some(request)) = lines.next_line().await {
            let request = request.trim_end_matches('\r');
            trace!("Device received {:?}", request);
            if let Some(reply) = device.reply_for(request) {
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
