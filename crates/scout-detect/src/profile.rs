//! Device descriptions used for identification

use serde::{Deserialize, Deserializer, Serialize};

/// Description of one device the scanner should look for
///
/// Profiles come from configuration and never change afterwards. The serde
/// field names match the settings file format; `Baudrate` is accepted as
/// either a number or a numeric string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Display name, unique within a configuration
    #[serde(rename = "Name")]
    pub name: String,
    /// Identification request written to the port (CRLF is appended on send)
    #[serde(rename = "Send")]
    pub send: String,
    /// Substring expected somewhere in the device's reply
    #[serde(rename = "Receive")]
    pub receive: String,
    /// Baud rate used for the handshake
    #[serde(rename = "Baudrate", deserialize_with = "baud_from_number_or_string")]
    pub baud_rate: u32,
}

impl DeviceProfile {
    /// Create a profile
    pub fn new(
        name: impl Into<String>,
        send: impl Into<String>,
        receive: impl Into<String>,
        baud_rate: u32,
    ) -> Self {
        Self {
            name: name.into(),
            send: send.into(),
            receive: receive.into(),
            baud_rate,
        }
    }

    /// Check whether a reply line identifies this device
    ///
    /// The reply is trimmed first; the match is a plain substring test.
    pub fn matches_reply(&self, reply: &str) -> bool {
        reply.trim().contains(&self.receive)
    }
}

fn baud_from_number_or_string<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Baud {
        Number(u32),
        Text(String),
    }

    match Baud::deserialize(deserializer)? {
        Baud::Number(n) => Ok(n),
        Baud::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid baud rate: {s:?}"))),
    }
}
