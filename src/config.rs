//! QoS settings for signaling sockets
//!
//! The settings are a plain value owned by whoever starts the socket, and
//! can be deserialized from any serde format. `tos` accepts either a number
//! or a DSCP class name.
//!
//! ```
//! use netsock::config::QosConfig;
//!
//! let config: QosConfig = toml::from_str("tos = \"EF\"\ncos = 5\n").unwrap();
//! assert_eq!(config.tos, 0xb8);
//! ```

use std::io;
use std::os::fd::AsFd;

use serde::{Deserialize, Deserializer};

use crate::net::qos::parse_tos;
use crate::net::set_qos;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QosConfig {
    /// ToS byte, also used as the IPv6 traffic class
    #[serde(deserialize_with = "deserialize_tos")]
    pub tos: u8,
    /// Link-layer priority
    pub cos: u32,
    /// Label used in log lines
    pub description: String,
}

impl Default for QosConfig {
    fn default() -> Self {
        QosConfig {
            tos: 0,
            cos: 0,
            description: "socket".to_string(),
        }
    }
}

impl QosConfig {
    /// Apply the settings to `socket`
    pub fn apply<S: AsFd>(&self, socket: &S) -> io::Result<()> {
        set_qos(socket, self.tos, self.cos, &self.description)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TosValue {
    Number(u8),
    Name(String),
}

fn deserialize_tos<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    match TosValue::deserialize(deserializer)? {
        TosValue::Number(tos) => Ok(tos),
        TosValue::Name(name) => parse_tos(&name).map_err(serde::de::Error::custom),
    }
}
