//! wsfwd wire protocol - node <-> controller messages
//!
//! Every message is one JSON object with a mandatory `type` field. Inbound
//! messages (controller -> node) decode into [`Inbound`], outbound messages
//! (node -> controller) encode from [`Outbound`].

pub mod ble;
pub mod frame;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

pub use frame::{decode_hex, encode_hex};

/// Message from the controller to the node
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    AuthResult {
        #[serde(default, deserialize_with = "lenient_bool")]
        success: bool,
    },
    Command {
        #[serde(default, deserialize_with = "lenient_id")]
        id: i64,
        /// Hex encoded frame for the peripheral
        #[serde(default, deserialize_with = "lenient_string")]
        data: Option<String>,
    },
    GetBattery,
    GetRssi,
    Scan,
    Connect,
    DisconnectBle,
    #[serde(other)]
    Unknown,
}

/// Device entry inside a `scan_result`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanDevice {
    pub name: String,
    pub rssi: i32,
}

/// Message from the node to the controller
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    Auth {
        token: String,
        #[serde(rename = "nodeId")]
        node_id: String,
    },
    Status {
        #[serde(rename = "bleConnected")]
        ble_connected: bool,
        battery: i32,
    },
    Battery {
        level: i32,
    },
    Rssi {
        value: i32,
    },
    ScanResult {
        devices: Vec<ScanDevice>,
    },
    CommandResult {
        id: i64,
        success: bool,
    },
}

impl Outbound {
    pub fn command_result(id: i64, success: bool) -> Self {
        Self::CommandResult { id, success }
    }

    /// Compact JSON text for the transport
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Why an inbound text was dropped
#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message is not a JSON object")]
    NotAnObject,
    #[error("message has no type")]
    MissingType,
    #[error("unknown message type: {0}")]
    UnknownType(String),
}

impl Inbound {
    /// Decode one inbound text message.
    ///
    /// Field values of the wrong JSON type fall back to their defaults, so a
    /// `command` with a garbled `id` still decodes (and still gets a result).
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let value: JsonValue = serde_json::from_str(text)?;
        let object = value.as_object().ok_or(ParseError::NotAnObject)?;
        let kind = match object.get("type").and_then(JsonValue::as_str) {
            Some(kind) => kind.to_string(),
            None => return Err(ParseError::MissingType),
        };

        match serde_json::from_value::<Inbound>(value)? {
            Inbound::Unknown => Err(ParseError::UnknownType(kind)),
            msg => Ok(msg),
        }
    }
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(JsonValue::deserialize(d)?.as_bool().unwrap_or(false))
}

fn lenient_id<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    Ok(JsonValue::deserialize(d)?.as_i64().unwrap_or(0))
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match JsonValue::deserialize(d)? {
        JsonValue::String(s) => Some(s),
        _ => None,
    })
}
