//! Body encodings: JSON (default) and XML

use crate::error::{NappingError, NappingResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Wire encoding used to marshal payloads and unmarshal responses.
///
/// The set is closed; an unknown name is rejected when parsed, so a session
/// never holds an invalid encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    #[default]
    Json,
    Xml,
}

impl Encoding {
    /// Content type sent as `Content-Type` and default `Accept`
    pub fn content_type(&self) -> &'static str {
        match self {
            Encoding::Json => "application/json",
            Encoding::Xml => "application/xml",
        }
    }

    /// Serialize a value into a request body
    pub fn marshal<T: Serialize + ?Sized>(&self, value: &T) -> NappingResult<Vec<u8>> {
        match self {
            Encoding::Json => serde_json::to_vec(value)
                .map_err(|e| NappingError::Encode(format!("Failed to serialize JSON: {}", e))),
            Encoding::Xml => quick_xml::se::to_string(value)
                .map(String::into_bytes)
                .map_err(|e| NappingError::Encode(format!("Failed to serialize XML: {}", e))),
        }
    }

    /// Deserialize a response body
    pub fn unmarshal<T: DeserializeOwned>(&self, body: &[u8]) -> NappingResult<T> {
        match self {
            Encoding::Json => serde_json::from_slice(body)
                .map_err(|e| NappingError::Decode(format!("Failed to deserialize JSON: {}", e))),
            Encoding::Xml => quick_xml::de::from_reader(body)
                .map_err(|e| NappingError::Decode(format!("Failed to deserialize XML: {}", e))),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Json => f.write_str("json"),
            Encoding::Xml => f.write_str("xml"),
        }
    }
}

impl FromStr for Encoding {
    type Err = NappingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" | "application/json" => Ok(Encoding::Json),
            "xml" | "application/xml" | "text/xml" => Ok(Encoding::Xml),
            _ => Err(NappingError::InvalidEncoding(s.to_string())),
        }
    }
}
