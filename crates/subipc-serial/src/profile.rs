use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use subipc_frame::{ENCODING_ADVANCED, ENCODING_JSON};
use tracing::trace;

use crate::advanced;
use crate::error::{Result, SerialError};
use crate::json::{from_json, to_json};
use crate::value::Value;

/// Serialization discipline of a channel, fixed when the channel is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Structured-clone style: keeps sharing, cycles, dates, bytes.
    #[default]
    Advanced,
    /// JSON value model after `to_json` hooks.
    Json,
}

impl Profile {
    pub fn as_str(self) -> &'static str {
        match self {
            Profile::Advanced => "advanced",
            Profile::Json => "json",
        }
    }

    /// Frame encoding tag for payloads of this profile.
    pub fn encoding_tag(self) -> u16 {
        match self {
            Profile::Advanced => ENCODING_ADVANCED,
            Profile::Json => ENCODING_JSON,
        }
    }

    /// Profile that produced a frame with the given encoding tag.
    pub fn from_encoding_tag(tag: u16) -> Option<Self> {
        match tag {
            ENCODING_ADVANCED => Some(Profile::Advanced),
            ENCODING_JSON => Some(Profile::Json),
            _ => None,
        }
    }

    /// Validate and serialize a value.
    pub fn encode(self, value: &Value) -> Result<Vec<u8>> {
        match self {
            Profile::Advanced => advanced::encode(value),
            Profile::Json => Ok(serde_json::to_vec(&to_json(value)?)?),
        }
    }

    /// Deserialize a payload produced by [`Profile::encode`].
    pub fn decode(self, payload: &[u8]) -> Result<Value> {
        trace!(profile = self.as_str(), bytes = payload.len(), "decoding payload");
        match self {
            Profile::Advanced => advanced::decode(payload),
            Profile::Json => {
                let json: serde_json::Value = serde_json::from_slice(payload)?;
                Ok(from_json(&json))
            }
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = SerialError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "advanced" => Ok(Profile::Advanced),
            "json" => Ok(Profile::Json),
            _ => Err(SerialError::UnknownProfile(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_profile_names() {
        assert_eq!("advanced".parse::<Profile>().unwrap(), Profile::Advanced);
        assert_eq!(" JSON ".parse::<Profile>().unwrap(), Profile::Json);
        assert!(matches!(
            "xml".parse::<Profile>(),
            Err(SerialError::UnknownProfile(name)) if name == "xml"
        ));
    }

    #[test]
    fn encoding_tags_map_back() {
        for profile in [Profile::Advanced, Profile::Json] {
            assert_eq!(
                Profile::from_encoding_tag(profile.encoding_tag()),
                Some(profile)
            );
        }
        assert_eq!(Profile::from_encoding_tag(0), None);
    }

    #[test]
    fn json_profile_emits_plain_json_text() {
        let value = Value::object([("ok", Value::Bool(true))]);
        let bytes = Profile::Json.encode(&value).unwrap();
        assert_eq!(bytes, br#"{"ok":true}"#);
        assert_eq!(Profile::Json.decode(&bytes).unwrap(), value);
    }

    #[test]
    fn json_profile_does_not_keep_sharing() {
        let shared = Value::object([("x", Value::Null)]);
        let value = Value::array([shared.clone(), shared]);

        let decoded = Profile::Json
            .decode(&Profile::Json.encode(&value).unwrap())
            .unwrap();
        assert_eq!(decoded, value);
        assert!(!decoded.at(0).unwrap().same_compound(&decoded.at(1).unwrap()));
    }

    #[test]
    fn garbage_payload_fails_to_decode() {
        assert!(Profile::Json.decode(b"{not json").is_err());
        assert!(Profile::Advanced.decode(b"[]").is_err());
    }
}
