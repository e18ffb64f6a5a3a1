//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a settings
//! file may be partial: missing fields keep their default value.

mod server;

pub use server::*;

use serde::{Deserialize, Serialize};

/// Root settings type.
///
/// Example file:
///
/// ```json
/// {
///   "server": { "port": 9000, "maxConnections": 500 },
///   "logging": { "level": "debug", "format": "json" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HuddleSettings {
    /// Network and session settings.
    pub server: ServerSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl HuddleSettings {
    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> crate::Result<()> {
        self.server.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let s: HuddleSettings = serde_json::from_str(r#"{"server":{"port":9000}}"#).unwrap();
        assert_eq!(s.server.port, 9000);
        assert_eq!(s.server.host, ServerSettings::default().host);
        assert_eq!(s.logging.level, "info");
    }

    #[test]
    fn empty_object_is_default() {
        let s: HuddleSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(s.server.port, ServerSettings::default().port);
    }

    #[test]
    fn serializes_camel_case() {
        let value = serde_json::to_value(HuddleSettings::default()).unwrap();
        assert!(value["server"].get("maxConnections").is_some());
        assert!(value["server"].get("heartbeatIntervalSecs").is_some());
        assert!(value["server"].get("closeOnMalformed").is_some());
    }
}
