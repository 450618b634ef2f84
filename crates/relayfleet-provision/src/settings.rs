//! Coordinator configuration

use serde::{Deserialize, Serialize};

/// Tunables for the provisioning coordinator.
///
/// Injected by the host process at startup; the defaults match the fleet's
/// production values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionSettings {
    /// Length of generated domain prefixes
    pub prefix_len: usize,

    /// Length of each credential half
    pub credential_len: usize,

    /// How many unique-key collisions prefix generation absorbs before the
    /// request fails with a terminal collision error
    pub max_prefix_attempts: u32,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            prefix_len: 8,
            credential_len: 10,
            max_prefix_attempts: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let settings: ProvisionSettings = serde_json::from_str("{\"prefix_len\": 12}").unwrap();

        assert_eq!(settings.prefix_len, 12);
        assert_eq!(settings.credential_len, 10);
        assert_eq!(settings.max_prefix_attempts, 5);
    }
}
