//! Cached feature switchboard: which provisioning surfaces the operator has
//! enabled fleet-wide

use crate::Cache;
use serde::{Deserialize, Serialize};

const FEATURES_KEY: &str = "config:features";

/// Fleet-wide provisioning switches.
///
/// The default is everything off: a plane that has not been configured yet
/// refuses to provision rather than provisioning unmetered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureGates {
    pub web: bool,
    pub tunnel: bool,
    pub forward: bool,
    pub proxy: bool,
    pub p2p: bool,
}

impl Cache {
    /// Publish the feature switchboard, replacing it wholesale
    pub fn put_feature_gates(&self, gates: &FeatureGates) {
        self.set(FEATURES_KEY, gates, None);
    }

    /// Read the feature switchboard; a miss reads as everything disabled
    pub fn feature_gates(&self) -> FeatureGates {
        self.get(FEATURES_KEY).unwrap_or_default()
    }
}
