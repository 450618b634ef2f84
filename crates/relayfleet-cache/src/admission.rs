//! Cached admission policies: IP allow-list gates consulted by the data path

use crate::Cache;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const ADMISSION_KEY: &str = "admission:";

/// Cache-resident projection of an admission policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionSnapshot {
    pub code: String,
    /// When false the allow-list is not enforced and every source is admitted
    pub enabled: bool,
    /// Allow-listed source addresses
    pub allow: HashSet<String>,
}

impl AdmissionSnapshot {
    pub fn new(code: impl Into<String>, enabled: bool, sources: impl IntoIterator<Item = String>) -> Self {
        Self {
            code: code.into(),
            enabled,
            allow: sources.into_iter().collect(),
        }
    }

    /// Whether a source address is admitted under this policy.
    ///
    /// A disabled policy admits everyone; an enabled one admits only listed
    /// addresses. A missing policy deserializes to the disabled default, so
    /// unknown resources stay open rather than locked out.
    pub fn allows_source_ip(&self, ip: &str) -> bool {
        if !self.enabled {
            return true;
        }
        self.allow.contains(ip)
    }
}

impl Cache {
    /// Publish an admission snapshot, replacing any previous one wholesale.
    ///
    /// Policies are recomputed in full on every update; there is no
    /// incremental patching of the allow set.
    pub fn put_admission(&self, snapshot: &AdmissionSnapshot) {
        self.set(&format!("{ADMISSION_KEY}{}", snapshot.code), snapshot, None);
    }

    /// Fetch the admission snapshot for `code`; a miss reads as the
    /// disabled (admit-everyone) default.
    pub fn admission(&self, code: &str) -> AdmissionSnapshot {
        self.get(&format!("{ADMISSION_KEY}{code}")).unwrap_or_default()
    }

    /// Drop the admission snapshot for `code`
    pub fn remove_admission(&self, code: &str) {
        self.delete(&format!("{ADMISSION_KEY}{code}"));
    }
}
