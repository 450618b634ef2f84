//! Cached traffic state: day-keyed byte counters written by the data path
//! and the short-lived online presence bit

use crate::Cache;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const TRAFFIC_KEY: &str = "traffic:";
const ONLINE_KEY: &str = "online:";

/// Counters survive well past the day they belong to; the aggregator reads
/// them before they age out and a closed day is never rewritten.
const TRAFFIC_TTL: Duration = Duration::from_secs(48 * 60 * 60);

/// Presence decays quickly; agents refresh it on every heartbeat.
const ONLINE_TTL: Duration = Duration::from_secs(120);

/// Accumulated bytes for one client on one day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficCounters {
    pub input_bytes: u64,
    pub output_bytes: u64,
}

fn traffic_key(date: NaiveDate, client_code: &str) -> String {
    format!("{TRAFFIC_KEY}{}:{client_code}", date.format("%Y-%m-%d"))
}

impl Cache {
    /// Read the day's counters for a client; a miss reads as zero
    pub fn traffic_counters(&self, date: NaiveDate, client_code: &str) -> TrafficCounters {
        self.get(&traffic_key(date, client_code)).unwrap_or_default()
    }

    /// Accumulate observed bytes into the day's counters.
    ///
    /// The update is atomic per key; concurrent reports from multiple
    /// relay connections never lose increments.
    pub fn add_traffic(&self, date: NaiveDate, client_code: &str, input_bytes: u64, output_bytes: u64) {
        self.update(
            &traffic_key(date, client_code),
            Some(TRAFFIC_TTL),
            |current: Option<TrafficCounters>| {
                let mut counters = current.unwrap_or_default();
                counters.input_bytes = counters.input_bytes.saturating_add(input_bytes);
                counters.output_bytes = counters.output_bytes.saturating_add(output_bytes);
                counters
            },
        );
    }

    /// Refresh a client's presence bit; decays after [`ONLINE_TTL`]
    pub fn mark_client_online(&self, client_code: &str) {
        self.set(&format!("{ONLINE_KEY}{client_code}"), &true, Some(ONLINE_TTL));
    }

    /// Whether the client currently has a live relay connection
    pub fn client_online(&self, client_code: &str) -> bool {
        self.get(&format!("{ONLINE_KEY}{client_code}")).unwrap_or(false)
    }

    /// Drop the presence bit immediately (clean disconnect)
    pub fn mark_client_offline(&self, client_code: &str) {
        self.delete(&format!("{ONLINE_KEY}{client_code}"));
    }
}
