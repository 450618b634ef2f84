//! Provisioning coordinator for the relayfleet control plane
//!
//! Orchestrates one provisioning request end to end: structural validation
//! before any store work, a single transaction covering resource allocation
//! and the quota debit, and post-commit publication of runtime snapshots
//! into the cache plus a fire-and-forget push to the config distributor.
//!
//! The coordinator exclusively owns the write path into the transactional
//! store and the cache for provisioning entities; nothing else mutates them,
//! which keeps every write-write race inside the transaction boundary.

pub mod admin;
pub mod coordinator;
pub mod distributor;
pub mod error;
pub mod settings;
pub mod validate;

pub use admin::{AdmissionPolicyRequest, NodeRequest};
pub use coordinator::{
    Coordinator, ForwardRequest, HostRequest, P2pRequest, Provisioned, ProvisionPhase,
};
pub use distributor::{ConfigDistributor, DistributeError, NoopDistributor};
pub use error::ProvisionError;
pub use settings::ProvisionSettings;
