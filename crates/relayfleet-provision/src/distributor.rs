//! Config distribution seam: pushes a freshly committed allocation's derived
//! configuration to the serving remote agent
//!
//! Distribution is fire-and-forget from the coordinator's perspective: it
//! runs strictly after commit, its failure is logged but never propagated to
//! the provisioning caller, and a periodic external refresh reconciles any
//! agent that missed a push.

use async_trait::async_trait;
use thiserror::Error;

/// Distribution failure; carries transport detail for the logs only
#[derive(Debug, Error)]
#[error("config distribution failed: {0}")]
pub struct DistributeError(pub String);

/// Push hook invoked after every committed provisioning change
#[async_trait]
pub trait ConfigDistributor: Send + Sync {
    /// Push the allocation's derived configuration to its serving agent
    async fn distribute(&self, tunnel_code: &str) -> Result<(), DistributeError>;
}

/// Distributor for embedders and tests that have no agent channel
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDistributor;

#[async_trait]
impl ConfigDistributor for NoopDistributor {
    async fn distribute(&self, tunnel_code: &str) -> Result<(), DistributeError> {
        tracing::trace!(tunnel_code, "no-op config distribution");
        Ok(())
    }
}
