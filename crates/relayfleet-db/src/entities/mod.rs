//! Database entities

pub mod admission_policy;
pub mod allocation;
pub mod client;
pub mod credential;
pub mod node;
pub mod node_domain;
pub mod node_port;
pub mod plan;
pub mod tenant_account;

pub use admission_policy::Entity as AdmissionPolicy;
pub use allocation::Entity as Allocation;
pub use client::Entity as Client;
pub use credential::Entity as Credential;
pub use node::Entity as Node;
pub use node_domain::Entity as NodeDomain;
pub use node_port::Entity as NodePort;
pub use plan::Entity as Plan;
pub use tenant_account::Entity as TenantAccount;

pub mod prelude {
    pub use super::admission_policy::Entity as AdmissionPolicy;
    pub use super::allocation::Entity as Allocation;
    pub use super::client::Entity as Client;
    pub use super::credential::Entity as Credential;
    pub use super::node::Entity as Node;
    pub use super::node_domain::Entity as NodeDomain;
    pub use super::node_port::Entity as NodePort;
    pub use super::plan::Entity as Plan;
    pub use super::tenant_account::Entity as TenantAccount;
}
