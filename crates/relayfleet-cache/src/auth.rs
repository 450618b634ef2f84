//! Cached credential lookups: username/password to tunnel code

use crate::Cache;

const AUTH_KEY: &str = "auth:";

fn auth_key(username: &str, password: &str) -> String {
    format!("{AUTH_KEY}{username}:{password}")
}

impl Cache {
    /// Publish the credential→tunnel mapping for an allocation
    pub fn put_auth(&self, username: &str, password: &str, tunnel_code: &str) {
        self.set(&auth_key(username, password), &tunnel_code.to_string(), None);
    }

    /// Resolve a credential pair to the owning tunnel code
    pub fn auth_tunnel(&self, username: &str, password: &str) -> Option<String> {
        self.get(&auth_key(username, password))
    }

    /// Drop the credential mapping; done when the allocation is removed
    pub fn remove_auth(&self, username: &str, password: &str) {
        self.delete(&auth_key(username, password));
    }
}
