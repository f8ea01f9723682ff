//! Identifier checks applied at the boundary before the state is touched.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Length of a WireGuard public key in bytes.
pub const KEY_LEN: usize = 32;

/// Cluster ids are UUIDs.
pub fn cluster_id(id: &str) -> Result<()> {
    Uuid::parse_str(id)
        .map(|_| ())
        .map_err(|e| Error::InvalidClusterId(e.to_string()))
}

/// Affiliate ids are base64-encoded WireGuard public keys.
pub fn affiliate_id(id: &str) -> Result<()> {
    let key = STANDARD
        .decode(id)
        .map_err(|e| Error::InvalidAffiliateId(e.to_string()))?;

    if key.len() != KEY_LEN {
        return Err(Error::InvalidAffiliateId(format!(
            "expected {KEY_LEN} bytes, got {}",
            key.len()
        )));
    }

    Ok(())
}
