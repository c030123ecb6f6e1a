use std::sync::Arc;

use crate::handlers::{hash_from_bytes, HandlerError, HashHandler, HashRecord, Result};
use crate::registry::HandlerRegistry;

/// Stores the secret as-is; recognizes every string
#[derive(Debug)]
pub struct Plaintext;

impl HashHandler for Plaintext {
    fn name(&self) -> &str {
        "plaintext"
    }

    fn identify(&self, _: &str) -> bool {
        true
    }

    fn parse(&self, hash: &str) -> Result<HashRecord> {
        Ok(HashRecord {
            checksum: Some(hash.to_string()),
            ..Default::default()
        })
    }

    fn render(&self, record: &HashRecord) -> Result<String> {
        record
            .checksum
            .clone()
            .ok_or(HandlerError::MissingSetting("checksum"))
    }

    fn calc_checksum(&self, secret: &[u8], _: &HashRecord) -> Result<String> {
        hash_from_bytes(secret).map(str::to_string)
    }
}

pub fn plaintext(_: &HandlerRegistry) -> Result<Arc<dyn HashHandler>> {
    Ok(Arc::new(Plaintext))
}
