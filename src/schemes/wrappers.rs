//! Builtin schemes that reuse another scheme under a different prefix

use std::sync::Arc;

use crate::handlers::{HashHandler, PrefixWrapper, Result};
use crate::registry::HandlerRegistry;

pub fn ldap_hex_md5(registry: &HandlerRegistry) -> Result<Arc<dyn HashHandler>> {
    Ok(Arc::new(PrefixWrapper::lazy("ldap_hex_md5", "hex_md5", "{MD5}", "", registry)?))
}

pub fn ldap_hex_sha1(registry: &HandlerRegistry) -> Result<Arc<dyn HashHandler>> {
    Ok(Arc::new(PrefixWrapper::lazy("ldap_hex_sha1", "hex_sha1", "{SHA}", "", registry)?))
}

pub fn roundup_plaintext(registry: &HandlerRegistry) -> Result<Arc<dyn HashHandler>> {
    Ok(Arc::new(PrefixWrapper::lazy(
        "roundup_plaintext",
        "plaintext",
        "{plaintext}",
        "",
        registry,
    )?))
}
