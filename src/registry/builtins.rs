use super::ModuleTable;
use crate::schemes::{digests, misc, pbkdf2, phpass, wrappers};

const DIGESTS: &str = "passkit.schemes.digests";
const MISC: &str = "passkit.schemes.misc";
const PHPASS: &str = "passkit.schemes.phpass";
const PBKDF2: &str = "passkit.schemes.pbkdf2";
const WRAPPERS: &str = "passkit.schemes.wrappers";

/// Lazy registrations installed by `HandlerRegistry::with_builtins`
pub(super) const BUILTIN_LOCATIONS: &[(&str, &str)] = &[
    ("hex_md5", DIGESTS),
    ("hex_sha1", DIGESTS),
    ("hex_sha256", DIGESTS),
    ("hex_sha512", DIGESTS),
    ("ldap_md5", DIGESTS),
    ("ldap_sha1", DIGESTS),
    ("plaintext", MISC),
    ("phpass", PHPASS),
    ("pbkdf2_sha256", PBKDF2),
    ("ldap_hex_md5", WRAPPERS),
    ("ldap_hex_sha1", WRAPPERS),
    ("roundup_plaintext", WRAPPERS),
];

pub(super) fn module_table() -> ModuleTable {
    ModuleTable::new()
        .with(DIGESTS, "hex_md5", digests::hex_md5)
        .with(DIGESTS, "hex_sha1", digests::hex_sha1)
        .with(DIGESTS, "hex_sha256", digests::hex_sha256)
        .with(DIGESTS, "hex_sha512", digests::hex_sha512)
        .with(DIGESTS, "ldap_md5", digests::ldap_md5)
        .with(DIGESTS, "ldap_sha1", digests::ldap_sha1)
        .with(MISC, "plaintext", misc::plaintext)
        .with(PHPASS, "phpass", phpass::phpass)
        .with(PBKDF2, "pbkdf2_sha256", pbkdf2::pbkdf2_sha256)
        .with(WRAPPERS, "ldap_hex_md5", wrappers::ldap_hex_md5)
        .with(WRAPPERS, "ldap_hex_sha1", wrappers::ldap_hex_sha1)
        .with(WRAPPERS, "roundup_plaintext", wrappers::roundup_plaintext)
}
