//! Caller-facing hashing context
//!
//! A [`CryptContext`] binds a [`Policy`] to a [`HandlerRegistry`]: it hashes
//! with the policy's default scheme, verifies hashes of any enabled scheme,
//! and reports hashes that should be re-hashed (deprecated scheme, or rounds
//! outside the policy bounds).
//!
//! ## Example
//!
//! ```rust
//! use passkit::context::CryptContext;
//! use passkit::policy::{Policy, PolicySource};
//!
//! let policy = Policy::from_source(PolicySource::Text(
//!     "[passlib]\n\
//!      schemes = pbkdf2_sha256, hex_md5\n\
//!      deprecated = hex_md5\n\
//!      pbkdf2_sha256.default_rounds = 1000\n"
//!         .to_string(),
//! ))
//! .unwrap();
//! let context = CryptContext::new(policy).unwrap();
//!
//! let hash = context.hash("secret", None, None).unwrap();
//! assert!(hash.starts_with("$pbkdf2-sha256$1000$"));
//! assert!(context.verify("secret", &hash, None).unwrap());
//! assert!(!context.needs_update(&hash, None).unwrap());
//!
//! let legacy = "5ebe2294ecd0e0f08eab7690d2a6ee69";
//! assert!(context.needs_update(legacy, None).unwrap());
//! ```

mod cache;

pub use cache::{ResolvedScheme, SchemeCache};

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::handlers::HandlerError;
use crate::observability::{Metrics, MetricsSnapshot};
use crate::policy::{EffectiveOptions, Policy, PolicyError, PolicySource};
use crate::registry::{HandlerRegistry, RegistryError};

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("no schemes configured")]
    NoSchemes,

    #[error("hash could not be identified")]
    UnknownHash,

    #[error("scheme {0:?} is not enabled by the policy")]
    UnknownScheme(String),

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

pub type Result<T> = std::result::Result<T, ContextError>;

/// Policy plus the resolutions computed from it
///
/// Swapped as a unit so a cache never outlives its policy.
#[derive(Debug)]
struct State {
    policy: Arc<Policy>,
    cache: SchemeCache,
}

impl State {
    fn new(policy: Policy) -> Arc<Self> {
        Arc::new(Self {
            policy: Arc::new(policy),
            cache: SchemeCache::default(),
        })
    }
}

pub struct CryptContext {
    registry: HandlerRegistry,
    state: RwLock<Arc<State>>,
    metrics: Metrics,
}

impl fmt::Debug for CryptContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptContext")
            .field("policy", &self.state.read().policy)
            .finish_non_exhaustive()
    }
}

impl CryptContext {
    /// Context over the process-wide registry
    pub fn new(policy: Policy) -> Result<Self> {
        Self::with_registry(HandlerRegistry::global().clone(), policy)
    }

    /// Context over `registry`; every scheme in the policy must resolve
    pub fn with_registry(registry: HandlerRegistry, policy: Policy) -> Result<Self> {
        check_schemes(&registry, &policy)?;
        Ok(Self {
            registry,
            state: RwLock::new(State::new(policy)),
            metrics: Metrics::new(),
        })
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn policy(&self) -> Arc<Policy> {
        Arc::clone(&self.state.read().policy)
    }

    /// Swap in a new policy, dropping cached resolutions
    pub fn set_policy(&self, policy: Policy) -> Result<()> {
        check_schemes(&self.registry, &policy)?;
        *self.state.write() = State::new(policy);
        tracing::info!("Context policy replaced");
        Ok(())
    }

    /// Overlay `source` on the current policy
    pub fn update(&self, source: PolicySource) -> Result<()> {
        let policy = self.policy().replace(source)?;
        self.set_policy(policy)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn state(&self) -> Arc<State> {
        Arc::clone(&self.state.read())
    }

    /// Scheme used for new hashes in `category`
    ///
    /// The category default, then the global default, then the first scheme.
    pub fn default_scheme(&self, category: Option<&str>) -> Result<String> {
        default_scheme(&self.state().policy, category).map(str::to_string)
    }

    fn resolve(&self, state: &State, scheme: &str, category: Option<&str>) -> Result<Arc<ResolvedScheme>> {
        if let Some(resolved) = state.cache.get(scheme, category) {
            self.metrics.cache_hit();
            return Ok(resolved);
        }
        self.metrics.cache_miss();

        let handler = self.registry.resolve(scheme)?;
        let options = state.policy.options(scheme, category);
        let resolved = ResolvedScheme {
            options: EffectiveOptions::resolve(handler.as_ref(), &options),
            deprecated: state.policy.handler_is_deprecated(scheme, category),
            handler,
        };
        tracing::debug!(scheme, category, "Resolved scheme options");
        Ok(state.cache.insert(scheme, category, resolved))
    }

    fn select(&self, state: &State, scheme: Option<&str>, category: Option<&str>) -> Result<Arc<ResolvedScheme>> {
        let scheme = match scheme {
            Some(scheme) if state.policy.schemes().iter().any(|s| s == scheme) => scheme,
            Some(scheme) => return Err(ContextError::UnknownScheme(scheme.to_string())),
            None => default_scheme(&state.policy, category)?,
        };
        self.resolve(state, scheme, category)
    }

    /// First scheme, in policy order, that recognizes `hash`
    fn identify_scheme(&self, state: &State, hash: &str, category: Option<&str>) -> Result<Option<Arc<ResolvedScheme>>> {
        if !state.policy.has_schemes() {
            return Err(ContextError::NoSchemes);
        }
        for scheme in state.policy.schemes() {
            let resolved = self.resolve(state, scheme, category)?;
            if resolved.handler.identify(hash) {
                return Ok(Some(resolved));
            }
        }
        Ok(None)
    }

    /// Hash `secret` with `scheme` (default: the category's default scheme)
    pub fn hash(&self, secret: impl AsRef<[u8]>, category: Option<&str>, scheme: Option<&str>) -> Result<String> {
        let state = self.state();
        let resolved = self.select(&state, scheme, category)?;
        let hash = resolved.handler.hash(secret.as_ref(), &resolved.options.settings())?;
        self.metrics.hashed();
        Ok(hash)
    }

    /// Config string for `scheme` with the policy's default settings
    pub fn genconfig(&self, category: Option<&str>, scheme: Option<&str>) -> Result<String> {
        let state = self.state();
        let resolved = self.select(&state, scheme, category)?;
        Ok(resolved.handler.genconfig(&resolved.options.config_settings())?)
    }

    /// Name of the enabled scheme that recognizes `hash`
    pub fn identify(&self, hash: &str, category: Option<&str>) -> Result<Option<String>> {
        let state = self.state();
        let resolved = self.identify_scheme(&state, hash, category)?;
        self.metrics.identified();
        Ok(resolved.map(|resolved| resolved.handler.name().to_string()))
    }

    pub fn verify(&self, secret: impl AsRef<[u8]>, hash: &str, category: Option<&str>) -> Result<bool> {
        let state = self.state();
        let resolved = self
            .identify_scheme(&state, hash, category)?
            .ok_or(ContextError::UnknownHash)?;
        let matched = resolved.handler.verify(secret.as_ref(), hash)?;
        self.metrics.verified(matched);
        Ok(matched)
    }

    /// Whether `hash` should be replaced by a fresh hash
    pub fn needs_update(&self, hash: &str, category: Option<&str>) -> Result<bool> {
        let state = self.state();
        let resolved = self
            .identify_scheme(&state, hash, category)?
            .ok_or(ContextError::UnknownHash)?;
        self.metrics.update_checked();
        outdated(&resolved, hash)
    }

    /// Verify, and re-hash with the current policy when the hash is outdated
    pub fn verify_and_update(
        &self,
        secret: impl AsRef<[u8]>,
        hash: &str,
        category: Option<&str>,
    ) -> Result<(bool, Option<String>)> {
        let secret = secret.as_ref();
        let state = self.state();
        let resolved = self
            .identify_scheme(&state, hash, category)?
            .ok_or(ContextError::UnknownHash)?;
        let matched = resolved.handler.verify(secret, hash)?;
        self.metrics.verified(matched);
        if !matched || !outdated(&resolved, hash)? {
            return Ok((matched, None));
        }

        let target = self.select(&state, None, category)?;
        let replacement = target.handler.hash(secret, &target.options.settings())?;
        self.metrics.hashed();
        tracing::debug!(from = resolved.handler.name(), to = target.handler.name(), "Re-hashed outdated hash");
        Ok((true, Some(replacement)))
    }
}

fn check_schemes(registry: &HandlerRegistry, policy: &Policy) -> Result<()> {
    for scheme in policy.schemes() {
        registry.resolve(scheme)?;
    }
    Ok(())
}

fn default_scheme<'a>(policy: &'a Policy, category: Option<&str>) -> Result<&'a str> {
    policy
        .default_scheme(category)
        .or_else(|| policy.schemes().first().map(String::as_str))
        .ok_or(ContextError::NoSchemes)
}

fn outdated(resolved: &ResolvedScheme, hash: &str) -> Result<bool> {
    if resolved.deprecated {
        return Ok(true);
    }
    let Some(window) = resolved.options.window else {
        return Ok(false);
    };
    let record = resolved.handler.parse(hash)?;
    Ok(record.rounds.is_some_and(|rounds| !window.accepts(rounds)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{HashHandler, PrefixWrapper, Settings};
    use crate::policy::PolicyValue;
    use std::collections::BTreeMap;

    fn policy(entries: &[(&str, &str)]) -> Policy {
        Policy::from_entries(entries.iter().map(|(k, v)| (*k, PolicyValue::from(*v)))).unwrap()
    }

    fn context(entries: &[(&str, &str)]) -> CryptContext {
        CryptContext::with_registry(HandlerRegistry::with_builtins(), policy(entries)).unwrap()
    }

    #[test]
    fn test_empty_policy_raises() {
        let ctx = context(&[]);
        assert!(matches!(ctx.hash("x", None, None), Err(ContextError::NoSchemes)));
        assert!(matches!(ctx.verify("x", "abc", None), Err(ContextError::NoSchemes)));
        assert!(matches!(ctx.needs_update("abc", None), Err(ContextError::NoSchemes)));
        assert!(matches!(ctx.identify("abc", None), Err(ContextError::NoSchemes)));
        assert!(matches!(ctx.default_scheme(None), Err(ContextError::NoSchemes)));
    }

    #[test]
    fn test_unknown_scheme_rejected() {
        let result = CryptContext::with_registry(
            HandlerRegistry::with_builtins(),
            policy(&[("schemes", "hex_md5, no_such_scheme")]),
        );
        assert!(matches!(result, Err(ContextError::Registry(RegistryError::UnknownHandler(_)))));

        let ctx = context(&[("schemes", "hex_md5")]);
        assert!(matches!(
            ctx.hash("x", None, Some("hex_sha1")),
            Err(ContextError::UnknownScheme(_))
        ));
    }

    #[test]
    fn test_default_scheme_resolution() {
        let ctx = context(&[
            ("schemes", "hex_sha1, hex_md5, phpass"),
            ("default", "hex_md5"),
            ("admin.context.default", "phpass"),
        ]);
        assert_eq!(ctx.default_scheme(None).unwrap(), "hex_md5");
        assert_eq!(ctx.default_scheme(Some("user")).unwrap(), "hex_md5");
        assert_eq!(ctx.default_scheme(Some("admin")).unwrap(), "phpass");

        let ctx = context(&[("schemes", "hex_sha1, hex_md5")]);
        assert_eq!(ctx.default_scheme(None).unwrap(), "hex_sha1");
        assert_eq!(
            ctx.hash("password", None, None).unwrap(),
            "5baa61e4c9b93f3f0682250b6cf8331b7ee68fd8"
        );
    }

    #[test]
    fn test_verify_identifies_in_policy_order() {
        let ctx = context(&[("schemes", "hex_md5, ldap_md5, plaintext")]);
        assert_eq!(
            ctx.identify("5f4dcc3b5aa765d61d8327deb882cf99", None).unwrap().as_deref(),
            Some("hex_md5")
        );
        assert_eq!(
            ctx.identify("{MD5}X03MO1qnZdYdgyfeuILPmQ==", None).unwrap().as_deref(),
            Some("ldap_md5")
        );
        assert_eq!(ctx.identify("password", None).unwrap().as_deref(), Some("plaintext"));

        assert!(ctx.verify("password", "5f4dcc3b5aa765d61d8327deb882cf99", None).unwrap());
        assert!(ctx.verify("password", "{MD5}X03MO1qnZdYdgyfeuILPmQ==", None).unwrap());
        assert!(ctx.verify("password", "password", None).unwrap());
        assert!(!ctx.verify("wrong", "password", None).unwrap());

        let ctx = context(&[("schemes", "hex_md5")]);
        assert!(matches!(ctx.verify("x", "$P$garbage", None), Err(ContextError::UnknownHash)));
        assert_eq!(ctx.identify("$P$garbage", None).unwrap(), None);
    }

    #[test]
    fn test_needs_update_rounds_bounds() {
        let ctx = context(&[
            ("schemes", "pbkdf2_sha256"),
            ("pbkdf2_sha256.min_rounds", "2000"),
            ("pbkdf2_sha256.max_rounds", "3000"),
            ("pbkdf2_sha256.default_rounds", "3000"),
        ]);
        let handler = ctx.registry().resolve("pbkdf2_sha256").unwrap();
        let hash_with = |rounds: u32| {
            handler
                .hash(b"password", &Settings::builder().rounds(rounds).salt("c2FsdA").build())
                .unwrap()
        };
        assert!(ctx.needs_update(&hash_with(1999), None).unwrap());
        assert!(!ctx.needs_update(&hash_with(2000), None).unwrap());
        assert!(!ctx.needs_update(&hash_with(3000), None).unwrap());
        assert!(ctx.needs_update(&hash_with(3001), None).unwrap());
    }

    #[test]
    fn test_needs_update_with_vary_rounds() {
        let ctx = context(&[
            ("schemes", "pbkdf2_sha256"),
            ("all.vary_rounds", "10%"),
            ("pbkdf2_sha256.min_rounds", "900"),
            ("pbkdf2_sha256.default_rounds", "1000"),
        ]);
        for _ in 0..10 {
            let hash = ctx.hash("password", None, None).unwrap();
            let rounds = ctx.registry().resolve("pbkdf2_sha256").unwrap().parse(&hash).unwrap().rounds;
            assert!(rounds.is_some_and(|r| (900..=1100).contains(&r)), "{hash}");
            assert!(!ctx.needs_update(&hash, None).unwrap());
        }
        let weak = ctx
            .registry()
            .resolve("pbkdf2_sha256")
            .unwrap()
            .hash(b"password", &Settings::builder().rounds(800).build())
            .unwrap();
        assert!(ctx.needs_update(&weak, None).unwrap());
    }

    #[test]
    fn test_needs_update_deprecated_per_category() {
        let ctx = context(&[
            ("schemes", "hex_sha1, hex_md5"),
            ("deprecated", "hex_md5"),
            ("admin.context.deprecated", "hex_md5, hex_sha1"),
        ]);
        let md5 = "5f4dcc3b5aa765d61d8327deb882cf99";
        let sha1 = "5baa61e4c9b93f3f0682250b6cf8331b7ee68fd8";
        assert!(ctx.needs_update(md5, None).unwrap());
        assert!(!ctx.needs_update(sha1, None).unwrap());
        assert!(ctx.needs_update(sha1, Some("admin")).unwrap());
    }

    #[test]
    fn test_verify_and_update() {
        let ctx = context(&[
            ("schemes", "phpass, hex_md5"),
            ("deprecated", "hex_md5"),
            ("phpass.default_rounds", "8"),
        ]);
        let legacy = "5f4dcc3b5aa765d61d8327deb882cf99";

        assert_eq!(ctx.verify_and_update("wrong", legacy, None).unwrap(), (false, None));

        let (ok, replacement) = ctx.verify_and_update("password", legacy, None).unwrap();
        assert!(ok);
        let replacement = replacement.unwrap();
        assert!(replacement.starts_with("$P$6"));
        assert!(ctx.verify("password", &replacement, None).unwrap());

        assert_eq!(ctx.verify_and_update("password", &replacement, None).unwrap(), (true, None));
    }

    #[test]
    fn test_policy_options_reach_handler() {
        let ctx = context(&[
            ("schemes", "phpass"),
            ("phpass.ident", "H"),
            ("phpass.default_rounds", "7"),
            ("admin.phpass.default_rounds", "9"),
        ]);
        assert!(ctx.hash("x", None, None).unwrap().starts_with("$H$5"));
        assert!(ctx.hash("x", Some("admin"), None).unwrap().starts_with("$H$7"));
        let config = ctx.genconfig(None, None).unwrap();
        assert!(config.starts_with("$H$5"));
        assert!(config.ends_with(&".".repeat(22)));
    }

    #[test]
    fn test_set_policy_clears_cache() {
        let ctx = context(&[("schemes", "hex_md5, hex_sha1")]);
        ctx.hash("x", None, None).unwrap();
        ctx.hash("x", None, None).unwrap();
        let metrics = ctx.metrics();
        assert_eq!((metrics.cache_misses, metrics.cache_hits), (1, 1));
        assert_eq!(metrics.hashes, 2);

        ctx.update(PolicySource::Map(BTreeMap::from([(
            "default".to_string(),
            PolicyValue::from("hex_sha1"),
        )])))
        .unwrap();
        assert_eq!(ctx.policy().default_scheme(None), Some("hex_sha1"));
        assert_eq!(ctx.hash("password", None, None).unwrap().len(), 40);
        assert_eq!(ctx.metrics().cache_misses, 2);

        let bad = ctx.update(PolicySource::Map(BTreeMap::from([(
            "deprecated".to_string(),
            PolicyValue::from("hex_sha256"),
        )])));
        assert!(matches!(
            bad,
            Err(ContextError::Policy(PolicyError::UnknownScheme { kind: "deprecated", .. }))
        ));
        assert_eq!(ctx.policy().default_scheme(None), Some("hex_sha1"));
        assert!(!ctx.policy().handler_is_deprecated("hex_sha1", None));
    }

    #[test]
    fn test_deprecated_default_scheme() {
        let ctx = context(&[
            ("schemes", "hex_md5, hex_sha1"),
            ("default", "hex_md5"),
            ("deprecated", "hex_md5"),
        ]);
        let hash = ctx.hash("password", None, None).unwrap();
        assert_eq!(hash, "5f4dcc3b5aa765d61d8327deb882cf99");
        assert!(ctx.needs_update(&hash, None).unwrap());
        assert!(!ctx.needs_update("5baa61e4c9b93f3f0682250b6cf8331b7ee68fd8", None).unwrap());

        ctx.update(PolicySource::Map(BTreeMap::from([(
            "default".to_string(),
            PolicyValue::from("hex_sha1"),
        )])))
        .unwrap();
        let (matched, replacement) = ctx.verify_and_update("password", &hash, None).unwrap();
        assert!(matched);
        assert_eq!(replacement.as_deref(), Some("5baa61e4c9b93f3f0682250b6cf8331b7ee68fd8"));
    }

    #[test]
    fn test_wrapped_rounds_scheme() {
        let registry = HandlerRegistry::with_builtins();
        let wrapper =
            PrefixWrapper::lazy("ldap_phpass", "phpass", "{PHPASS}", "$P$", &registry).unwrap();
        registry.register(Arc::new(wrapper), false).unwrap();
        let ctx = CryptContext::with_registry(
            registry,
            policy(&[
                ("schemes", "ldap_phpass"),
                ("ldap_phpass.min_rounds", "8"),
                ("ldap_phpass.default_rounds", "8"),
            ]),
        )
        .unwrap();

        let hash = ctx.hash("password", None, None).unwrap();
        assert!(hash.starts_with("{PHPASS}6"));
        assert!(ctx.verify("password", &hash, None).unwrap());
        assert!(!ctx.needs_update(&hash, None).unwrap());
        assert!(ctx.needs_update("{PHPASS}5IQRaTwmfeRo7ud9Fh4E2PdI0S3r.L0", None).unwrap());
    }
}
