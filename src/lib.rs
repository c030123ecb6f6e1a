pub mod codec;
pub mod context;
pub mod handlers;
pub mod observability;
pub mod policy;
pub mod registry;
pub mod schemes;

pub use context::{ContextError, CryptContext};
pub use handlers::{HandlerError, HashHandler, Settings};
pub use policy::{Policy, PolicyError, PolicySource};
pub use registry::{HandlerRegistry, RegistryError};
