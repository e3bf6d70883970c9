pub mod authenticator;
pub mod factory;
pub mod identity;
pub mod policy;
pub mod revocation;
pub mod token;

pub use authenticator::{AuthOutcome, Authenticator, RevocationCheck};
pub use factory::build_authenticator;
pub use identity::Identity;
pub use policy::{AccessPolicy, PermissionRequirement, RoleRequirement};
pub use revocation::{CacheRevocationStore, RevocationStore};
pub use token::TokenVerifier;
