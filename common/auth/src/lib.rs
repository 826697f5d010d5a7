pub mod claims;
pub mod config;
pub mod error;
pub mod extractors;
pub mod guards;
pub mod roles;
pub mod verifier;

pub use claims::Claims;
pub use config::JwtConfig;
pub use error::{AuthError, AuthResult};
pub use extractors::BearerToken;
pub use guards::{ensure_admin, ensure_franchise_admin, ensure_self_or_admin, GuardError};
pub use roles::{Role, RoleAssignment};
pub use verifier::JwtVerifier;
