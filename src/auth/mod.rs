//! Bearer token authentication against an external identity provider.
//!
//! Authentication runs as a router layer: it reads `Authorization: Bearer`,
//! validates the token against the configured authority and audience and
//! stores either the [`Identity`] or the [`AuthError`] in the request
//! extensions. Authorization happens per action through the [`RequireAuth`]
//! extractor, which turns a missing identity into a `401` challenge.

mod error;
mod keys;
mod middleware;
mod provider;

pub use error::AuthError;
pub use keys::{JwksKeys, SharedSecret, SigningKeys};
pub use middleware::{RequireAuth, authenticate, bearer_token};
pub use provider::{Claims, Identity, IdentityProvider, UserInfo};
