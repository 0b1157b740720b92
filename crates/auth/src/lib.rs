//! `stockroom-auth`: authentication/authorization boundary.
//!
//! Decoupled from HTTP and storage: token validation yields claims, and
//! claims are turned into a [`Principal`] that is checked against permissions.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod roles;

pub use authorize::{authorize, permissions_for_roles, AuthzError, Principal};
pub use claims::{validate_claims, JwtClaims, TokenValidationError};
pub use jwt::{Hs256JwtValidator, JwtError, JwtValidator};
pub use permissions::Permission;
pub use roles::Role;
