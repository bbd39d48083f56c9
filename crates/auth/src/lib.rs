//! `tillpoint-auth` — who may do what at the till.
//!
//! Pure: no HTTP, no storage. The API layer turns bearer tokens into a
//! [`Principal`] and asks [`authorize`] before dispatching anything.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod password;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod user;

pub use authorize::{AuthzError, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtIssuer, Hs256JwtValidator, JwtValidator};
pub use password::{PasswordError, check_strength, hash_password, temporary_password, verify_password};
pub use permissions::Permission;
pub use principal::Principal;
pub use roles::{Role, UnknownRole};
pub use user::{
    ChangePassword, DeleteUser, PasswordChanged, PasswordReset, RegisterUser, ResetPassword,
    SetUserActive, UpdateUser, User, UserActivated, UserCommand, UserDeactivated, UserDeleted,
    UserEvent, UserId, UserRegistered, UserUpdated, normalize_username,
};
