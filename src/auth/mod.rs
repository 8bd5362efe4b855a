//! Authentication: credentials, API tokens and the request guard

pub mod credentials;
pub mod middleware;
pub mod token;

pub use credentials::{
    CredentialStore, DirectoryCredentials, Identity, NoCredentialStore, hash_password,
    verify_password,
};
pub use middleware::{CurrentIdentity, extract_api_key, require_api_key};
pub use token::{InMemoryTokenStore, IssuedToken, TokenService, TokenStore, generate_secret};
