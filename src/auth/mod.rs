/// Authentication module
///
/// Token signing and verification, credential hashing, refresh-slot fingerprints
/// and the token authority that ties them to the user directory.

mod authority;
mod claims;
mod jwt;
mod password;
mod refresh_token;

pub use authority::{Registration, Session, TokenAuthority, TokenPair};
pub use claims::{Claims, Identity, TokenKind};
pub use jwt::TokenSigner;
pub use password::{hash_password, verify_password};
pub use refresh_token::fingerprint;
