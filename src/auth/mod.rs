//! Authentication module
//!
//! OAuth2 password-grant authentication against the Optiply token endpoint.
//!
//! - [`TokenStore`] holds the credentials and the current token and can mint a new one
//! - [`AuthSession`] shares a store across requests and refreshes it single-flight
//! - [`TokenSink`] persists refreshed tokens for reuse by later runs

mod session;
mod sink;
mod store;
mod types;

pub use session::{AuthSession, DEFAULT_SAFETY_MARGIN_SECS};
pub use sink::{ConfigFileTokenSink, TokenSink};
pub use store::TokenStore;
pub use types::{Credentials, PersistedToken, Token, PASSWORD_GRANT};
