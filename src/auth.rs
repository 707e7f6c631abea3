//! Dashboard authentication
//!
//! The dashboard is protected by a single shared token: `/set-auth-cookie/`
//! exchanges it for a signed JWT carried in a cookie. When no token is
//! configured the middleware lets everything through (development mode).

mod middleware;
mod token;

pub use middleware::auth_middleware;
pub use token::{create_session_token, decode_session_token, Claims};
