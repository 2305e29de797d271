mod admin_auth;
mod salesperson_auth;

pub use admin_auth::*;
pub use salesperson_auth::*;
