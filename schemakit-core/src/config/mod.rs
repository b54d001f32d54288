//! Connection configuration.
//!
//! The core never reads configuration files; callers hand over already
//! resolved values through [`ConnectionConfig`].

mod connection;
mod credentials;

pub use connection::ConnectionConfig;
pub use credentials::Credentials;
