//! Domain model module declarations.
//!
//! Every record here is an immutable value built from wire bytes (or by the
//! host) and moved between layers by value.

pub mod icon;
pub mod protocol;
pub mod session;
pub mod transport;
