//! Host-runtime abstractions: the inbound event and the reply / suppress primitives.

pub mod port;
pub mod types;
