//! Coordination primitives shared by the consumers.

pub mod shutdown;
