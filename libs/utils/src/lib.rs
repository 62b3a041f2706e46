//! Small, dependency-light building blocks shared by every crate in the
//! workspace: opaque identifiers, durable-file helpers, and the tracing
//! setup every binary performs the same way.

pub mod fs_ext;
pub mod id;
pub mod logging;
