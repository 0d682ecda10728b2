//! Portable graph IR and the backend contract that executes it.
//!
//! The symbolic depth-to-space path lowers into this IR; any [`spec::PortableBackend`] can then
//! run the exported program without knowing how the node was produced.

pub mod spec;
