//! Port adapters. Only in-memory implementations live in the crate; real
//! collaborators (policy engine, evidence store, rails) are wired in by the
//! surrounding services.

pub mod in_memory;
