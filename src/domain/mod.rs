//! Domain types: the immutable transaction line, every decision record the
//! pipeline produces, and the collaborator ports.

pub mod decision;
pub mod line;
pub mod ports;
