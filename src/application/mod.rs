//! Application layer: the four pipeline stages and the per-line state
//! machine that drives them. Stages take every input explicitly (line,
//! configuration snapshot, time) so decisions are reproducible.

pub mod gate;
pub mod pipeline;
pub mod recon;
pub mod retry;
pub mod router;
pub mod triage;
