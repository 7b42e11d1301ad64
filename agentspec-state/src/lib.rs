//! Desired-state diffing and the on-disk state backend.
//!
//! `diff` compares a lowered `Document` against persisted `StateEntry`
//! records; `backend` owns the atomic state file, its lock sibling, and
//! backup-based corruption recovery; `plan` renders a diff's action list in
//! the shapes the outer CLI/runtime collaborators expose to users.

pub mod backend;
pub mod diff;
pub mod plan;

pub use backend::*;
pub use diff::*;
pub use plan::*;
