//! The apply engine: executes a pending action list against the adapter
//! registry and publishes a typed `ApplyEvent` stream as it goes.
//!
//! Events flow forward only, from engine to subscriber; there is no
//! upstream signaling channel, since one apply run is a single pass over
//! an already-computed action list rather than an ongoing graph.

mod engine;

pub use engine::{ActionApplier, ApplyEngine, ApplyEvent};
