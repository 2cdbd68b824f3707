//! Controller-level tests against mock engines.
//!
//! | Module | Covers |
//! |--------|--------|
//! | `lifecycle` | phase sequence, start failure, composite wait |
//! | `shutdown` | stop ordering, bounded wait, forced kill, exit codes |

pub mod shutdown;

pub use mocks::{EngineCall, MockEngine, RecordingReporter};
