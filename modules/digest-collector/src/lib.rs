pub mod pipeline;
pub mod run;
pub mod sources;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use run::{DigestDeps, DigestRun, RunFailure};
