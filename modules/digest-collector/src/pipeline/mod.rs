//! The candidate-to-ranking pipeline: window check, classification,
//! collection control, aggregation, detail confirmation, filtering,
//! selection and assembly.

pub mod aggregate;
pub mod assembler;
pub mod classifier;
pub mod controller;
pub mod detail;
pub mod filters;
pub mod selector;
pub mod window;

pub use aggregate::Aggregator;
pub use assembler::assemble;
pub use classifier::{Classifier, Rejection};
pub use controller::{CollectionController, Pull};
pub use detail::{confirm_views, CachedDetailViews};
pub use filters::{exclude_published, TopicFilter};
pub use selector::select_top;
pub use window::{in_window, TimeWindow};
