//! Concrete collaborators: where cards come from and how originals and
//! detail views get looked up.

pub mod apify;
pub mod capture;
pub mod offline;

pub use apify::{ApifyDetailViews, ApifyResolver, ApifyTimelineFeed};
pub use capture::{CaptureFeed, CapturedCard};
pub use offline::{InlineOnly, NoDetailViews};
