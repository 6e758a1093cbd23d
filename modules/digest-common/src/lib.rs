pub mod config;
pub mod error;
pub mod time;
pub mod types;
pub mod urls;
pub mod views;

pub use config::{AppConfig, RunConfig, TopicFilterConfig};
pub use error::DigestError;
pub use time::parse_display_time;
pub use types::*;
pub use urls::{canonical_post_url, post_id};
pub use views::{format_views, parse_views, UnparsableViews};
