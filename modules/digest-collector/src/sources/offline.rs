//! Collaborators for runs with no detail-page access. Cards must carry
//! everything inline; anything else stays unresolved or unconfirmed.

use anyhow::Result;
use async_trait::async_trait;

use digest_common::{OriginalRef, RawCandidate};

use crate::traits::{DetailViewFetcher, OriginalResolver};

pub struct InlineOnly;

#[async_trait]
impl OriginalResolver for InlineOnly {
    async fn resolve_original(&self, _candidate: &RawCandidate) -> Result<Option<OriginalRef>> {
        Ok(None)
    }
}

pub struct NoDetailViews;

#[async_trait]
impl DetailViewFetcher for NoDetailViews {
    async fn fetch_detail_views(&self, _url: &str) -> Result<Option<String>> {
        Ok(None)
    }
}
