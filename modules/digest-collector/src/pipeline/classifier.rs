use digest_common::{
    canonical_post_url, post_id, ClassifiedCandidate, EventKind, OriginalRef, RawCandidate,
    ViewCount,
};
use tracing::{debug, warn};

use crate::traits::OriginalResolver;

/// Why a candidate never reaches aggregation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("original of {kind} {url} could not be resolved")]
    UnresolvedOriginal { kind: EventKind, url: String },
}

/// Determines which original a candidate refers to and what views it
/// contributes to that original.
pub struct Classifier<'a> {
    resolver: &'a dyn OriginalResolver,
}

impl<'a> Classifier<'a> {
    pub fn new(resolver: &'a dyn OriginalResolver) -> Self {
        Self { resolver }
    }

    /// Posts are their own original. Reposts and quotes use the inline
    /// identity when the card carried one and fall back to the resolver
    /// otherwise. Views on a quote card are the quote's own, so a quote
    /// always contributes an unconfirmed count to its original.
    pub async fn classify(
        &self,
        mut raw: RawCandidate,
        in_window: bool,
    ) -> Result<ClassifiedCandidate, Rejection> {
        if let Some(url) = canonical_post_url(&raw.url) {
            raw.url = url;
        }

        let original = match raw.kind {
            EventKind::Post => OriginalRef {
                url: raw.url.clone(),
                id: raw.post_id.clone(),
            },
            EventKind::Repost | EventKind::Quote => {
                let found = match raw.original.clone() {
                    Some(inline) => Some(inline),
                    None => self.resolve(&raw).await,
                };
                match found.map(canonical_original) {
                    // A quote pointing at itself refers to nothing.
                    Some(original) if !(raw.kind == EventKind::Quote && original.url == raw.url) => {
                        original
                    }
                    _ => {
                        return Err(Rejection::UnresolvedOriginal {
                            kind: raw.kind,
                            url: raw.url,
                        })
                    }
                }
            }
        };

        let views = match raw.kind {
            EventKind::Post | EventKind::Repost => ViewCount::from_token(raw.views_text.as_deref()),
            EventKind::Quote => ViewCount::Unconfirmed,
        };
        if views == ViewCount::Unconfirmed && raw.kind != EventKind::Quote {
            if let Some(text) = raw.views_text.as_deref() {
                debug!(url = %raw.url, text, "Unparsable view count, leaving unconfirmed");
            }
        }

        Ok(ClassifiedCandidate {
            raw,
            original_url: original.url,
            original_id: original.id,
            views,
            in_window,
        })
    }

    async fn resolve(&self, raw: &RawCandidate) -> Option<OriginalRef> {
        match self.resolver.resolve_original(raw).await {
            Ok(found) => found,
            Err(e) => {
                warn!(url = %raw.url, error = %e, "Original lookup failed");
                None
            }
        }
    }
}

fn canonical_original(original: OriginalRef) -> OriginalRef {
    match canonical_post_url(&original.url) {
        Some(url) => {
            let id = post_id(&url)
                .map(str::to_string)
                .unwrap_or(original.id);
            OriginalRef { url, id }
        }
        None => original,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{post, quote, repost, status_url, MockResolver};

    #[tokio::test]
    async fn post_is_its_own_original() {
        let resolver = MockResolver::new();
        let classifier = Classifier::new(&resolver);
        let url = status_url("alice", 1);

        let c = classifier
            .classify(post(&url, 60, Some("1.2K")), true)
            .await
            .unwrap();

        assert_eq!(c.original_url, url);
        assert_eq!(c.original_id, "1");
        assert_eq!(c.views, ViewCount::Confirmed(1_200));
        assert_eq!(resolver.calls(), 0);
    }

    #[tokio::test]
    async fn repost_attributes_card_views_to_original() {
        let resolver = MockResolver::new();
        let classifier = Classifier::new(&resolver);
        let original = status_url("bob", 2);

        let c = classifier
            .classify(repost(&status_url("carol", 9), Some(&original), 30, Some("800")), true)
            .await
            .unwrap();

        assert_eq!(c.original_url, original);
        assert_eq!(c.original_id, "2");
        assert_eq!(c.views, ViewCount::Confirmed(800));
        assert_eq!(resolver.calls(), 0);
    }

    #[tokio::test]
    async fn quote_views_never_count_for_original() {
        let resolver = MockResolver::new();
        let classifier = Classifier::new(&resolver);

        let c = classifier
            .classify(
                quote(&status_url("dave", 5), Some(&status_url("alice", 1)), 10, Some("9M")),
                true,
            )
            .await
            .unwrap();

        assert_eq!(c.original_url, status_url("alice", 1));
        assert_eq!(c.views, ViewCount::Unconfirmed);
    }

    #[tokio::test]
    async fn missing_inline_identity_goes_to_resolver() {
        let quote_url = status_url("dave", 5);
        let resolver = MockResolver::new().resolves(&quote_url, &status_url("alice", 1));
        let classifier = Classifier::new(&resolver);

        let c = classifier
            .classify(quote(&quote_url, None, 10, None), true)
            .await
            .unwrap();

        assert_eq!(c.original_url, status_url("alice", 1));
        assert_eq!(resolver.calls(), 1);
    }

    #[tokio::test]
    async fn unresolvable_original_is_rejected() {
        let resolver = MockResolver::new();
        let classifier = Classifier::new(&resolver);

        let err = classifier
            .classify(repost(&status_url("carol", 9), None, 10, Some("5")), true)
            .await
            .unwrap_err();

        assert!(matches!(err, Rejection::UnresolvedOriginal { kind: EventKind::Repost, .. }));
    }

    #[tokio::test]
    async fn resolver_error_counts_as_unresolved() {
        let resolver = MockResolver::new().failing();
        let classifier = Classifier::new(&resolver);

        let result = classifier
            .classify(quote(&status_url("dave", 5), None, 10, None), true)
            .await;

        assert!(result.is_err());
        assert_eq!(resolver.calls(), 1);
    }

    #[tokio::test]
    async fn self_referencing_quote_is_rejected() {
        let resolver = MockResolver::new();
        let classifier = Classifier::new(&resolver);
        let url = status_url("dave", 5);

        let result = classifier.classify(quote(&url, Some(&url), 10, None), true).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn urls_are_canonicalized() {
        let resolver = MockResolver::new();
        let classifier = Classifier::new(&resolver);

        let c = classifier
            .classify(
                quote(
                    "https://twitter.com/Dave/status/5?s=20",
                    Some("https://mobile.twitter.com/Alice/status/1/photo/1"),
                    10,
                    None,
                ),
                true,
            )
            .await
            .unwrap();

        assert_eq!(c.raw.url, status_url("dave", 5));
        assert_eq!(c.original_url, status_url("alice", 1));
    }
}
