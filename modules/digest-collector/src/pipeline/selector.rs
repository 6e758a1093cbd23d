use digest_common::{OriginalRecord, RankedOriginal};

/// Top `n` originals by confirmed views.
///
/// Unconfirmed originals never rank. Order is views descending, then the
/// earliest in-window event, then URL, so equal inputs always produce the
/// same output.
pub fn select_top<'a>(
    records: impl IntoIterator<Item = &'a OriginalRecord>,
    n: usize,
) -> Vec<RankedOriginal> {
    let mut ranked: Vec<RankedOriginal> = records
        .into_iter()
        .filter_map(|record| {
            record.views.count().map(|views| RankedOriginal {
                url: record.url.clone(),
                views,
                first_seen: record.first_seen,
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.views
            .cmp(&a.views)
            .then_with(|| a.first_seen.cmp(&b.first_seen))
            .then_with(|| a.url.cmp(&b.url))
    });
    ranked.truncate(n);
    ranked
}
