//! `Link` header parsing for paginated GitHub API responses.
//!
//! GitHub advertises further pages through a `Link` response header of the
//! form `<https://…?page=3&per_page=100>; rel="next", <…>; rel="last"`. The
//! header is present only while more pages exist, so an absent header (or an
//! absent `rel="next"` entry) marks the end of a listing.

use http::header::HeaderValue;
use url::Url;

/// Extracts the next page number from a raw `Link` header value.
///
/// Returns `None` when the header is missing, unparseable, or carries no
/// `rel="next"` entry.
#[must_use]
pub fn next_page(header: Option<&HeaderValue>) -> Option<u32> {
    let link = header?.to_str().ok()?;
    next_page_from_link(link)
}

/// Extracts the next page number from a `Link` header string.
#[must_use]
pub fn next_page_from_link(link: &str) -> Option<u32> {
    link.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        if !params.contains("rel=\"next\"") {
            return None;
        }

        let trimmed = target.trim().trim_start_matches('<').trim_end_matches('>');
        let url = Url::parse(trimmed).ok()?;
        url.query_pairs()
            .find(|(name, _)| name == "page")
            .and_then(|(_, value)| value.parse::<u32>().ok())
    })
}
