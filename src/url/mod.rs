//! URL policy for site-gleaner
//!
//! Pure functions that decide what a crawl may touch: normalization into a
//! canonical form, validation, same-origin checks and non-content
//! classification. Nothing here performs I/O.

mod normalize;
mod policy;

pub use normalize::{is_valid_url, normalize_url, same_origin, try_normalize_url};
pub use policy::{is_non_content, is_non_content_url, NON_CONTENT_KEYWORDS};

/// Outcome of running a discovered link through the crawl filters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkVerdict {
    /// Link is in scope and may be admitted
    Accept(::url::Url),
    /// Link could not be normalized
    Invalid,
    /// Link points at another origin
    Foreign,
    /// Link carries a fragment
    Fragment,
    /// Link points at a non-content page
    NonContent,
}

/// Classifies a link found on a page hosted at `origin`
///
/// A link is accepted when it normalizes, shares the origin of the page it
/// was found on, carries no fragment and is not a non-content page. Visited
/// and duplicate checks are left to the session.
pub fn classify_link(link: &str, origin: &::url::Url) -> LinkVerdict {
    let Some(url) = normalize_url(link) else {
        return LinkVerdict::Invalid;
    };

    if !same_origin(&url, origin) {
        return LinkVerdict::Foreign;
    }

    if url.fragment().is_some() {
        return LinkVerdict::Fragment;
    }

    if is_non_content_url(&url) {
        return LinkVerdict::NonContent;
    }

    LinkVerdict::Accept(url)
}
