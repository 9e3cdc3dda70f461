use url::Url;

/// Path keywords that mark a page as non-content (account, legal, commerce)
///
/// Hyphenated entries match a run of consecutive path tokens, so `sign-in`
/// matches `/sign-in` and `/user/sign-in-now` but not `/signing`.
pub const NON_CONTENT_KEYWORDS: &[&str] = &[
    "pricing",
    "price",
    "login",
    "signin",
    "sign-in",
    "signon",
    "sign-on",
    "register",
    "signup",
    "sign-up",
    "help",
    "support",
    "contact",
    "contactus",
    "contact-us",
    "about",
    "aboutus",
    "about-us",
    "terms",
    "privacy",
    "cart",
    "checkout",
    "account",
    "my-account",
    "faq",
    "careers",
];

/// Checks whether a URL points at a non-content page
///
/// The path is lowercased and split on `/` and `-`. A keyword matches only
/// when it equals a whole token (or, for hyphenated keywords, a run of
/// consecutive tokens). Substrings never match: `/signature-style` is content.
///
/// # Examples
///
/// ```
/// use site_gleaner::url::is_non_content_url;
/// use url::Url;
///
/// assert!(is_non_content_url(&Url::parse("https://x.com/login").unwrap()));
/// assert!(!is_non_content_url(&Url::parse("https://x.com/signature-style").unwrap()));
/// ```
pub fn is_non_content_url(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    let tokens: Vec<&str> = path
        .split(|c| c == '/' || c == '-')
        .filter(|t| !t.is_empty())
        .collect();

    NON_CONTENT_KEYWORDS.iter().any(|keyword| {
        let parts: Vec<&str> = keyword.split('-').collect();
        tokens.windows(parts.len()).any(|window| window == parts.as_slice())
    })
}

/// String form of [`is_non_content_url`]; unparsable input is not non-content
pub fn is_non_content(raw: &str) -> bool {
    Url::parse(raw)
        .map(|url| is_non_content_url(&url))
        .unwrap_or(false)
}
