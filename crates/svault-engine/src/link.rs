//! Sink link expiry parsing.
//!
//! Providers embed the link deadline as a hexadecimal Unix-seconds value
//! in an `ex` query parameter; stored expiries are Unix milliseconds.

use url::Url;

/// Extract the expiry from a sink link. `None` when the link has no
/// parsable `ex` parameter.
pub(crate) fn parse_link_expiry(link: &str) -> Option<u64> {
    let url = Url::parse(link).ok()?;
    let ex = url
        .query_pairs()
        .find(|(key, _)| key == "ex")
        .map(|(_, value)| value.into_owned())?;
    let secs = u64::from_str_radix(&ex, 16).ok()?;
    Some(secs * 1000)
}
