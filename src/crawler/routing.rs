//! Static routing of target URLs to site families
//!
//! Each configured URL is matched by host against a fixed table of
//! wildcard patterns. There is no content sniffing: a host that is not in
//! the table is unrouted and the target is skipped.

use crate::record::{SiteFamily, SourceTarget};
use crate::url::{extract_domain, matches_wildcard};
use crate::{Result, SweepError, UrlError};
use url::Url;

/// Host pattern → family; the first match wins
const ROUTES: &[(&str, SiteFamily)] = &[
    ("*.taptap.cn", SiteFamily::TapTapCn),
    ("*.taptap.io", SiteFamily::TapTapIntl),
    ("*.qoo-app.com", SiteFamily::QooApp),
    ("*.youtube.com", SiteFamily::YouTube),
    ("youtu.be", SiteFamily::YouTube),
    ("forum.gamer.com.tw", SiteFamily::Bahamut),
    ("tieba.baidu.com", SiteFamily::Tieba),
    ("discord.com", SiteFamily::Discord),
];

/// Family whose pattern matches the URL's host
pub fn route(url: &Url) -> Option<SiteFamily> {
    let host = extract_domain(url)?;
    ROUTES
        .iter()
        .find(|(pattern, _)| matches_wildcard(pattern, &host))
        .map(|(_, family)| *family)
}

/// Parses a configured target and binds it to its family and game
///
/// # Returns
///
/// * `Ok(SourceTarget)` - The URL is routable
/// * `Err(SweepError::Unrouted)` - No pattern matches the host
/// * `Err(SweepError)` - The URL does not parse, is not http(s) or has no host
pub fn route_target(raw: &str, game_id: &str) -> Result<SourceTarget> {
    let url = Url::parse(raw.trim())?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()).into());
    }
    if url.host_str().is_none() {
        return Err(UrlError::MissingHost(raw.to_string()).into());
    }

    let family = route(&url).ok_or_else(|| SweepError::Unrouted {
        url: raw.to_string(),
    })?;
    Ok(SourceTarget {
        url,
        family,
        game_id: game_id.to_string(),
    })
}

/// Whether a target passes an operator's `--source` filter
///
/// The filter matches a family's source name or one of its aliases, or
/// else any substring of the URL. Matching is case-insensitive.
pub fn matches_source_filter(filter: &str, family: Option<SiteFamily>, url: &str) -> bool {
    let filter = filter.trim().to_lowercase();
    if filter.is_empty() {
        return true;
    }
    if let Some(family) = family {
        if family.source_name() == filter || family.aliases().contains(&filter.as_str()) {
            return true;
        }
    }
    url.to_lowercase().contains(&filter)
}
