use url::Url;

/// Lowercased host of a URL, or `None` for host-less URLs
///
/// # Examples
///
/// ```
/// use url::Url;
/// use review_sweep::url::extract_domain;
///
/// let url = Url::parse("https://Forum.Gamer.com.tw/B.php?bsn=1").unwrap();
/// assert_eq!(extract_domain(&url), Some("forum.gamer.com.tw".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_review_site_hosts() {
        let url = Url::parse("https://www.taptap.cn/app/168332/review").unwrap();
        assert_eq!(extract_domain(&url), Some("www.taptap.cn".to_string()));

        let url = Url::parse("https://tieba.baidu.com/f?kw=game&ie=utf-8").unwrap();
        assert_eq!(extract_domain(&url), Some("tieba.baidu.com".to_string()));
    }

    #[test]
    fn test_extract_ignores_port_and_case() {
        let url = Url::parse("https://DISCORD.com:8443/channels/1/2").unwrap();
        assert_eq!(extract_domain(&url), Some("discord.com".to_string()));
    }

    #[test]
    fn test_extract_without_host() {
        let url = Url::parse("data:text/plain,hello").unwrap();
        assert_eq!(extract_domain(&url), None);
    }
}
