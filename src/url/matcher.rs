/// Checks a host against a routing pattern
///
/// `"*.example.com"` matches `example.com` and any subdomain of it; any
/// other pattern must equal the host exactly. Hosts are expected lowercase.
///
/// # Examples
///
/// ```
/// use review_sweep::url::matches_wildcard;
///
/// assert!(matches_wildcard("*.taptap.cn", "www.taptap.cn"));
/// assert!(matches_wildcard("*.taptap.cn", "taptap.cn"));
/// assert!(!matches_wildcard("*.taptap.cn", "taptap.io"));
/// assert!(matches_wildcard("discord.com", "discord.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            candidate == base
                || candidate
                    .strip_suffix(base)
                    .is_some_and(|head| head.ends_with('.'))
        }
        None => candidate == pattern,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_pattern() {
        assert!(matches_wildcard("tieba.baidu.com", "tieba.baidu.com"));
        assert!(!matches_wildcard("tieba.baidu.com", "www.baidu.com"));
        assert!(!matches_wildcard("discord.com", "ptb.discord.com"));
    }

    #[test]
    fn test_wildcard_covers_bare_and_nested_hosts() {
        assert!(matches_wildcard("*.gamer.com.tw", "gamer.com.tw"));
        assert!(matches_wildcard("*.gamer.com.tw", "forum.gamer.com.tw"));
        assert!(matches_wildcard("*.gamer.com.tw", "m.forum.gamer.com.tw"));
    }

    #[test]
    fn test_wildcard_rejects_lookalikes() {
        assert!(!matches_wildcard("*.taptap.cn", "nottaptap.cn"));
        assert!(!matches_wildcard("*.taptap.cn", "taptap.cn.evil.com"));
        assert!(!matches_wildcard("*.youtube.com", "youtube.co"));
    }

    #[test]
    fn test_case_sensitive() {
        assert!(!matches_wildcard("discord.com", "Discord.com"));
    }
}
