//! Query-name decoding and normalization.

/// Decode a length-prefixed domain, e.g.
/// `(12)pull-flv-l29(9)douyincdn(3)com(6)ucloud(3)com(2)cn(0)` becomes
/// `pull-flv-l29.douyincdn.com.ucloud.com.cn`.
///
/// Each `(N)` marker separates labels; `(0)` terminates the name. The bare
/// root `(0)` decodes to `"."`. Input without markers passes through
/// unchanged, so applying the decode twice equals applying it once.
pub fn parse_domain_type1(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if c == '(' {
            let rest = &input[idx + 1..];
            if let Some(close) = rest.find(')') {
                if !rest[..close].is_empty() && rest[..close].bytes().all(|b| b.is_ascii_digit()) {
                    out.push('.');
                    while let Some((i, _)) = chars.peek() {
                        if *i > idx + close + 1 {
                            break;
                        }
                        chars.next();
                    }
                    continue;
                }
            }
        }
        out.push(c);
    }

    let trimmed = out.trim_matches('.');
    if trimmed.is_empty() {
        return ".".to_string();
    }
    trimmed.to_string()
}

/// Normalize a query name: lowercase, strip one trailing dot. The root
/// zone stays `"."`. Empty input stays empty so the parser can reject it.
pub fn normalize_qname(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    if name == "." {
        return ".".to_string();
    }
    let lowered = name.to_lowercase();
    let stripped = lowered.strip_suffix('.').unwrap_or(&lowered);
    if stripped.is_empty() {
        return ".".to_string();
    }
    stripped.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_domain_type1() {
        assert_eq!(
            parse_domain_type1("(12)pull-flv-l29(9)douyincdn(3)com(6)ucloud(3)com(2)cn(0)"),
            "pull-flv-l29.douyincdn.com.ucloud.com.cn"
        );
        assert_eq!(
            parse_domain_type1("(3)ecs(6)off2ce(14)trafficmanager(3)net(0)"),
            "ecs.off2ce.trafficmanager.net"
        );
    }

    #[test]
    fn test_parse_domain_type1_root() {
        assert_eq!(parse_domain_type1("(0)"), ".");
        assert_eq!(parse_domain_type1(""), ".");
    }

    #[test]
    fn test_parse_domain_type1_idempotent() {
        let once = parse_domain_type1("(3)d1v(7)ton-wei(3)com(0)");
        assert_eq!(parse_domain_type1(&once), once);
    }

    #[test]
    fn test_parse_domain_type1_passthrough() {
        assert_eq!(parse_domain_type1("www.example.com"), "www.example.com");
        // Parentheses without a numeric length are not markers
        assert_eq!(parse_domain_type1("(ab)cd"), "(ab)cd");
    }

    #[test]
    fn test_normalize_qname() {
        assert_eq!(normalize_qname("API.MiWiFi.com."), "api.miwifi.com");
        assert_eq!(normalize_qname("example.com"), "example.com");
        assert_eq!(normalize_qname("."), ".");
        assert_eq!(normalize_qname(""), "");
    }
}
