use muninn::config::DEFAULT_BIND_REGEX;
use muninn::parse::Parser;
use muninn::parse::qname::{normalize_qname, parse_domain_type1};
use proptest::prelude::*;
use regex::Regex;

fn parser() -> Parser {
    Parser::new("Asia/Shanghai".parse().unwrap(), None)
}

proptest! {
    // Applying the length-prefix decode twice equals applying it once
    #[test]
    fn prop_parse_domain_type1_idempotent(input in ".{0,64}") {
        let once = parse_domain_type1(&input);
        prop_assert_eq!(parse_domain_type1(&once), once);
    }

    #[test]
    fn prop_normalize_qname_idempotent(
        name in "[A-Za-z0-9-]{1,10}(\\.[A-Za-z0-9-]{1,10}){0,3}\\.?",
    ) {
        let once = normalize_qname(&name);
        prop_assert_eq!(normalize_qname(&once), once.clone());
        // Normalized names never keep a trailing dot except the bare root
        prop_assert!(once == "." || !once.ends_with('.'));
    }

    // A synthetic BIND query line built from known values parses back to
    // exactly those values
    #[test]
    fn prop_bind_line_round_trip(
        a in 1u8..224, b in 0u8..=255, c in 0u8..=255, d in 1u8..255,
        port in 1u32..65536,
        name in "[a-z0-9]{1,12}(\\.[a-z0-9]{1,12}){1,3}",
    ) {
        let re = Regex::new(DEFAULT_BIND_REGEX).unwrap();
        let client = format!("{a}.{b}.{c}.{d}");
        let line = format!(
            "12-Sep-2025 17:03:56.635 queries: client @0x7f22f404b620 {client}#{port} \
             ({name}): view ext2: query: {name} IN AAAA + (202.119.104.31)"
        );

        let event = parser().parse_regexp(&re, &line, 0).unwrap();
        prop_assert_eq!(event.client_address, client);
        prop_assert_eq!(event.client_port, port);
        prop_assert_eq!(event.query_name, name);
        prop_assert_eq!(event.query_type, 28);
        prop_assert_eq!(event.server_address, "202.119.104.31");
    }
}
