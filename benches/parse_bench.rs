use criterion::{Criterion, black_box, criterion_group, criterion_main};
use muninn::config::DEFAULT_BIND_REGEX;
use muninn::parse::Parser;
use muninn::parse::qname::parse_domain_type1;
use regex::Regex;

const BIND_QUERY_LINE: &str = "12-Sep-2025 17:03:56.635 queries: client @0x7f22f404b620 \
    223.2.43.8#23253 (api.miwifi.com): view ext2: query: api.miwifi.com IN AAAA + \
    (202.119.104.31)";

fn bench_bind_line(c: &mut Criterion) {
    let re = Regex::new(DEFAULT_BIND_REGEX).unwrap();
    let parser = Parser::new("Asia/Shanghai".parse().unwrap(), None);

    c.bench_function("parse bind query line", |b| {
        b.iter(|| {
            let event = parser
                .parse_regexp(&re, black_box(BIND_QUERY_LINE), 0)
                .unwrap();
            black_box(event);
        });
    });
}

fn bench_non_matching_line(c: &mut Criterion) {
    let re = Regex::new(DEFAULT_BIND_REGEX).unwrap();
    let parser = Parser::new("Asia/Shanghai".parse().unwrap(), None);
    let line = "kernel: usb 1-1: new high-speed USB device number 4 using xhci_hcd";

    c.bench_function("reject non-matching line", |b| {
        b.iter(|| {
            let result = parser.parse_regexp(&re, black_box(line), 0);
            black_box(result.is_err());
        });
    });
}

fn bench_length_prefixed_domain(c: &mut Criterion) {
    c.bench_function("decode length-prefixed domain", |b| {
        b.iter(|| {
            black_box(parse_domain_type1(black_box(
                "(12)pull-flv-l29(9)douyincdn(3)com(6)ucloud(3)com(2)cn(0)",
            )));
        });
    });
}

criterion_group!(
    benches,
    bench_bind_line,
    bench_non_matching_line,
    bench_length_prefixed_domain
);
criterion_main!(benches);
