//! DNS mnemonic tables used by the regex parser.
//!
//! Log sources write record types, classes and response codes either as
//! mnemonics (`AAAA`, `NOERROR`), as bare decimal (`28`, `0`), or in the
//! RFC 3597 `TYPE<n>` form. All three spellings resolve to the same
//! numeric value.

pub const TYPE_A: u32 = 1;
pub const TYPE_CNAME: u32 = 5;
pub const CLASS_IN: u32 = 1;

/// Resolve a record type spelling to its numeric value.
pub fn record_type_from_str(s: &str) -> Option<u32> {
    let value = match s {
        "A" => 1,
        "NS" => 2,
        "MD" => 3,
        "MF" => 4,
        "CNAME" => 5,
        "SOA" => 6,
        "MB" => 7,
        "MG" => 8,
        "MR" => 9,
        "NULL" => 10,
        "WKS" => 11,
        "PTR" => 12,
        "HINFO" => 13,
        "MINFO" => 14,
        "MX" => 15,
        "TXT" => 16,
        "RP" => 17,
        "AFSDB" => 18,
        "SIG" => 24,
        "KEY" => 25,
        "AAAA" => 28,
        "LOC" => 29,
        "SRV" => 33,
        "NAPTR" => 35,
        "KX" => 36,
        "CERT" => 37,
        "DNAME" => 39,
        "OPT" => 41,
        "APL" => 42,
        "DS" => 43,
        "SSHFP" => 44,
        "IPSECKEY" => 45,
        "RRSIG" => 46,
        "NSEC" => 47,
        "DNSKEY" => 48,
        "DHCID" => 49,
        "NSEC3" => 50,
        "NSEC3PARAM" => 51,
        "TLSA" => 52,
        "SMIMEA" => 53,
        "HIP" => 55,
        "CDS" => 59,
        "CDNSKEY" => 60,
        "OPENPGPKEY" => 61,
        "CSYNC" => 62,
        "ZONEMD" => 63,
        "SVCB" => 64,
        "HTTPS" => 65,
        "SPF" => 99,
        "EUI48" => 108,
        "EUI64" => 109,
        "TKEY" => 249,
        "TSIG" => 250,
        "IXFR" => 251,
        "AXFR" => 252,
        "MAILB" => 253,
        "MAILA" => 254,
        "ANY" => 255,
        "URI" => 256,
        "CAA" => 257,
        "DLV" => 32769,
        _ => return numeric_from_str(s, "TYPE"),
    };
    Some(value)
}

/// Resolve a DNS class spelling to its numeric value.
pub fn class_from_str(s: &str) -> Option<u32> {
    let value = match s {
        "IN" => 1,
        "CS" => 2,
        "CH" => 3,
        "HS" => 4,
        "NONE" => 254,
        "ANY" => 255,
        _ => return numeric_from_str(s, "CLASS"),
    };
    Some(value)
}

/// Resolve an rcode mnemonic or decimal spelling to its numeric value.
pub fn rcode_from_str(s: &str) -> Option<u32> {
    let value = match s {
        "NOERROR" => 0,
        "FORMERR" => 1,
        "SERVFAIL" => 2,
        "NXDOMAIN" => 3,
        "NOTIMP" | "NOTIMPL" => 4,
        "REFUSED" => 5,
        "YXDOMAIN" => 6,
        "YXRRSET" => 7,
        "NXRRSET" => 8,
        "NOTAUTH" => 9,
        "NOTZONE" => 10,
        "BADSIG" | "BADVERS" => 16,
        "BADKEY" => 17,
        "BADTIME" => 18,
        "BADMODE" => 19,
        "BADNAME" => 20,
        "BADALG" => 21,
        "BADTRUNC" => 22,
        "BADCOOKIE" => 23,
        _ => return numeric_from_str(s, ""),
    };
    Some(value)
}

/// Accept `1` or `TYPE1`-style spellings; values are bounded to u16 range.
fn numeric_from_str(s: &str, prefix: &str) -> Option<u32> {
    let digits = if !prefix.is_empty() && s.starts_with(prefix) {
        &s[prefix.len()..]
    } else {
        s
    };
    digits.parse::<u16>().ok().map(u32::from)
}
