use serde::Serialize;

/// Normalized DNS record emitted by the pipeline.
///
/// Fields keep their zero value when the source message did not carry
/// them; `client_address` and `query_name` are validated to be non-empty
/// before an event leaves the parser.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DnsEvent {
    /// Source discriminator, fixed at 9 for syslog-fed events
    pub server_type: u32,
    /// Seconds since epoch; parsed from the message when possible,
    /// otherwise the arrival time
    pub t_now: u32,
    /// IPv4/IPv6 literal of the querying client
    pub client_address: String,
    pub client_port: u32,
    /// Address of the DNS server that logged the query
    pub server_address: String,
    pub server_port: u32,
    /// Lowercase FQDN with the trailing dot stripped; the root zone is "."
    pub query_name: String,
    pub query_class: u32,
    pub query_type: u32,
    pub rcode: u32,
    pub dns_message_id: u32,
    pub answer_rrs: Vec<Rr>,
}

/// A single answer resource record extracted from a response log line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rr {
    pub name: String,
    pub class: u32,
    pub rtype: u32,
    pub ttl: u32,
    pub rdata: Vec<u8>,
}
