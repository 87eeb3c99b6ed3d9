pub mod event;
pub mod types;

pub use self::event::{DnsEvent, Rr};
