//! Probe-email retrieval and analysis: mailbox access, message decoding,
//! receiving-chain extraction, and ESP classification.

pub mod esp;
pub mod headers;
pub mod imap;
pub mod parser;
pub mod poller;

pub use esp::classify;
pub use headers::HeaderMap;
pub use parser::{ParsedProbe, parse_message};
pub use poller::{poll_once, spawn_mail_poller};
