//! Mailbox access — a minimal blocking IMAP-over-TLS client.
//!
//! One connection per poll cycle: connect → LOGIN → SELECT INBOX →
//! SEARCH UNSEEN SUBJECT → FETCH each hit → STORE \Seen → LOGOUT. The
//! connection is never reused across cycles. Blocking by design; callers
//! run it under `tokio::task::spawn_blocking`.
//!
//! Messages are flagged `\Seen` in the same pass that fetches them,
//! before any parsing or persistence happens downstream. A failure later
//! in the pipeline therefore forfeits that message's analysis.

use std::io::{Read as _, Write as _};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use tracing::{debug, warn};

use crate::config::MailboxConfig;
use crate::error::MailError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);
const AUTH_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// One fetched, still-unparsed message.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// IMAP sequence number the message was fetched under.
    pub seq: String,
    /// Full RFC 822 message bytes.
    pub body: Vec<u8>,
}

/// Fetch every unseen message whose subject matches `target_subject`,
/// flagging each one `\Seen` before returning.
///
/// Zero matches is a normal outcome and returns an empty vec with no
/// side effects.
pub fn fetch_unseen_matching(
    config: &MailboxConfig,
    target_subject: &str,
) -> Result<Vec<RawMessage>, MailError> {
    let mut session = ImapSession::connect(config)?;
    session.login(config)?;
    session.select_inbox()?;

    let seqs = session.search_unseen(target_subject)?;
    if seqs.is_empty() {
        debug!("No unseen messages matching the target subject");
        session.logout();
        return Ok(Vec::new());
    }

    let mut messages = Vec::with_capacity(seqs.len());
    for seq in &seqs {
        match session.fetch(seq) {
            Ok(body) => messages.push(RawMessage {
                seq: seq.clone(),
                body,
            }),
            Err(e) => warn!(seq = %seq, "Fetch failed, skipping message: {e}"),
        }
        session.mark_seen(seq);
    }

    session.logout();
    Ok(messages)
}

/// A tagged-command IMAP session over rustls.
struct ImapSession {
    stream: rustls::StreamOwned<rustls::ClientConnection, TcpStream>,
    tag: u32,
}

impl ImapSession {
    /// Open the TCP + TLS connection and consume the server greeting.
    fn connect(config: &MailboxConfig) -> Result<Self, MailError> {
        let connect_err = |reason: String| MailError::Connect {
            host: config.host.clone(),
            port: config.port,
            reason,
        };

        let addrs = (config.host.as_str(), config.port)
            .to_socket_addrs()
            .map_err(|e| connect_err(format!("resolve: {e}")))?;

        let mut tcp = None;
        let mut last_err = "no addresses resolved".to_string();
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
                Ok(stream) => {
                    tcp = Some(stream);
                    break;
                }
                Err(e) => last_err = e.to_string(),
            }
        }
        let tcp = tcp.ok_or_else(|| connect_err(last_err))?;
        tcp.set_read_timeout(Some(READ_TIMEOUT))?;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );
        let server_name: rustls::pki_types::ServerName<'_> =
            rustls::pki_types::ServerName::try_from(config.host.clone())
                .map_err(|e| MailError::Tls(e.to_string()))?;
        let conn = rustls::ClientConnection::new(tls_config, server_name)
            .map_err(|e| MailError::Tls(e.to_string()))?;

        let mut session = Self {
            stream: rustls::StreamOwned::new(conn, tcp),
            tag: 0,
        };

        let greeting = session.read_line()?;
        debug!(greeting = %greeting.trim_end(), "IMAP connected");
        Ok(session)
    }

    /// Read one CRLF-terminated line.
    fn read_line(&mut self) -> Result<String, MailError> {
        let mut buf = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            match self.stream.read(&mut byte) {
                Ok(0) => {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "connection closed by server",
                    )
                    .into());
                }
                Ok(_) => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        return Ok(String::from_utf8_lossy(&buf).to_string());
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Send a tagged command and collect response lines up to the tag.
    fn command(&mut self, cmd: &str) -> Result<Vec<String>, MailError> {
        self.tag += 1;
        let tag = format!("A{}", self.tag);
        self.stream.write_all(format!("{tag} {cmd}\r\n").as_bytes())?;
        self.stream.flush()?;

        let mut lines = Vec::new();
        loop {
            let line = self.read_line()?;
            let done = line.starts_with(&tag);
            lines.push(line);
            if done {
                return Ok(lines);
            }
        }
    }

    fn login(&mut self, config: &MailboxConfig) -> Result<(), MailError> {
        // Tighter timeout while authenticating, then back to steady state.
        let _ = self.stream.sock.set_read_timeout(Some(AUTH_TIMEOUT));
        let resp = self.command(&format!(
            "LOGIN {} {}",
            quote(&config.user),
            quote(config.password.expose_secret()),
        ));
        let _ = self.stream.sock.set_read_timeout(Some(READ_TIMEOUT));

        let resp = resp?;
        if tagged_ok(&resp) {
            Ok(())
        } else {
            Err(MailError::Login {
                user: config.user.clone(),
            })
        }
    }

    /// Open INBOX read-write (SELECT, not EXAMINE — we flag messages).
    fn select_inbox(&mut self) -> Result<(), MailError> {
        let resp = self.command("SELECT \"INBOX\"")?;
        if tagged_ok(&resp) {
            Ok(())
        } else {
            Err(MailError::Inbox(last_line(&resp)))
        }
    }

    /// SEARCH UNSEEN SUBJECT "<target>" — returns matching sequence numbers.
    fn search_unseen(&mut self, subject: &str) -> Result<Vec<String>, MailError> {
        let resp = self.command(&format!("SEARCH UNSEEN SUBJECT {}", quote(subject)))?;
        if !tagged_ok(&resp) {
            return Err(MailError::Search(last_line(&resp)));
        }

        let mut seqs = Vec::new();
        for line in &resp {
            if line.starts_with("* SEARCH") {
                seqs.extend(
                    line.split_whitespace()
                        .skip(2)
                        .map(|s| s.trim().to_string()),
                );
            }
        }
        Ok(seqs)
    }

    /// FETCH one message's full RFC 822 text.
    fn fetch(&mut self, seq: &str) -> Result<Vec<u8>, MailError> {
        let resp = self
            .command(&format!("FETCH {seq} RFC822"))
            .map_err(|e| MailError::Fetch {
                uid: seq.to_string(),
                reason: e.to_string(),
            })?;
        if !tagged_ok(&resp) {
            return Err(MailError::Fetch {
                uid: seq.to_string(),
                reason: last_line(&resp),
            });
        }

        // Response shape: untagged "* n FETCH (RFC822 {size}" line, the
        // literal's lines, a lone ")" line, then the tagged OK.
        let mut body = String::new();
        for line in resp.iter().skip(1).take(resp.len().saturating_sub(2)) {
            body.push_str(line);
        }
        if let Some(stripped) = body.strip_suffix(")\r\n") {
            body.truncate(stripped.len());
        }
        Ok(body.into_bytes())
    }

    /// Flag a message `\Seen`. Failures are logged, not fatal — the next
    /// cycle would simply re-fetch the message.
    fn mark_seen(&mut self, seq: &str) {
        match self.command(&format!("STORE {seq} +FLAGS (\\Seen)")) {
            Ok(resp) if tagged_ok(&resp) => {}
            Ok(resp) => warn!(seq = %seq, "Failed to mark message seen: {}", last_line(&resp)),
            Err(e) => warn!(seq = %seq, "Failed to mark message seen: {e}"),
        }
    }

    fn logout(&mut self) {
        let _ = self.command("LOGOUT");
    }
}

/// Quote a string as an IMAP quoted-string.
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Did the tagged completion line report OK?
fn tagged_ok(lines: &[String]) -> bool {
    lines
        .last()
        .is_some_and(|line| line.split_whitespace().nth(1) == Some("OK"))
}

fn last_line(lines: &[String]) -> String {
    lines.last().map(|l| l.trim_end().to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_escapes_backslashes_and_quotes() {
        assert_eq!(quote("Probe-123"), "\"Probe-123\"");
        assert_eq!(quote("a\"b"), "\"a\\\"b\"");
        assert_eq!(quote("a\\b"), "\"a\\\\b\"");
    }

    #[test]
    fn tagged_ok_checks_completion_result() {
        let ok = vec!["* SEARCH 1 2\r\n".to_string(), "A3 OK done\r\n".to_string()];
        assert!(tagged_ok(&ok));

        let no = vec!["A3 NO [CANNOT] nope\r\n".to_string()];
        assert!(!tagged_ok(&no));

        let bad = vec!["A3 BAD parse\r\n".to_string()];
        assert!(!tagged_ok(&bad));
    }
}
