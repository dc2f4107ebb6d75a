//! ESP classification — heuristic, best-effort matching over header text.
//!
//! Deterministic and total: the same headers always yield the same label,
//! and absence of any signal yields `"Unknown"` rather than an error.

use crate::mail::headers::HeaderMap;

/// Sentinel label when no rule matches.
pub const UNKNOWN_ESP: &str = "Unknown";

/// Headers whose first values form the classification signature text.
const SIGNATURE_HEADERS: &[&str] = &[
    "authentication-results",
    "received-spf",
    "return-path",
    "message-id",
    "x-original-sender",
    "x-sender",
];

/// One classification rule: needles searched in the signature text, plus
/// optional message-id domain suffixes.
struct EspRule {
    label: &'static str,
    needles: &'static [&'static str],
    message_id_suffixes: &'static [&'static str],
}

/// Rule order is a correctness-relevant tie-break: the first match wins,
/// so a message showing both Gmail and Outlook markers is Gmail.
static RULES: &[EspRule] = &[
    EspRule {
        label: "Gmail / Google Workspace",
        needles: &["google.com", "gmail.com", "googlemail.com"],
        message_id_suffixes: &["@gmail.com"],
    },
    EspRule {
        label: "Outlook / Office 365",
        needles: &[
            "outlook.com",
            "office365.com",
            "protection.outlook.com",
            "hotmail.com",
        ],
        message_id_suffixes: &["@outlook.com", "@hotmail.com"],
    },
    EspRule {
        label: "Amazon SES",
        needles: &["amazonses.com"],
        message_id_suffixes: &[],
    },
    EspRule {
        label: "Zoho Mail",
        needles: &["zoho.com"],
        message_id_suffixes: &[],
    },
    EspRule {
        label: "Mail.ru",
        needles: &["mail.ru"],
        message_id_suffixes: &[],
    },
    EspRule {
        label: "Yahoo Mail",
        needles: &["yahoo.com"],
        message_id_suffixes: &[],
    },
    EspRule {
        label: "SendGrid",
        needles: &["sendgrid.net"],
        message_id_suffixes: &[],
    },
    EspRule {
        label: "Mailgun",
        needles: &["mailgun.org"],
        message_id_suffixes: &[],
    },
];

/// Classify the originating ESP from a message's headers.
///
/// Authentication/sender headers are cheap and usually sufficient; when
/// they have been stripped, the relay hostnames in `Received` often still
/// leak the origin, so a narrower fallback scans those.
pub fn classify(headers: &HeaderMap) -> String {
    let signature = signature_text(headers);
    let message_id = headers
        .first("message-id")
        .map(|v| v.trim().trim_start_matches('<').trim_end_matches('>').to_lowercase())
        .unwrap_or_default();

    for rule in RULES {
        let needle_hit = rule.needles.iter().any(|n| signature.contains(n));
        let suffix_hit = rule
            .message_id_suffixes
            .iter()
            .any(|s| message_id.ends_with(s));
        if needle_hit || suffix_hit {
            return rule.label.to_string();
        }
    }

    // Fallback: relay hostnames in the Received trail.
    let received_text = headers.all("received").join(" ").to_lowercase();
    if received_text.contains("google.com") || received_text.contains("gmail.com") {
        return "Gmail / Google Workspace".to_string();
    }
    if received_text.contains("outlook.com") || received_text.contains("protection.outlook.com") {
        return "Outlook / Office 365".to_string();
    }

    UNKNOWN_ESP.to_string()
}

/// Lower-cased concatenation of the first values of the signature headers,
/// joined with single spaces. Missing headers contribute empty strings.
fn signature_text(headers: &HeaderMap) -> String {
    SIGNATURE_HEADERS
        .iter()
        .map(|name| headers.first(name).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
