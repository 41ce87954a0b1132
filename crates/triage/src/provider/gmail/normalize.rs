//! Gmail API response normalization
//!
//! Converts Gmail API thread payloads into the domain models the core
//! works with. The core never sees a Gmail payload.

use anyhow::Result;
use base64::prelude::*;
use chrono::{DateTime, TimeZone, Utc};
use log::warn;

use super::api::{GmailMessage, GmailThread, MessagePart, MessagePayload};
use crate::models::{EmailAddress, MailThread, MessageRecord, ThreadId};

/// Normalize a Gmail API thread into a [`MailThread`]
///
/// Messages arrive oldest-first from the API, which matches the
/// "first element opened the thread" contract.
pub fn normalize_thread(thread: GmailThread) -> Result<MailThread> {
    let id = ThreadId::new(&thread.id);
    let permalink = permalink_for(&thread.id);

    let messages = thread
        .messages
        .unwrap_or_default()
        .into_iter()
        .map(normalize_message)
        .collect();

    Ok(MailThread {
        id,
        permalink,
        messages,
    })
}

/// Stable reference URL for a thread, stored for audit only
fn permalink_for(thread_id: &str) -> String {
    format!("https://mail.google.com/mail/u/0/#all/{}", thread_id)
}

fn normalize_message(msg: GmailMessage) -> MessageRecord {
    let from = header_value(&msg, "From").unwrap_or_default();
    let reply_to = header_value(&msg, "Reply-To").unwrap_or_default();
    let to = header_value(&msg, "To")
        .map(|s| EmailAddress::parse_list(&s))
        .unwrap_or_default();
    let subject = header_value(&msg, "Subject").unwrap_or_default();

    let body = msg
        .payload
        .as_ref()
        .and_then(extract_plain_text_body)
        .or_else(|| msg.snippet.clone())
        .unwrap_or_else(|| {
            warn!("message {} has no readable body", msg.id);
            String::new()
        });

    MessageRecord {
        id: msg.id,
        from,
        reply_to,
        to,
        subject,
        body,
        date: parse_internal_date(&msg.internal_date),
    }
}

fn header_value(msg: &GmailMessage, name: &str) -> Option<String> {
    msg.payload.as_ref()?.headers.as_ref()?.iter().find_map(|h| {
        if h.name.eq_ignore_ascii_case(name) {
            Some(h.value.clone())
        } else {
            None
        }
    })
}

/// Gmail's internalDate is milliseconds since epoch, as a string
fn parse_internal_date(internal_date: &str) -> DateTime<Utc> {
    let millis: i64 = internal_date.parse().unwrap_or(0);
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Extract plain text body from a message payload
fn extract_plain_text_body(payload: &MessagePayload) -> Option<String> {
    // Simple message with inline body data
    if let Some(body) = &payload.body
        && let Some(data) = &body.data
        && payload
            .mime_type
            .as_ref()
            .is_some_and(|m| m.starts_with("text/plain"))
    {
        return decode_base64_body(data);
    }

    // Multipart: find the first text/plain part, recursively
    if let Some(parts) = &payload.parts
        && let Some(text) = find_plain_text_in_parts(parts)
    {
        return Some(text);
    }

    // Fall back to any inline content
    if let Some(body) = &payload.body
        && let Some(data) = &body.data
    {
        return decode_base64_body(data);
    }

    None
}

fn find_plain_text_in_parts(parts: &[MessagePart]) -> Option<String> {
    for part in parts {
        if part
            .mime_type
            .as_ref()
            .is_some_and(|m| m.starts_with("text/plain"))
            && let Some(body) = &part.body
            && let Some(data) = &body.data
            && let Some(text) = decode_base64_body(data)
        {
            return Some(text);
        }

        if let Some(nested) = &part.parts
            && let Some(text) = find_plain_text_in_parts(nested)
        {
            return Some(text);
        }
    }
    None
}

/// Decode base64-encoded body data
///
/// Gmail uses URL-safe base64 but padding varies, so several decoders
/// are tried in order.
fn decode_base64_body(data: &str) -> Option<String> {
    use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE};

    let decoders: &[&base64::engine::GeneralPurpose] =
        &[&BASE64_URL_SAFE_NO_PAD, &URL_SAFE, &STANDARD, &STANDARD_NO_PAD];

    for decoder in decoders {
        if let Ok(decoded) = decoder.decode(data)
            && let Ok(s) = String::from_utf8(decoded)
        {
            return Some(s);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::gmail::api::{Header, MessageBody};

    fn payload(headers: Vec<(&str, &str)>, body_data: Option<&str>) -> MessagePayload {
        MessagePayload {
            headers: Some(
                headers
                    .into_iter()
                    .map(|(n, v)| Header {
                        name: n.to_string(),
                        value: v.to_string(),
                    })
                    .collect(),
            ),
            body: Some(MessageBody {
                size: Some(0),
                data: body_data.map(str::to_string),
            }),
            parts: None,
            mime_type: Some("text/plain".to_string()),
        }
    }

    fn gmail_message(payload: MessagePayload) -> GmailMessage {
        GmailMessage {
            id: "msg_1".to_string(),
            thread_id: "thr_1".to_string(),
            snippet: Some("snippet text".to_string()),
            internal_date: "1731401723000".to_string(),
            payload: Some(payload),
        }
    }

    #[test]
    fn test_normalize_thread_headers_and_body() {
        // "Hello, World!" in base64url
        let msg = gmail_message(payload(
            vec![
                ("From", "John Doe <john@example.com>"),
                ("Reply-To", "jobs@example.com"),
                ("To", "me@owndomain.com"),
                ("Subject", "Role"),
            ],
            Some("SGVsbG8sIFdvcmxkIQ"),
        ));
        let thread = normalize_thread(GmailThread {
            id: "thr_1".to_string(),
            messages: Some(vec![msg]),
        })
        .unwrap();

        assert_eq!(thread.id, ThreadId::new("thr_1"));
        assert!(thread.permalink.contains("thr_1"));
        let first = thread.opening_message().unwrap();
        assert_eq!(first.from, "John Doe <john@example.com>");
        assert_eq!(first.reply_to, "jobs@example.com");
        assert_eq!(first.to[0].email, "me@owndomain.com");
        assert_eq!(first.body, "Hello, World!");
        assert_eq!(first.date.timestamp_millis(), 1731401723000);
    }

    #[test]
    fn test_missing_body_falls_back_to_snippet() {
        let msg = gmail_message(payload(vec![("From", "a@x.com")], None));
        let thread = normalize_thread(GmailThread {
            id: "t".to_string(),
            messages: Some(vec![msg]),
        })
        .unwrap();
        assert_eq!(thread.messages[0].body, "snippet text");
    }

    #[test]
    fn test_missing_reply_to_is_empty() {
        let msg = gmail_message(payload(vec![("From", "a@x.com")], None));
        let thread = normalize_thread(GmailThread {
            id: "t".to_string(),
            messages: Some(vec![msg]),
        })
        .unwrap();
        assert_eq!(thread.messages[0].reply_to, "");
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let msg = gmail_message(payload(vec![("FROM", "a@x.com")], None));
        assert_eq!(header_value(&msg, "from"), Some("a@x.com".to_string()));
    }

    #[test]
    fn test_decode_base64_body_padding_variants() {
        assert_eq!(
            decode_base64_body("SGVsbG8sIFdvcmxkIQ"),
            Some("Hello, World!".to_string())
        );
        assert_eq!(
            decode_base64_body("SGVsbG8sIFdvcmxkIQ=="),
            Some("Hello, World!".to_string())
        );
    }

    #[test]
    fn test_bad_internal_date_does_not_panic() {
        let date = parse_internal_date("not-a-number");
        assert_eq!(date.timestamp_millis(), 0);
    }
}
