//! Line framing decoder for the push stream.
//!
//! The push endpoint speaks a `text/event-stream`-like framing. Only the
//! `event:` and `data:` fields are understood; everything else is skipped.
//!
//! Each chunk is decoded on its own. There is no buffer carried between
//! chunks, so a record whose lines are split across two network reads is not
//! reassembled: the first half is dropped when it lacks an `event:` line, and
//! the second half may be published with partial data.

use std::borrow::Cow;

/// One decoded `(event, data)` unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub event: String,
    pub data: String,
}

/// Decode one received chunk into at most one [`Record`].
///
/// Within the chunk the last `event:` line and the last `data:` line win. A
/// chunk without any `event:` line yields `None`; `data` defaults to an empty
/// string when no `data:` line is present. Malformed lines never fail the
/// decode.
pub fn decode(chunk: &[u8]) -> Option<Record> {
    let text: Cow<'_, str> = String::from_utf8_lossy(chunk);

    let mut event: Option<&str> = None;
    let mut data: Option<&str> = None;

    for line in text.split(['\r', '\n']).filter(|line| !line.is_empty()) {
        let Some((field, value)) = split_field(line) else {
            continue;
        };

        match field {
            "event" => event = Some(value),
            "data" => data = Some(value),
            _ => {}
        }
    }

    let event = event?;
    Some(Record {
        event: event.to_owned(),
        data: data.unwrap_or_default().to_owned(),
    })
}

/// Split a line on its first colon. Lines with no colon, or with an empty
/// field name, are not fields.
fn split_field(line: &str) -> Option<(&str, &str)> {
    match line.split_once(':') {
        Some((field, value)) if !field.is_empty() => Some((field, value.trim())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(event: &str, data: &str) -> Record {
        Record {
            event: event.to_owned(),
            data: data.to_owned(),
        }
    }

    #[test]
    fn decodes_event_and_data() {
        assert_eq!(
            decode(b"event:status_changed\r\ndata:2\r\n"),
            Some(record("status_changed", "2"))
        );
    }

    #[test]
    fn chunks_without_colons_decode_to_nothing() {
        assert_eq!(decode(b""), None);
        assert_eq!(decode(b"\r\n\r\n"), None);
        assert_eq!(decode(b"hello\nworld\r\nstatus_changed 2\n"), None);
    }

    #[test]
    fn last_data_line_wins() {
        assert_eq!(
            decode(b"data: 1\nevent: status_changed\ndata: 0\n\n"),
            Some(record("status_changed", "0"))
        );
    }

    #[test]
    fn last_event_line_wins() {
        assert_eq!(
            decode(b"event: first\ndata: x\nevent: second\n"),
            Some(record("second", "x"))
        );
    }

    #[test]
    fn data_without_event_is_discarded() {
        assert_eq!(decode(b"data: 2\n\n"), None);
    }

    #[test]
    fn event_without_data_has_empty_data() {
        assert_eq!(decode(b"event: status_changed\n"), Some(record("status_changed", "")));
    }

    #[test]
    fn leading_colon_lines_are_ignored() {
        // Keep-alive comments from the server look like `:ok`.
        assert_eq!(decode(b":ok\n\n"), None);
        assert_eq!(
            decode(b":event: fake\nevent: real\n"),
            Some(record("real", ""))
        );
    }

    #[test]
    fn value_keeps_text_after_first_colon_and_is_trimmed() {
        let chunk = b"event:  status_changed  \r\ndata: {\"data\":\"1\",\"published_at\":\"2024-01-01T00:00:00Z\"}\r\n";
        assert_eq!(
            decode(chunk),
            Some(record(
                "status_changed",
                "{\"data\":\"1\",\"published_at\":\"2024-01-01T00:00:00Z\"}"
            ))
        );
    }

    #[test]
    fn unknown_fields_are_ignored() {
        assert_eq!(
            decode(b"id: 7\nretry: 1000\nevent: status_changed\ndata: 1\n"),
            Some(record("status_changed", "1"))
        );
    }

    #[test]
    fn mixed_line_endings_split_lines() {
        assert_eq!(
            decode(b"event: a\r\r\ndata: b\n\r"),
            Some(record("a", "b"))
        );
    }

    #[test]
    fn invalid_utf8_is_replaced_not_rejected() {
        let decoded = decode(b"event: status_changed\ndata: \xff1\n").unwrap();
        assert_eq!(decoded.event, "status_changed");
        assert_eq!(decoded.data, "\u{fffd}1");
    }

    #[test]
    fn record_split_across_chunks_is_not_reassembled() {
        assert_eq!(decode(b"data: 2\n"), None);
        assert_eq!(decode(b"event: status_changed\n"), Some(record("status_changed", "")));
    }
}
