//! The in-memory representation of one AMI packet, and its wire codec.

use std::fmt;
use std::time::Instant;

use crate::client::ClientError;

/// One AMI packet: an ordered sequence of `Key: Value` pairs.
///
/// Order is preserved on both read and write — AMI is order-sensitive on the
/// wire for some fields, and preserving order keeps logs readable. Duplicate
/// keys are permitted; some AMI events repeat a key (e.g. multiple `Variable`
/// headers). Key lookups fold case; the bytes written to the wire never are.
///
/// `created_at` is excluded from equality and from the wire format — it only
/// tracks the moment this value was constructed, not anything the peer can
/// see. Two messages that carry the same fields in the same order are equal
/// regardless of when each was built, which is what the round-trip codec
/// property requires.
#[derive(Clone, Debug)]
pub struct Message {
    fields: Vec<(String, String)>,
    created_at: Instant,
}

impl Message {
    /// An empty message with no fields.
    pub fn new() -> Self {
        Message {
            fields: Vec::new(),
            created_at: Instant::now(),
        }
    }

    /// Builder-style field setter; see [`Message::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// The value of the first pair whose key matches case-insensitively.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Replaces the value of the first matching pair (case-insensitive), or
    /// appends a new pair if no key matches.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&key)) {
            Some(existing) => existing.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    /// The `ActionID` field, if present.
    pub fn action_id(&self) -> Option<&str> {
        self.get("ActionID")
    }

    /// The `Action` field, if present (outbound messages).
    pub fn action(&self) -> Option<&str> {
        self.get("Action")
    }

    /// All fields, in wire order.
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// When this value was constructed (not the time of any wire event).
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Encodes this message to its wire representation, including the
    /// trailing `CRLFCRLF` terminator. Fields are emitted in construction
    /// order.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64 * self.fields.len().max(1));
        for (key, value) in &self.fields {
            out.extend_from_slice(key.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");
        out
    }

    /// Decodes a single complete frame — header lines only, with no trailing
    /// blank line (the framer already stripped the `CRLFCRLF` boundary).
    ///
    /// Lines are split on `\n` and any trailing `\r` is stripped, so an
    /// all-LF frame decodes the same as a CRLF one. A non-empty line lacking
    /// a colon is `MalformedMessage`.
    pub fn decode(frame: &[u8]) -> Result<Self, ClientError> {
        let mut fields = Vec::new();
        for raw_line in frame.split(|&b| b == b'\n') {
            let line = strip_trailing_cr(raw_line);
            if line.is_empty() {
                continue;
            }
            let colon = line.iter().position(|&b| b == b':').ok_or_else(|| {
                ClientError::MalformedMessage(String::from_utf8_lossy(line).into_owned())
            })?;
            let key = String::from_utf8_lossy(&line[..colon]).trim().to_string();
            let value = String::from_utf8_lossy(&line[colon + 1..]).trim().to_string();
            fields.push((key, value));
        }
        Ok(Message {
            fields,
            created_at: Instant::now(),
        })
    }
}

impl Default for Message {
    fn default() -> Self {
        Message::new()
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Eq for Message {}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.fields {
            writeln!(f, "{key}: {value}")?;
        }
        Ok(())
    }
}

fn strip_trailing_cr(line: &[u8]) -> &[u8] {
    match line.split_last() {
        Some((b'\r', rest)) => rest,
        _ => line,
    }
}
