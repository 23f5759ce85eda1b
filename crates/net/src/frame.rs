//! STOMP 1.2 frame encoding/decoding
//!
//! Wire format: `COMMAND\nheader:value\n...\n\nbody\0`, one frame per
//! WebSocket text message. A message holding only EOLs is a heart-beat.
//! Maximum frame size: 1MB (sanity limit)

use crate::error::{Error, Result};

/// Maximum allowed frame size (1MB)
const MAX_FRAME_SIZE: usize = 1024 * 1024;

pub const ACCEPT_VERSION: &str = "1.2";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Connected,
    Subscribe,
    Unsubscribe,
    Send,
    Message,
    Receipt,
    Error,
    Disconnect,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Connected => "CONNECTED",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Send => "SEND",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
            Command::Disconnect => "DISCONNECT",
        }
    }

    fn parse(s: &str) -> Result<Self> {
        Ok(match s {
            "CONNECT" | "STOMP" => Command::Connect,
            "CONNECTED" => Command::Connected,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "SEND" => Command::Send,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            "DISCONNECT" => Command::Disconnect,
            other => return Err(Error::Protocol(format!("Unknown command: {:?}", other))),
        })
    }

    /// CONNECT and CONNECTED headers are never escaped
    fn escapes_headers(&self) -> bool {
        !matches!(self, Command::Connect | Command::Connected)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Header lookup; the first occurrence wins
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn connect(host: &str) -> Self {
        Frame::new(Command::Connect)
            .header("accept-version", ACCEPT_VERSION)
            .header("host", host)
            .header("heart-beat", "0,0")
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new(Command::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    pub fn unsubscribe(id: &str) -> Self {
        Frame::new(Command::Unsubscribe).header("id", id)
    }

    pub fn send_json(destination: &str, body: String) -> Self {
        Frame::new(Command::Send)
            .header("destination", destination)
            .header("content-type", "application/json")
            .with_body(body)
    }

    pub fn disconnect(receipt: &str) -> Self {
        Frame::new(Command::Disconnect).header("receipt", receipt)
    }

    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        if !self.body.is_empty() && self.get("content-length").is_none() {
            out.push_str(&format!("content-length:{}\n", self.body.len()));
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Decode one frame. `Ok(None)` is a heart-beat.
    pub fn decode(text: &str) -> Result<Option<Frame>> {
        if text.len() > MAX_FRAME_SIZE {
            return Err(Error::Protocol(format!(
                "Frame too large: {} bytes (max {})",
                text.len(),
                MAX_FRAME_SIZE
            )));
        }

        let text = text.trim_start_matches(['\n', '\r']);
        if text.is_empty() {
            return Ok(None);
        }

        let mut lines = Vec::new();
        let mut offset = 0;
        loop {
            let Some(nl) = text[offset..].find('\n') else {
                return Err(Error::Protocol("Unterminated header block".into()));
            };
            let line = text[offset..offset + nl].trim_end_matches('\r');
            offset += nl + 1;
            if line.is_empty() {
                break;
            }
            lines.push(line);
        }

        let command = Command::parse(lines[0])?;
        let escaped = command.escapes_headers();
        let mut headers = Vec::with_capacity(lines.len() - 1);
        for line in &lines[1..] {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| Error::Protocol(format!("Malformed header: {:?}", line)))?;
            if escaped {
                headers.push((unescape_header(name)?, unescape_header(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let rest = &text[offset..];
        let content_length = headers
            .iter()
            .find(|(k, _)| k == "content-length")
            .map(|(_, v)| {
                v.parse::<usize>()
                    .map_err(|_| Error::Protocol(format!("Bad content-length: {:?}", v)))
            })
            .transpose()?;

        let body = match content_length {
            Some(len) => {
                let body = rest
                    .get(..len)
                    .ok_or_else(|| Error::Protocol("Body shorter than content-length".into()))?;
                if !rest[len..].starts_with('\0') {
                    return Err(Error::Protocol("Missing frame terminator".into()));
                }
                body
            }
            None => {
                let end = rest
                    .find('\0')
                    .ok_or_else(|| Error::Protocol("Missing frame terminator".into()))?;
                &rest[..end]
            }
        };

        Ok(Some(Frame {
            command,
            headers,
            body: body.to_string(),
        }))
    }
}

fn escape_header(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_header(s: &str) -> Result<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(Error::Protocol(format!(
                    "Invalid header escape: \\{}",
                    other.map(String::from).unwrap_or_default()
                )))
            }
        }
    }
    Ok(out)
}
