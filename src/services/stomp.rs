//! STOMP 1.2 frame codec.
//!
//! Frames travel one per WebSocket text message. A message made only of
//! end-of-line characters is a heart-beat and decodes to `None`.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum StompError {
    #[error("Frame has no command")]
    MissingCommand,

    #[error("Malformed header line: {0}")]
    MalformedHeader(String),

    #[error("Invalid content-length: {0}")]
    InvalidContentLength(String),

    #[error("Frame body is not valid UTF-8")]
    InvalidBody,

    #[error("Failed to encode body: {0}")]
    Body(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
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

    /// First value for a header; repeated headers keep the first occurrence.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn escapes_headers(command: &str) -> bool {
        command != "CONNECT" && command != "CONNECTED"
    }

    pub fn encode(&self) -> String {
        let escape = Self::escapes_headers(&self.command);
        let mut out = String::with_capacity(self.body.len() + 64);

        out.push_str(&self.command);
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
        if !self.body.is_empty() && self.get_header("content-length").is_none() {
            out.push_str(&format!("content-length:{}\n", self.body.len()));
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    pub fn decode(raw: &str) -> Result<Option<Frame>, StompError> {
        let raw = raw.trim_start_matches(['\r', '\n']);
        if raw.is_empty() {
            return Ok(None);
        }

        let (head, rest) = match raw.find("\n\n") {
            Some(idx) => (&raw[..idx], &raw[idx + 2..]),
            None => match raw.find("\r\n\r\n") {
                Some(idx) => (&raw[..idx], &raw[idx + 4..]),
                None => (raw.trim_end_matches('\0'), ""),
            },
        };

        let mut lines = head.lines();
        let command = lines
            .next()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .ok_or(StompError::MissingCommand)?
            .to_string();

        let escape = Self::escapes_headers(&command);
        let mut headers = Vec::new();
        for line in lines {
            let line = line.trim_end_matches('\r');
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| StompError::MalformedHeader(line.to_string()))?;
            if escape {
                headers.push((unescape_header(name)?, unescape_header(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let mut frame = Frame {
            command,
            headers,
            body: String::new(),
        };

        frame.body = match frame.get_header("content-length") {
            Some(len) => {
                let len: usize = len
                    .trim()
                    .parse()
                    .map_err(|_| StompError::InvalidContentLength(len.to_string()))?;
                let bytes = rest.as_bytes();
                if bytes.len() < len {
                    return Err(StompError::InvalidContentLength(len.to_string()));
                }
                std::str::from_utf8(&bytes[..len])
                    .map_err(|_| StompError::InvalidBody)?
                    .to_string()
            }
            None => rest.split('\0').next().unwrap_or_default().to_string(),
        };

        Ok(Some(frame))
    }
}

fn escape_header(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(value: &str) -> Result<String, StompError> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('c') => out.push(':'),
            _ => return Err(StompError::MalformedHeader(value.to_string())),
        }
    }
    Ok(out)
}

pub fn connect(host: &str, token: Option<&str>, heartbeat: (u64, u64)) -> Frame {
    let mut frame = Frame::new("CONNECT")
        .header("accept-version", "1.2")
        .header("host", host)
        .header("heart-beat", format!("{},{}", heartbeat.0, heartbeat.1));
    if let Some(token) = token {
        frame = frame.header("Authorization", format!("Bearer {}", token));
    }
    frame
}

pub fn subscribe(id: &str, destination: &str) -> Frame {
    Frame::new("SUBSCRIBE")
        .header("id", id)
        .header("destination", destination)
        .header("ack", "auto")
}

pub fn unsubscribe(id: &str) -> Frame {
    Frame::new("UNSUBSCRIBE").header("id", id)
}

pub fn send<T: Serialize>(destination: &str, body: &T) -> Result<Frame, StompError> {
    let body = serde_json::to_string(body).map_err(|e| StompError::Body(e.to_string()))?;
    Ok(Frame::new("SEND")
        .header("destination", destination)
        .header("content-type", "application/json")
        .with_body(body))
}

pub fn disconnect(receipt: &str) -> Frame {
    Frame::new("DISCONNECT").header("receipt", receipt)
}
