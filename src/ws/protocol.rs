//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::Serialize;
use serde_json::Value;
use std::fmt::Write;

use crate::session::SessionId;

/// Bumped whenever a snapshot field changes meaning or disappears
pub const SNAPSHOT_VERSION: u32 = 1;

pub const WARNING_PREFIX: &str = "[Warning] ";
pub const FATAL_PREFIX: &str = "[Fatal Error] ";

/// A validated player command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Fire a shell with this heading (radians)
    Fire(f32),
    /// Point the tank along this heading (radians)
    Turn(f32),
    Stop,
    Go,
    /// Replace the tank's info text (already sanitized)
    SetInfo(String),
}

/// Reasons a client message is refused; every one of them ends the connection
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Invalid JSON")]
    InvalidJson,

    #[error("Missing or invalid action")]
    InvalidAction,

    #[error("Missing or invalid arg")]
    InvalidArg,

    #[error("Info string longer than {max} characters")]
    InfoTooLong { max: usize },

    #[error("Only text messages are supported")]
    NotText,
}

impl Command {
    /// Parse and validate one text message from a player
    pub fn parse(text: &str, info_max_len: usize) -> Result<Self, ProtocolError> {
        // Commands are JSON objects; arrays and scalars are refused
        let value: Value = serde_json::from_str(text).map_err(|_| ProtocolError::InvalidJson)?;
        let Value::Object(mut fields) = value else {
            return Err(ProtocolError::InvalidJson);
        };

        let action = match fields.remove("action") {
            Some(Value::String(action)) => action,
            _ => return Err(ProtocolError::InvalidAction),
        };
        let arg = fields.remove("arg");

        match action.as_str() {
            "Fire" => Ok(Command::Fire(numeric_arg(arg)?)),
            "Turn" => Ok(Command::Turn(numeric_arg(arg)?)),
            "Stop" => Ok(Command::Stop),
            "Go" => Ok(Command::Go),
            "SetInfo" => match arg {
                Some(Value::String(info)) => {
                    if info.chars().count() > info_max_len {
                        return Err(ProtocolError::InfoTooLong { max: info_max_len });
                    }
                    Ok(Command::SetInfo(sanitize_info(&info)))
                }
                _ => Err(ProtocolError::InvalidArg),
            },
            _ => Err(ProtocolError::InvalidAction),
        }
    }
}

fn numeric_arg(arg: Option<Value>) -> Result<f32, ProtocolError> {
    let value = match arg {
        Some(Value::Number(number)) => number.as_f64().ok_or(ProtocolError::InvalidArg)?,
        _ => return Err(ProtocolError::InvalidArg),
    };
    let value = value as f32;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ProtocolError::InvalidArg)
    }
}

/// Escape text for HTML display and turn http(s) tokens into links
pub fn sanitize_info(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for piece in text.split_inclusive(char::is_whitespace) {
        let token = piece.trim_end_matches(char::is_whitespace);
        let trailing = &piece[token.len()..];

        if token.starts_with("http://") || token.starts_with("https://") {
            let escaped = escape_html(token);
            let _ = write!(out, "<a href=\"{0}\" target=\"_blank\">{0}</a>", escaped);
        } else {
            out.push_str(&escape_html(token));
        }
        out.push_str(trailing);
    }
    out
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Messages queued for a client's writer task
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMsg {
    /// Serialized snapshot JSON
    Snapshot(String),
    /// Non-fatal notice; the connection stays open
    Warning(String),
    /// Last message before the server closes the connection
    Fatal(String),
    /// Keepalive probe (sent as a WebSocket ping)
    Probe,
}

impl ServerMsg {
    /// Text frame payload, or `None` for control frames
    pub fn to_text(&self) -> Option<String> {
        match self {
            ServerMsg::Snapshot(json) => Some(json.clone()),
            ServerMsg::Warning(reason) => Some(format!("{}{}", WARNING_PREFIX, reason)),
            ServerMsg::Fatal(reason) => Some(format!("{}{}", FATAL_PREFIX, reason)),
            ServerMsg::Probe => None,
        }
    }
}

/// Snapshot sent to a player: their own tank in full, everyone else cleaned
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot<'a> {
    pub version: u32,
    pub ongoing_game: bool,
    pub my_tank: OwnTank<'a>,
    pub tanks: Vec<CleanTank>,
    pub shells: &'a [ShellView],
    pub walls: &'a [WallView],
}

/// Snapshot sent to observers: every tank in full
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObserverSnapshot<'a> {
    pub version: u32,
    pub ongoing_game: bool,
    pub tanks: Vec<FullTank<'a>>,
    pub shells: &'a [ShellView],
    pub walls: &'a [WallView],
}

/// Complete tank data, including scores and info
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FullTank<'a> {
    pub name: &'a str,
    pub x: f32,
    pub y: f32,
    pub heading: f32,
    pub moving: bool,
    pub alive: bool,
    pub kills: u32,
    pub wins: u32,
    pub info: &'a str,
}

/// A player's own tank
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnTank<'a> {
    #[serde(flatten)]
    pub tank: FullTank<'a>,
    pub can_shoot: bool,
}

/// Another player's tank with scores and info stripped
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanTank {
    pub id: SessionId,
    pub x: f32,
    pub y: f32,
    pub heading: f32,
    pub moving: bool,
    pub alive: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellView {
    pub x: f32,
    pub y: f32,
    pub heading: f32,
    pub shooter_id: SessionId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WallView {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}
