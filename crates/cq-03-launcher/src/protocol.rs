//! # Launcher ↔ Worker Wire Protocol
//!
//! Line-oriented records over the worker's stdio pipes.
//!
//! | Direction         | Pipe   | Record     | Meaning                         |
//! |-------------------|--------|------------|---------------------------------|
//! | worker → launcher | stdout | `H$<idx>`  | worker `<idx>` is alive         |
//! | launcher → worker | stdin  | `S`        | finish in-flight work and exit  |
//!
//! EOF on the worker's stdin means the same as `S`.

use crate::error::ProtocolError;

const HEARTBEAT_TAG: char = 'H';
const STOP_TAG: char = 'S';
const SEPARATOR: char = '$';

/// Worker → launcher record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessRecord {
    Heartbeat { index: usize },
}

/// Launcher → worker record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRecord {
    Stop,
}

/// Heartbeat line for worker `index`, newline included.
pub fn encode_heartbeat(index: usize) -> String {
    format!("{HEARTBEAT_TAG}{SEPARATOR}{index}\n")
}

/// Stop line, newline included.
pub fn encode_stop() -> &'static str {
    "S\n"
}

pub fn parse_liveness(line: &str) -> Result<LivenessRecord, ProtocolError> {
    let line = line.trim();
    let mut chars = line.chars();
    match chars.next() {
        None => Err(ProtocolError::Empty),
        Some(HEARTBEAT_TAG) => {
            let index = line
                .split_once(SEPARATOR)
                .and_then(|(_, idx)| idx.parse::<usize>().ok())
                .ok_or_else(|| ProtocolError::InvalidIndex(line.to_string()))?;
            Ok(LivenessRecord::Heartbeat { index })
        }
        Some(other) => Err(ProtocolError::UnknownTag(other)),
    }
}

pub fn parse_control(line: &str) -> Result<ControlRecord, ProtocolError> {
    match line.trim().chars().next() {
        None => Err(ProtocolError::Empty),
        Some(STOP_TAG) => Ok(ControlRecord::Stop),
        Some(other) => Err(ProtocolError::UnknownTag(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_wire_format() {
        assert_eq!(encode_heartbeat(2), "H$2\n");
        assert_eq!(
            parse_liveness("H$12\n").unwrap(),
            LivenessRecord::Heartbeat { index: 12 }
        );
    }

    #[test]
    fn test_rejects_malformed_records() {
        assert_eq!(parse_liveness(""), Err(ProtocolError::Empty));
        assert_eq!(parse_liveness("X$1"), Err(ProtocolError::UnknownTag('X')));
        assert!(matches!(
            parse_liveness("H$abc"),
            Err(ProtocolError::InvalidIndex(_))
        ));
        assert!(matches!(parse_liveness("H"), Err(ProtocolError::InvalidIndex(_))));
    }

    #[test]
    fn test_control_records() {
        assert_eq!(parse_control(encode_stop()).unwrap(), ControlRecord::Stop);
        assert_eq!(parse_control("?"), Err(ProtocolError::UnknownTag('?')));
    }
}
