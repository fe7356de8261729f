//! Sluice command parser
//!
//! Grammar: `VERB [argument]`. The verb is the first whitespace delimited
//! token; the argument is everything after the separating whitespace, with
//! trailing whitespace trimmed. Both ends use this grammar, so paths with
//! spaces travel intact.

use crate::command::{Command, CommandKind};
use crate::error::{ProtocolError, ProtocolResult};

/// Parse a single command line (terminator already removed)
pub fn parse_line(line: &str) -> ProtocolResult<Command> {
    let line = line.trim_start().trim_end_matches(['\r', '\n', ' ', '\t']);
    if line.is_empty() {
        return Err(ProtocolError::InvalidCommand("Empty command".into()));
    }

    let (verb, rest) = match line.find(char::is_whitespace) {
        Some(pos) => (&line[..pos], line[pos..].trim_start()),
        None => (line, ""),
    };

    let kind = CommandKind::from_verb(verb)
        .ok_or_else(|| ProtocolError::InvalidCommand(format!("Unknown command: {}", verb)))?;

    let argument = if rest.is_empty() {
        None
    } else {
        Some(rest.to_string())
    };

    Ok(Command::new(kind, argument))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::split_line;
    use bytes::BytesMut;

    fn next_command(buf: &mut BytesMut) -> Option<Command> {
        split_line(buf)
            .unwrap()
            .map(|line| parse_line(&String::from_utf8_lossy(&line)).unwrap())
    }

    #[test]
    fn test_parse_get() {
        let cmd = parse_line("GET report.pdf").unwrap();
        assert_eq!(cmd.kind, CommandKind::Get);
        assert_eq!(cmd.argument.as_deref(), Some("report.pdf"));
    }

    #[test]
    fn test_parse_argument_with_spaces() {
        let cmd = parse_line("CD   My Documents/old  files  ").unwrap();
        assert_eq!(cmd.kind, CommandKind::Cd);
        assert_eq!(cmd.argument.as_deref(), Some("My Documents/old  files"));
    }

    #[test]
    fn test_parse_no_argument() {
        let cmd = parse_line("pwd").unwrap();
        assert_eq!(cmd, Command::pwd());

        let cmd = parse_line("SIZE").unwrap();
        assert_eq!(cmd.kind, CommandKind::Size);
        assert!(cmd.argument.is_none());
    }

    #[test]
    fn test_parse_unknown_and_empty() {
        assert!(matches!(
            parse_line("LIST /"),
            Err(ProtocolError::InvalidCommand(_))
        ));
        assert!(matches!(
            parse_line("   "),
            Err(ProtocolError::InvalidCommand(_))
        ));
        // Verbs are whole tokens, not prefixes
        assert!(parse_line("QUITX").is_err());
    }

    #[test]
    fn test_round_trip_through_encode() {
        let cmd = Command::put("dir with space/file name.bin");
        let mut buf = BytesMut::from(&cmd.encode().unwrap()[..]);
        assert_eq!(next_command(&mut buf).unwrap(), cmd);
    }

    #[test]
    fn test_incomplete_command() {
        let mut buf = BytesMut::from(&b"SYST"[..]);
        assert!(next_command(&mut buf).is_none());

        buf.extend_from_slice(b"\r\nQUIT\r\n");
        assert_eq!(next_command(&mut buf).unwrap(), Command::syst());
        assert_eq!(next_command(&mut buf).unwrap(), Command::quit());
    }
}
