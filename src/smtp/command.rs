use core::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// The internal SMTP verbs driving the session state machine.
///
/// `Greet` and `MsgData` are pseudo-verbs: they are never recognised on the
/// wire. `Greet` runs when a connection is accepted, `MsgData` when a DATA
/// payload was assembled completely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Verb {
    Helo,
    Ehlo,
    MailFrom,
    RcptTo,
    Data,
    Rset,
    Noop,
    Help,
    Quit,
    AuthPlain,
    AuthLogin,
    Greet,
    MsgData,
}

impl Verb {
    /// The first word of the wire form, the form clients see in HELP output.
    #[must_use]
    pub fn wire_word(self) -> &'static str {
        match self {
            Self::Helo => "HELO",
            Self::Ehlo => "EHLO",
            Self::MailFrom => "MAIL",
            Self::RcptTo => "RCPT",
            Self::Data => "DATA",
            Self::Rset => "RSET",
            Self::Noop => "NOOP",
            Self::Help => "HELP",
            Self::Quit => "QUIT",
            Self::AuthPlain | Self::AuthLogin => "AUTH",
            Self::Greet => "GREET",
            Self::MsgData => "MSGDATA",
        }
    }
}

impl Display for Verb {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        fmt.write_str(match self {
            Self::MailFrom => "MAIL FROM",
            Self::RcptTo => "RCPT TO",
            Self::AuthPlain => "AUTH PLAIN",
            Self::AuthLogin => "AUTH LOGIN",
            _ => self.wire_word(),
        })
    }
}

impl FromStr for Verb {
    type Err = ();

    /// Parses an internal verb name ("MAIL FROM", "rset", ...),
    /// case-insensitively. Not the wire parser; see
    /// [`recognise`](crate::smtp::command::recognise) for that.
    fn from_str(verb: &str) -> Result<Self, Self::Err> {
        match verb.to_ascii_uppercase().as_str() {
            "HELO" => Ok(Self::Helo),
            "EHLO" => Ok(Self::Ehlo),
            "MAIL FROM" => Ok(Self::MailFrom),
            "RCPT TO" => Ok(Self::RcptTo),
            "DATA" => Ok(Self::Data),
            "RSET" => Ok(Self::Rset),
            "NOOP" => Ok(Self::Noop),
            "HELP" => Ok(Self::Help),
            "QUIT" => Ok(Self::Quit),
            "AUTH PLAIN" => Ok(Self::AuthPlain),
            "AUTH LOGIN" => Ok(Self::AuthLogin),
            "GREET" => Ok(Self::Greet),
            "MSGDATA" => Ok(Self::MsgData),
            _ => Err(()),
        }
    }
}

/// Every verb a client may put on the wire, multi-word tokens first so
/// "MAIL FROM" wins over any single-word prefix.
const WIRE_VERBS: &[&str] = &[
    "MAIL FROM",
    "RCPT TO",
    "AUTH PLAIN",
    "AUTH LOGIN",
    "HELO",
    "EHLO",
    "DATA",
    "RSET",
    "NOOP",
    "HELP",
    "QUIT",
];

/// Split a command line into the verb and its argument.
///
/// The verb is matched case-insensitively against the wire verb table; the
/// separator is a single space or `:` (for `MAIL FROM:` / `RCPT TO:`), and
/// the argument is stripped of surrounding whitespace. A line that matches
/// no verb comes back unchanged with no argument, so the session can answer
/// `500 unrecognized command` with the client's own spelling.
#[must_use]
pub fn recognise(line: &str) -> (String, Option<String>) {
    let bytes = line.as_bytes();
    for verb in WIRE_VERBS {
        if bytes.len() < verb.len() || !bytes[..verb.len()].eq_ignore_ascii_case(verb.as_bytes()) {
            continue;
        }

        // The matched prefix is pure ASCII, so these slices sit on char
        // boundaries even when the rest of the line is not UTF-8 clean.
        let rest = &line[verb.len()..];
        let argument = match rest.bytes().next() {
            None => break,
            Some(b' ' | b':') => rest[1..].trim(),
            Some(_) => continue,
        };

        return (line[..verb.len()].to_string(), Some(argument.to_string()));
    }

    (line.to_string(), None)
}
