//! Line framing for the SMTP byte stream.
//!
//! The parser accumulates raw bytes and cuts them into logical units: a
//! command line in command mode, the complete message payload in data mode,
//! or a bare credential line while an AUTH LOGIN exchange is running. The
//! unit sequence is independent of how the bytes were chunked by the
//! network. Payloads are handed out with SMTP transparency already decoded
//! (leading `..` becomes `.`) and line endings normalised to `\n`.

use super::command;

pub const LINE_TERMINATOR: &str = "\r\n";
pub const DATA_TERMINATOR: &str = "\r\n.\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Mode {
    #[default]
    Command,
    Data,
    AuthLogin,
}

/// One logical unit cut from the byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Unit {
    /// A command line, split into the recognised verb (client spelling
    /// preserved) and its stripped argument.
    Command {
        verb: String,
        argument: Option<String>,
    },
    /// The complete DATA payload, transparency-decoded and LF-normalised.
    Payload(String),
    /// A raw line received while in AUTH LOGIN mode.
    Credentials(String),
    /// The buffer outgrew the configured maximum input size. The parser has
    /// already reset itself to command mode.
    Oversized,
}

#[derive(Debug, Default)]
pub struct CommandParser {
    buffer: Vec<u8>,
    mode: Mode,
    maximum_message_size: Option<usize>,
}

impl CommandParser {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_maximum_message_size(&mut self, maximum: Option<usize>) {
        self.maximum_message_size = maximum;
    }

    /// Mode switches keep the buffer: pipelined bytes that arrived with the
    /// previous command still belong to the next unit.
    pub(crate) fn switch_to_command_mode(&mut self) {
        self.mode = Mode::Command;
    }

    pub(crate) fn switch_to_data_mode(&mut self) {
        self.mode = Mode::Data;
    }

    pub(crate) fn switch_to_auth_login_mode(&mut self) {
        self.mode = Mode::AuthLogin;
    }

    #[must_use]
    pub(crate) fn is_in_command_mode(&self) -> bool {
        self.mode == Mode::Command
    }

    #[must_use]
    pub(crate) fn is_in_data_mode(&self) -> bool {
        self.mode == Mode::Data
    }

    pub(crate) fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    fn terminator(&self) -> &'static [u8] {
        match self.mode {
            Mode::Data => DATA_TERMINATOR.as_bytes(),
            Mode::Command | Mode::AuthLogin => LINE_TERMINATOR.as_bytes(),
        }
    }

    fn is_input_too_big(&self) -> bool {
        self.maximum_message_size
            .is_some_and(|maximum| self.buffer.len() > maximum)
    }

    /// Cut the next logical unit off the front of the buffer, if a complete
    /// one is present. The session handles each unit before asking for the
    /// next so that mode switches take effect for the remaining bytes.
    pub(crate) fn next_unit(&mut self) -> Option<Unit> {
        if self.is_input_too_big() {
            self.buffer.clear();
            self.mode = Mode::Command;
            return Some(Unit::Oversized);
        }

        let terminator = self.terminator();
        let position = find(&self.buffer, terminator)?;
        // In data mode the end-of-data marker is the "." line; the CRLF in
        // front of it ends the last content line and stays in the payload.
        let content = match self.mode {
            Mode::Data => position + LINE_TERMINATOR.len(),
            Mode::Command | Mode::AuthLogin => position,
        };
        let unit = self.buffer[..content].to_vec();
        self.buffer.drain(..position + terminator.len());

        Some(match self.mode {
            Mode::Command => {
                let line = String::from_utf8_lossy(&unit);
                let (verb, argument) = command::recognise(&line);
                Unit::Command { verb, argument }
            }
            Mode::Data => Unit::Payload(decode_transparency(&unit)),
            Mode::AuthLogin => Unit::Credentials(String::from_utf8_lossy(&unit).into_owned()),
        })
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Undo the transparency encoding of RFC 5321 section 4.5.2 and normalise
/// line endings.
fn decode_transparency(payload: &[u8]) -> String {
    let text = String::from_utf8_lossy(payload).replace(LINE_TERMINATOR, "\n");
    text.split_inclusive('\n')
        .map(|line| line.strip_prefix('.').filter(|_| line.starts_with("..")).unwrap_or(line))
        .collect()
}
