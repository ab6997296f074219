use core::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use super::parser::LINE_TERMINATOR;

/// An SMTP reply: a code plus one or more lines of text.
///
/// On the wire a single-line reply is `<code> <text>`, and a multi-line
/// reply uses `<code>-<line>` for every line except the last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    code: u16,
    lines: Vec<String>,
}

impl Reply {
    #[must_use]
    pub fn new(code: impl Into<u16>, text: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            lines: vec![text.into()],
        }
    }

    /// A multi-line reply. An empty `lines` is treated as one empty line so
    /// the wire form stays well-formed.
    #[must_use]
    pub fn multiline(code: impl Into<u16>, lines: Vec<String>) -> Self {
        Self {
            code: code.into(),
            lines: if lines.is_empty() {
                vec![String::default()]
            } else {
                lines
            },
        }
    }

    #[must_use]
    pub fn code(&self) -> u16 {
        self.code
    }

    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The text of a single-line reply, or the last line of a multi-line
    /// one.
    #[must_use]
    pub fn text(&self) -> &str {
        self.lines.last().map_or("", String::as_str)
    }

    /// The wire form, terminators included.
    #[must_use]
    pub fn render(&self) -> String {
        let mut wire = String::new();
        let (last, head) = match self.lines.split_last() {
            Some((last, head)) => (last.as_str(), head),
            None => ("", &[][..]),
        };
        for line in head {
            wire.push_str(&format!("{}-{line}{LINE_TERMINATOR}", self.code));
        }
        wire.push_str(&format!("{} {last}{LINE_TERMINATOR}", self.code));
        wire
    }
}

impl Display for Reply {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        write!(fmt, "{} {}", self.code, self.lines.join(" / "))
    }
}
