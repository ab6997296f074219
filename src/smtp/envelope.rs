use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The remote end of an SMTP connection. Created at accept time, gone when
/// the session ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub remote_ip: String,
    pub remote_port: u16,
}

impl Peer {
    #[must_use]
    pub fn new(remote_ip: impl Into<String>, remote_port: u16) -> Self {
        Self {
            remote_ip: remote_ip.into(),
            remote_port,
        }
    }
}

impl Default for Peer {
    fn default() -> Self {
        Self::new("0.0.0.0", 0)
    }
}

impl std::fmt::Display for Peer {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(fmt, "{}:{}", self.remote_ip, self.remote_port)
    }
}

/// The message under construction within a session, handed to the deliverer
/// once complete.
///
/// `smtp_from` holds the validated reverse path; an empty string is the
/// null reverse path (`<>`). Recipients keep their submission order and may
/// contain duplicates. `unvalidated_input` carries raw extension tokens from
/// `MAIL FROM` (e.g. the announced `SIZE`) for hosts that want to look at
/// them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    pub peer: Peer,
    pub smtp_helo: Option<String>,
    pub smtp_from: Option<String>,
    pub smtp_to: Vec<String>,
    pub msg_data: Option<String>,
    pub username: Option<String>,
    pub unvalidated_input: HashMap<String, String>,
}

impl Message {
    #[must_use]
    pub fn new(peer: Peer) -> Self {
        Self {
            peer,
            ..Self::default()
        }
    }

    /// The fresh message that follows a completed transaction: the peer,
    /// helo string, and authenticated username carry over.
    #[must_use]
    pub(crate) fn next_transaction(&self) -> Self {
        Self {
            peer: self.peer.clone(),
            smtp_helo: self.smtp_helo.clone(),
            username: self.username.clone(),
            ..Self::default()
        }
    }

    /// The fresh message that follows RSET: only the peer and helo string
    /// carry over.
    #[must_use]
    pub(crate) fn after_reset(&self) -> Self {
        Self {
            peer: self.peer.clone(),
            smtp_helo: self.smtp_helo.clone(),
            ..Self::default()
        }
    }
}
