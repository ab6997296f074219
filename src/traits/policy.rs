//! Acceptance policy: consulted at every decision point of the SMTP
//! conversation.
//!
//! A policy does not change the protocol implementation itself (the state
//! machine takes care of command ordering); it decides whether a command is
//! acceptable and may override the reply the server sends. One policy
//! instance is built per client connection, so implementations may keep
//! per-connection state and do not need to be thread-safe.

use crate::smtp::{
    envelope::{Message, Peer},
    reply::Reply,
};

/// The outcome of a policy hook.
///
/// Carries the accept/reject decision, an optional custom reply to send
/// instead of the command's default reply, and two independent connection
/// close requests: `close_before_response` drops the connection without any
/// further output, `close_after_response` drops it right after the reply
/// went out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    accepted: bool,
    reply: Option<Reply>,
    close_before_response: bool,
    close_after_response: bool,
}

impl Decision {
    #[must_use]
    pub fn accept() -> Self {
        Self {
            accepted: true,
            reply: None,
            close_before_response: false,
            close_after_response: false,
        }
    }

    #[must_use]
    pub fn reject() -> Self {
        Self {
            accepted: false,
            ..Self::accept()
        }
    }

    /// Accept, but reply with `reply` instead of the default positive reply.
    #[must_use]
    pub fn accept_with_reply(reply: Reply) -> Self {
        Self {
            reply: Some(reply),
            ..Self::accept()
        }
    }

    /// Reject and reply with `reply` instead of the default negative reply.
    #[must_use]
    pub fn reject_with_reply(reply: Reply) -> Self {
        Self {
            accepted: false,
            reply: Some(reply),
            ..Self::accept()
        }
    }

    /// Close the connection without sending anything further.
    #[must_use]
    pub fn close_before_response(mut self) -> Self {
        self.close_before_response = true;
        self
    }

    /// Close the connection immediately after the reply was sent.
    #[must_use]
    pub fn close_after_response(mut self) -> Self {
        self.close_after_response = true;
        self
    }

    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    pub(crate) fn should_close_before_response(&self) -> bool {
        self.close_before_response
    }

    pub(crate) fn should_close_after_response(&self) -> bool {
        self.close_after_response
    }

    pub(crate) fn into_reply(self) -> Option<Reply> {
        self.reply
    }
}

impl From<bool> for Decision {
    fn from(accepted: bool) -> Self {
        if accepted { Self::accept() } else { Self::reject() }
    }
}

/// The policy hook surface. Every method defaults to accepting, so a host
/// only overrides the decision points it cares about.
///
/// The `message` passed to most hooks is the message under construction; it
/// does not carry all data at every stage (`accept_from` cannot see
/// recipients because none were submitted yet).
pub trait Policy: Send {
    /// Called directly after a new connection was accepted. Declining closes
    /// the connection immediately.
    fn accept_new_connection(&mut self, _peer: &Peer) -> Decision {
        Decision::accept()
    }

    /// The maximum message size (in bytes) for this peer, or `None` for no
    /// limit. When set, oversized input is rejected with `552` before the
    /// message is handed over, and `MAIL FROM` `SIZE=` announcements above
    /// the limit are rejected early.
    fn max_message_size(&mut self, _peer: &Peer) -> Option<usize> {
        None
    }

    /// Extra capability lines to advertise after EHLO. The default announces
    /// the SIZE extension when [`Policy::max_message_size`] returns a limit.
    fn ehlo_lines(&mut self, peer: &Peer) -> Vec<String> {
        self.max_message_size(peer)
            .map(|size| format!("SIZE {size}"))
            .into_iter()
            .collect()
    }

    fn accept_helo(&mut self, _helo: &str, _message: &Message) -> Decision {
        Decision::accept()
    }

    fn accept_ehlo(&mut self, _ehlo: &str, _message: &Message) -> Decision {
        Decision::accept()
    }

    /// Username and password are unverified at this point; the authenticator
    /// checks them after the policy allowed the command. An accepting
    /// decision must not carry its own reply.
    fn accept_auth_plain(
        &mut self,
        _username: &str,
        _password: &str,
        _message: &Message,
    ) -> Decision {
        Decision::accept()
    }

    /// `username` is only present when the client sent an initial response
    /// with the AUTH LOGIN command. An accepting decision must not carry its
    /// own reply.
    fn accept_auth_login(&mut self, _username: Option<&str>, _message: &Message) -> Decision {
        Decision::accept()
    }

    fn accept_from(&mut self, _sender: &str, _message: &Message) -> Decision {
        Decision::accept()
    }

    /// Called once per recipient when a message goes to several.
    fn accept_rcpt_to(&mut self, _recipient: &str, _message: &Message) -> Decision {
        Decision::accept()
    }

    fn accept_data(&mut self, _message: &Message) -> Decision {
        Decision::accept()
    }

    /// The last check before the server takes responsibility for the
    /// message; called with the complete payload.
    fn accept_msgdata(&mut self, _data: &str, _message: &Message) -> Decision {
        Decision::accept()
    }
}

/// The default policy: everything is accepted.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPolicy;

impl Policy for DefaultPolicy {}
