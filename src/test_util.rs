//! Helpers for testing hosts built on this crate (and this crate itself):
//! a deliverer that keeps everything in memory, an authenticator with
//! predictable behavior, and a harness driving a [`Session`] without any
//! sockets. The helpers panic on unexpected protocol behavior, which is
//! what a test wants.

use std::sync::{Arc, Mutex};

use crate::{
    smtp::{
        envelope::{Message, Peer},
        reply::Reply,
        session::{Action, Session, SessionConfig},
    },
    traits::{
        auth::Authenticator,
        deliver::Deliverer,
        policy::{DefaultPolicy, Policy},
    },
};

/// Stores every accepted message in memory for later inspection.
#[derive(Debug, Clone, Default)]
pub struct BlackholeDeliverer {
    received: Arc<Mutex<Vec<Message>>>,
}

impl BlackholeDeliverer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The messages accepted so far, in order.
    #[must_use]
    pub fn received_messages(&self) -> Vec<Message> {
        self.received.lock().expect("deliverer lock poisoned").clone()
    }
}

impl Deliverer for BlackholeDeliverer {
    fn new_message_accepted(&self, message: Message) {
        self.received
            .lock()
            .expect("deliverer lock poisoned")
            .push(message);
    }
}

/// Accepts exactly the credentials where username and password match.
#[derive(Debug, Clone, Copy, Default)]
pub struct DummyAuthenticator;

impl Authenticator for DummyAuthenticator {
    fn authenticate(&mut self, username: &str, password: &str, _peer: &Peer) -> bool {
        username == password
    }
}

/// A session wired to an in-memory transport: commands go in through
/// [`SessionHarness::send`], replies come back as [`Reply`] values.
///
/// The peer is `127.0.0.1:4567` and the connection is opened (greeting
/// consumed into the reply log) on construction.
pub struct SessionHarness {
    pub session: Session,
    pub deliverer: BlackholeDeliverer,
    replies: Vec<Reply>,
    open: bool,
}

impl Default for SessionHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHarness {
    #[must_use]
    pub fn new() -> Self {
        Self::with(None, None)
    }

    #[must_use]
    pub fn with_policy(policy: impl Policy + 'static) -> Self {
        Self::with(Some(Box::new(policy)), None)
    }

    #[must_use]
    pub fn with_authenticator(authenticator: impl Authenticator + 'static) -> Self {
        Self::with(None, Some(Box::new(authenticator)))
    }

    #[must_use]
    pub fn with(
        policy: Option<Box<dyn Policy>>,
        authenticator: Option<Box<dyn Authenticator>>,
    ) -> Self {
        Self::with_config(SessionConfig::default(), policy, authenticator)
    }

    #[must_use]
    pub fn with_config(
        config: SessionConfig,
        policy: Option<Box<dyn Policy>>,
        authenticator: Option<Box<dyn Authenticator>>,
    ) -> Self {
        let deliverer = BlackholeDeliverer::new();
        let session = Session::new(
            Peer::new("127.0.0.1", 4567),
            config,
            policy.unwrap_or_else(|| Box::new(DefaultPolicy)),
            authenticator,
            Arc::new(deliverer.clone()),
        )
        .expect("the protocol state machine table is static");

        let mut harness = Self {
            session,
            deliverer,
            replies: Vec::default(),
            open: true,
        };
        harness.session.new_connection();
        harness.absorb();
        harness
    }

    fn absorb(&mut self) {
        for action in self.session.drain_actions() {
            match action {
                Action::Send(reply) => self.replies.push(reply),
                Action::Close => self.open = false,
            }
        }
    }

    /// Hand a command to the session and return its reply. Panics unless
    /// exactly one reply came back.
    pub fn send(&mut self, command: &str, data: Option<&str>) -> Reply {
        let before = self.replies.len();
        self.session.handle_input(command, data);
        self.absorb();
        assert_eq!(
            self.replies.len(),
            before + 1,
            "expected exactly one reply to {command:?}"
        );
        self.last_reply().clone()
    }

    pub fn send_expecting(&mut self, command: &str, data: Option<&str>, first_digit: u16) -> Reply {
        let reply = self.send(command, data);
        assert_eq!(
            reply.code() / 100,
            first_digit,
            "unexpected reply to {command:?}: {reply}"
        );
        reply
    }

    pub fn send_valid(&mut self, command: &str, data: Option<&str>) -> Reply {
        self.send_expecting(command, data, 2)
    }

    pub fn send_invalid(&mut self, command: &str, data: Option<&str>) -> Reply {
        self.send_expecting(command, data, 5)
    }

    /// Feed raw bytes as if they arrived from the socket.
    pub fn process(&mut self, data: &[u8]) {
        self.session.process_new_data(data);
        self.absorb();
    }

    /// One line of an AUTH LOGIN exchange, as the parser would deliver it.
    pub fn send_auth_credentials(&mut self, data: &str) -> Reply {
        let before = self.replies.len();
        self.session.handle_auth_credentials(data);
        self.absorb();
        assert_eq!(
            self.replies.len(),
            before + 1,
            "expected exactly one reply to the credential line"
        );
        self.last_reply().clone()
    }

    pub fn helo(&mut self) {
        self.send_valid("helo", Some("fnord"));
    }

    pub fn ehlo(&mut self) {
        self.send_valid("ehlo", Some("fnord"));
    }

    /// QUIT and verify the session closed down properly.
    pub fn close_connection(&mut self) {
        let reply = self.send_expecting("quit", None, 2);
        assert_eq!(reply.code(), 221);
        assert!(!self.is_open(), "session should be closed after QUIT");
    }

    #[must_use]
    pub fn last_reply(&self) -> &Reply {
        self.replies.last().expect("no reply recorded yet")
    }

    #[must_use]
    pub fn replies(&self) -> &[Reply] {
        &self.replies
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    #[must_use]
    pub fn received_messages(&self) -> Vec<Message> {
        self.deliverer.received_messages()
    }
}
