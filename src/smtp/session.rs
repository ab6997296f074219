//! The SMTP session: everything between "bytes arrived" and "reply queued".
//!
//! The session owns the line framer, the protocol state machine, and the
//! message under construction. It consults the host's policy at every
//! decision point and hands accepted messages to the deliverer. One session
//! per TCP connection, never shared.

use std::{
    collections::{BTreeSet, VecDeque},
    mem,
    str::FromStr,
    sync::Arc,
};

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};

use crate::{
    fsm::{FsmError, StateMachine},
    incoming, internal,
    outgoing,
    traits::{
        auth::Authenticator,
        deliver::Deliverer,
        policy::{Decision, Policy},
    },
};

use super::{
    command::Verb,
    envelope::{Message, Peer},
    parser::{CommandParser, Unit},
    reply::Reply,
    status::Status,
    validation::{self, ValidationError},
};

const NEW: &str = "new";
const GREETED: &str = "greeted";
const INITIALIZED: &str = "initialized";
const AUTHENTICATED: &str = "authenticated";
const SENDER_KNOWN: &str = "sender_known";
const RECIPIENT_KNOWN: &str = "recipient_known";
const RECEIVING_MESSAGE: &str = "receiving_message";
const FINISHED: &str = "finished";

const SIZE_EXCEEDED: &str = "message exceeds fixed maximum message size";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// The hostname used in the greeting, EHLO, and QUIT replies.
    pub hostname: String,
    /// Advertise and accept the AUTH LOGIN mechanism (AUTH PLAIN is always
    /// available once an authenticator is installed).
    pub enable_auth_login: bool,
    /// Treat a HELO/EHLO on an already-initialised session as RSET followed
    /// by the new HELO/EHLO instead of rejecting it with 503.
    pub allow_repeated_helo: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            enable_auth_login: true,
            allow_repeated_helo: false,
        }
    }
}

/// What the transport should do next, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Send(Reply),
    Close,
}

/// Whether a handled verb moves the state machine.
enum Advance {
    Transition,
    Stay,
}

/// A verb that did not complete: the reply to send, or nothing when the
/// handler (or the policy) already replied.
struct Denied {
    reply: Option<Reply>,
}

impl Denied {
    fn already_replied() -> Self {
        Self { reply: None }
    }

    fn with(reply: Reply) -> Self {
        Self { reply: Some(reply) }
    }
}

impl From<ValidationError> for Denied {
    fn from(error: ValidationError) -> Self {
        Self::with(Reply::new(Status::SyntaxError, error.0))
    }
}

type Handled = Result<Advance, Denied>;

enum AuthLoginExchange {
    AwaitingUsername,
    AwaitingPassword { username: String },
}

pub struct Session {
    config: SessionConfig,
    policy: Box<dyn Policy>,
    authenticator: Option<Box<dyn Authenticator>>,
    deliverer: Arc<dyn Deliverer>,
    machine: StateMachine<Verb>,
    parser: CommandParser,
    message: Message,
    actions: VecDeque<Action>,
    connected: bool,
    close_after_response: bool,
    auth_login: Option<AuthLoginExchange>,
}

impl Session {
    pub fn new(
        peer: Peer,
        config: SessionConfig,
        policy: Box<dyn Policy>,
        authenticator: Option<Box<dyn Authenticator>>,
        deliverer: Arc<dyn Deliverer>,
    ) -> Result<Self, FsmError> {
        Ok(Self {
            machine: build_state_machine(&config)?,
            parser: CommandParser::new(),
            message: Message::new(peer),
            actions: VecDeque::default(),
            connected: true,
            close_after_response: false,
            auth_login: None,
            config,
            policy,
            authenticator,
            deliverer,
        })
    }

    // --- transport-facing contract --------------------------------------

    /// Called once, when the connection was accepted: consult the policy,
    /// greet the peer (or turn it away), and install the size limit.
    pub fn new_connection(&mut self) {
        internal!("Connected to {}", self.message.peer);

        let decision = self.policy.accept_new_connection(&self.message.peer);
        let close_after = decision.should_close_after_response();
        let (accepted, response_sent) = self.evaluate(decision);

        if accepted {
            if !response_sent {
                self.handle_input("GREET", None);
            }
            let maximum = self.policy.max_message_size(&self.message.peer);
            self.parser.set_maximum_message_size(maximum);
            if close_after {
                self.close_connection();
            }
        } else {
            if !response_sent {
                self.reply(Status::Unavailable, "SMTP service not available");
            }
            self.close_connection();
        }
    }

    /// Feed raw bytes from the socket. Complete units are handled
    /// immediately, in order; replies and close requests pile up in the
    /// action queue.
    pub fn process_new_data(&mut self, data: &[u8]) {
        self.parser.feed(data);
        while self.connected {
            let Some(unit) = self.parser.next_unit() else {
                break;
            };
            match unit {
                Unit::Command { verb, argument } => {
                    incoming!("{verb}");
                    self.handle_input(&verb, argument.as_deref());
                }
                Unit::Payload(payload) => self.handle_input("MSGDATA", Some(&payload)),
                Unit::Credentials(line) => self.handle_auth_credentials(&line),
                Unit::Oversized => self.input_exceeds_limits(),
            }
        }
    }

    /// Process one SMTP command (internal verb name plus raw argument).
    pub fn handle_input(&mut self, command: &str, data: Option<&str>) {
        self.close_after_response = false;

        match Verb::from_str(command) {
            Err(()) => self.unrecognized(command),
            Ok(verb) if !self.machine.known_actions().contains(&verb) => {
                self.unrecognized(command);
            }
            Ok(verb) if !self.machine.allowed_actions().contains(&verb) => {
                let allowed = self
                    .machine
                    .allowed_actions()
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut text = format!("Command \"{command}\" is not allowed here");
                if !allowed.is_empty() {
                    text.push_str(&format!(", expected one of [{allowed}]"));
                }
                self.reply(Status::InvalidCommandSequence, text);
            }
            Ok(verb) => match self.dispatch(verb, data.unwrap_or_default()) {
                Ok(Advance::Transition) => {
                    if let Err(error) = self.machine.execute(verb) {
                        internal!(level = ERROR, "dispatch succeeded without transition: {error}");
                        self.reply(
                            Status::TemporaryFailure,
                            "Temporary Local Problem: Please come back later",
                        );
                    }
                }
                Ok(Advance::Stay) => {}
                Err(Denied { reply: Some(reply) }) => self.push_reply(reply),
                Err(Denied { reply: None }) => {}
            },
        }

        if self.close_after_response {
            self.close_after_response = false;
            self.close_connection();
        }
    }

    /// One line of an in-flight AUTH LOGIN exchange.
    pub fn handle_auth_credentials(&mut self, data: &str) {
        match self.auth_login.take() {
            None => {
                self.parser.switch_to_command_mode();
                self.reply(Status::SyntaxError, "Garbled data sent");
            }
            Some(AuthLoginExchange::AwaitingUsername) => {
                match validation::decode_credential(data) {
                    Ok(username) => {
                        self.auth_login =
                            Some(AuthLoginExchange::AwaitingPassword { username });
                        self.challenge("Password:");
                    }
                    Err(error) => {
                        self.parser.switch_to_command_mode();
                        self.reply(Status::SyntaxError, error.0);
                    }
                }
            }
            Some(AuthLoginExchange::AwaitingPassword { username }) => {
                self.parser.switch_to_command_mode();
                match validation::decode_credential(data) {
                    Ok(password) => {
                        if self.check_credentials(username, password).is_ok()
                            && let Err(error) = self.machine.set_state(AUTHENTICATED)
                        {
                            internal!(level = ERROR, "{error}");
                        }
                    }
                    Err(error) => self.reply(Status::SyntaxError, error.0),
                }
            }
        }
    }

    /// The client sent more than the configured maximum input size.
    pub fn input_exceeds_limits(&mut self) {
        self.reply(Status::ExceededStorage, SIZE_EXCEEDED);
    }

    /// Replies and close requests queued since the last drain, in order.
    pub fn drain_actions(&mut self) -> Vec<Action> {
        self.actions.drain(..).collect()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// The current protocol state, `None` only if the machine was forced
    /// into an unknown state.
    #[must_use]
    pub fn state(&self) -> Option<&'static str> {
        self.machine.state()
    }

    #[must_use]
    pub fn message(&self) -> &Message {
        &self.message
    }

    // --- protocol handlers ----------------------------------------------

    fn dispatch(&mut self, verb: Verb, arguments: &str) -> Handled {
        match verb {
            Verb::Greet => self.smtp_greet(),
            Verb::Helo => self.smtp_helo(arguments),
            Verb::Ehlo => self.smtp_ehlo(arguments),
            Verb::MailFrom => self.smtp_mail_from(arguments),
            Verb::RcptTo => self.smtp_rcpt_to(arguments),
            Verb::Data => self.smtp_data(arguments),
            Verb::MsgData => self.smtp_msgdata(arguments),
            Verb::Rset => self.smtp_rset(arguments),
            Verb::Noop => self.smtp_noop(arguments),
            Verb::Help => self.smtp_help(arguments),
            Verb::Quit => self.smtp_quit(arguments),
            Verb::AuthPlain => self.smtp_auth_plain(arguments),
            Verb::AuthLogin => self.smtp_auth_login(arguments),
        }
    }

    /// Not a real SMTP command: runs when the connection was accepted.
    fn smtp_greet(&mut self) -> Handled {
        let text = format!(
            "{} Hello {}",
            self.config.hostname, self.message.peer.remote_ip
        );
        self.reply(Status::ServiceReady, text);
        Ok(Advance::Transition)
    }

    fn smtp_helo(&mut self, arguments: &str) -> Handled {
        let helo = validation::validate_helo(arguments)?;
        let decision = self.policy.accept_helo(&helo, &self.message);
        let response_sent =
            self.check_policy(decision, Status::Rejected, "Administrative Prohibition")?;

        self.reset_transaction_on_repeated_helo();
        self.message.smtp_helo = Some(helo);
        if !response_sent {
            self.reply(Status::Ok, self.config.hostname.clone());
        }
        Ok(Advance::Transition)
    }

    fn smtp_ehlo(&mut self, arguments: &str) -> Handled {
        let ehlo = validation::validate_helo(arguments)?;
        let decision = self.policy.accept_ehlo(&ehlo, &self.message);
        let response_sent =
            self.check_policy(decision, Status::Rejected, "Administrative Prohibition")?;

        self.reset_transaction_on_repeated_helo();
        self.message.smtp_helo = Some(ehlo);
        if !response_sent {
            let mut lines = vec![self.config.hostname.clone()];
            lines.extend(self.ehlo_capabilities());
            self.push_reply(Reply::multiline(Status::Ok, lines));
        }
        Ok(Advance::Transition)
    }

    /// The capabilities advertised after the EHLO greeting line.
    fn ehlo_capabilities(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.authenticator.is_some() {
            lines.push(
                if self.config.enable_auth_login {
                    "AUTH PLAIN LOGIN"
                } else {
                    "AUTH PLAIN"
                }
                .to_string(),
            );
        }
        lines.extend(self.policy.ehlo_lines(&self.message.peer));
        lines.push("HELP".to_string());
        lines
    }

    fn smtp_auth_plain(&mut self, arguments: &str) -> Handled {
        if self.authenticator.is_none() {
            self.reply(Status::AuthFailed, "AUTH not available");
            return Err(Denied::already_replied());
        }

        let credentials = validation::validate_auth_plain(arguments)?;
        let decision = self.policy.accept_auth_plain(
            &credentials.username,
            &credentials.password,
            &self.message,
        );
        let response_sent =
            self.check_policy(decision, Status::Rejected, "Administrative Prohibition")?;
        if response_sent {
            // An accepting AUTH decision must not carry its own reply; the
            // credential check owns the 235/535 exchange. The custom reply
            // is already on the wire, a second one would desync the client,
            // so the command ends here without authenticating.
            internal!(level = ERROR, "policy replied to an accepted AUTH PLAIN");
            return Err(Denied::already_replied());
        }

        self.check_credentials(credentials.username, credentials.password)
    }

    fn smtp_auth_login(&mut self, arguments: &str) -> Handled {
        if !self.config.enable_auth_login {
            self.reply(Status::NotImplemented, "Command not implemented");
            return Err(Denied::already_replied());
        }
        if self.authenticator.is_none() {
            self.reply(Status::AuthFailed, "AUTH not available");
            return Err(Denied::already_replied());
        }

        let username = validation::validate_auth_login(arguments)?;
        let decision = self
            .policy
            .accept_auth_login(username.as_deref(), &self.message);
        let response_sent =
            self.check_policy(decision, Status::Rejected, "Administrative Prohibition")?;
        if response_sent {
            // Same contract as AUTH PLAIN: an accepting decision with a
            // custom reply would collide with the 334 challenge, so the
            // exchange never starts.
            internal!(level = ERROR, "policy replied to an accepted AUTH LOGIN");
            return Err(Denied::already_replied());
        }

        self.auth_login = Some(match username {
            Some(username) => {
                self.challenge("Password:");
                AuthLoginExchange::AwaitingPassword { username }
            }
            None => {
                self.challenge("Username:");
                AuthLoginExchange::AwaitingUsername
            }
        });
        self.parser.switch_to_auth_login_mode();

        // The machine only moves to `authenticated` once the password
        // checked out, over in handle_auth_credentials.
        Ok(Advance::Stay)
    }

    fn challenge(&mut self, prompt: &str) {
        self.reply(Status::AuthContinue, BASE64.encode(prompt.as_bytes()));
    }

    fn check_credentials(&mut self, username: String, password: String) -> Handled {
        let Some(authenticator) = self.authenticator.as_mut() else {
            self.reply(Status::AuthFailed, "AUTH not available");
            return Err(Denied::already_replied());
        };

        if authenticator.authenticate(&username, &password, &self.message.peer) {
            self.message.username = Some(username);
            self.reply(Status::AuthSuccessful, "Authentication successful");
            Ok(Advance::Transition)
        } else {
            self.reply(Status::AuthFailed, "Bad username or password");
            Err(Denied::already_replied())
        }
    }

    fn smtp_mail_from(&mut self, arguments: &str) -> Handled {
        let arguments = validation::validate_mail_from(arguments, self.uses_esmtp())?;
        self.check_announced_size(arguments.size)?;

        let decision = self.policy.accept_from(&arguments.email, &self.message);
        let response_sent =
            self.check_policy(decision, Status::Rejected, "Administrative Prohibition")?;

        self.message.smtp_from = Some(arguments.email);
        self.message.unvalidated_input.extend(arguments.extensions);
        if !response_sent {
            self.reply(Status::Ok, "OK");
        }
        Ok(Advance::Transition)
    }

    /// Early SIZE rejection: the client announced more than we accept, so
    /// turn the transaction down before the payload is on the wire.
    fn check_announced_size(&mut self, announced: Option<usize>) -> Result<(), Denied> {
        let Some(announced) = announced else {
            return Ok(());
        };
        let Some(maximum) = self.max_message_size() else {
            return Ok(());
        };
        if announced > maximum {
            self.reply(Status::ExceededStorage, SIZE_EXCEEDED);
            return Err(Denied::already_replied());
        }
        Ok(())
    }

    fn smtp_rcpt_to(&mut self, arguments: &str) -> Handled {
        let recipient = validation::validate_rcpt_to(arguments)?;
        let decision = self.policy.accept_rcpt_to(&recipient, &self.message);
        let response_sent = self.check_policy(decision, Status::Rejected, "relay not permitted")?;

        self.message.smtp_to.push(recipient);
        if !response_sent {
            self.reply(Status::Ok, "OK");
        }
        Ok(Advance::Transition)
    }

    fn smtp_data(&mut self, arguments: &str) -> Handled {
        validation::validate_no_arguments(arguments)?;
        let decision = self.policy.accept_data(&self.message);
        let response_sent =
            self.check_policy(decision, Status::Rejected, "Administrative Prohibition")?;

        self.parser.switch_to_data_mode();
        if !response_sent {
            self.reply(
                Status::StartMailInput,
                "Enter message, ending with \".\" on a line by itself",
            );
        }
        Ok(Advance::Transition)
    }

    /// Not a real SMTP command: runs when the DATA payload is complete.
    fn smtp_msgdata(&mut self, payload: &str) -> Handled {
        self.parser.switch_to_command_mode();
        self.check_payload_size(payload)?;

        let decision = self.policy.accept_msgdata(payload, &self.message);
        let response_sent =
            self.check_policy(decision, Status::Rejected, "Message content is not acceptable")?;

        self.message.msg_data = Some(payload.to_string());
        let successor = self.message.next_transaction();
        let accepted = mem::replace(&mut self.message, successor);
        self.deliverer.new_message_accepted(accepted);
        // From here on the message must not be lost.
        if !response_sent {
            self.reply(Status::Ok, "OK");
        }
        Ok(Advance::Transition)
    }

    fn check_payload_size(&mut self, payload: &str) -> Result<(), Denied> {
        let Some(maximum) = self.max_message_size() else {
            return Ok(());
        };
        if payload.len() > maximum {
            return Err(Denied::with(Reply::new(Status::ExceededStorage, SIZE_EXCEEDED)));
        }
        Ok(())
    }

    fn smtp_rset(&mut self, arguments: &str) -> Handled {
        validation::validate_no_arguments(arguments)?;
        self.message = self.message.after_reset();
        self.reply(Status::Ok, "Reset OK");
        Ok(Advance::Transition)
    }

    fn smtp_noop(&mut self, arguments: &str) -> Handled {
        validation::validate_no_arguments(arguments)?;
        self.reply(Status::Ok, "OK");
        Ok(Advance::Transition)
    }

    /// RFC 821 allows HELP to carry an argument, so none is rejected.
    fn smtp_help(&mut self, _arguments: &str) -> Handled {
        let commands = self
            .machine
            .known_actions()
            .into_iter()
            .filter(|verb| !matches!(verb, Verb::Greet | Verb::MsgData))
            .map(Verb::wire_word)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>()
            .join(" ");
        self.push_reply(Reply::multiline(
            Status::Help,
            vec!["Commands supported".to_string(), commands],
        ));
        Ok(Advance::Transition)
    }

    fn smtp_quit(&mut self, arguments: &str) -> Handled {
        validation::validate_no_arguments(arguments)?;
        self.reply(
            Status::GoodBye,
            format!("{} closing connection", self.config.hostname),
        );
        self.close_connection();
        Ok(Advance::Transition)
    }

    // --- plumbing -------------------------------------------------------

    fn unrecognized(&mut self, command: &str) {
        self.reply(
            Status::UnrecognizedCommand,
            format!("unrecognized command \"{command}\""),
        );
    }

    fn uses_esmtp(&self) -> bool {
        self.machine.is_set("esmtp")
    }

    fn max_message_size(&mut self) -> Option<usize> {
        self.policy.max_message_size(&self.message.peer)
    }

    /// With `allow_repeated_helo`, a HELO/EHLO on an initialised session
    /// starts over like RSET would.
    fn reset_transaction_on_repeated_helo(&mut self) {
        if self.config.allow_repeated_helo && self.machine.state() == Some(INITIALIZED) {
            self.message = self.message.after_reset();
        }
    }

    /// Apply a policy decision: send its custom reply (if any) and honour
    /// its close requests. Returns whether a response went out, or the
    /// denial to propagate.
    fn check_policy(
        &mut self,
        decision: Decision,
        code: Status,
        default_denial: &str,
    ) -> Result<bool, Denied> {
        let (accepted, response_sent) = self.evaluate(decision);
        if accepted {
            Ok(response_sent)
        } else if response_sent {
            Err(Denied::already_replied())
        } else {
            Err(Denied::with(Reply::new(code, default_denial)))
        }
    }

    fn evaluate(&mut self, decision: Decision) -> (bool, bool) {
        let accepted = decision.is_accepted();
        let mut response_sent = false;

        if decision.should_close_before_response() {
            self.close_connection();
            response_sent = true;
        }
        if decision.should_close_after_response() {
            self.close_after_response = true;
        }
        if let Some(reply) = decision.into_reply() {
            self.push_reply(reply);
            response_sent = true;
        }

        (accepted, response_sent)
    }

    fn reply(&mut self, status: Status, text: impl Into<String>) {
        self.push_reply(Reply::new(status, text));
    }

    fn push_reply(&mut self, reply: Reply) {
        if !self.connected {
            internal!("dropping reply after close: {reply}");
            return;
        }
        outgoing!("{reply}");
        self.actions.push_back(Action::Send(reply));
    }

    /// Idempotent; a policy asking for a double close is fine.
    pub fn close_connection(&mut self) {
        if self.connected {
            self.connected = false;
            self.actions.push_back(Action::Close);
        }
    }
}

fn build_state_machine(config: &SessionConfig) -> Result<StateMachine<Verb>, FsmError> {
    let mut machine = StateMachine::new(NEW);

    machine.add(NEW, GREETED, Verb::Greet, &[], None)?;
    machine.add(GREETED, INITIALIZED, Verb::Helo, &[], None)?;
    machine.add(GREETED, INITIALIZED, Verb::Ehlo, &["set_esmtp"], None)?;

    machine.add(INITIALIZED, SENDER_KNOWN, Verb::MailFrom, &[], None)?;
    machine.add(INITIALIZED, AUTHENTICATED, Verb::AuthPlain, &[], Some("if_esmtp"))?;
    machine.add(INITIALIZED, AUTHENTICATED, Verb::AuthLogin, &[], Some("if_esmtp"))?;
    machine.add(AUTHENTICATED, SENDER_KNOWN, Verb::MailFrom, &[], None)?;

    machine.add(SENDER_KNOWN, RECIPIENT_KNOWN, Verb::RcptTo, &[], None)?;
    machine.add(RECIPIENT_KNOWN, RECIPIENT_KNOWN, Verb::RcptTo, &[], None)?;
    machine.add(RECIPIENT_KNOWN, RECEIVING_MESSAGE, Verb::Data, &[], None)?;
    machine.add(RECEIVING_MESSAGE, INITIALIZED, Verb::MsgData, &[], None)?;

    if config.allow_repeated_helo {
        machine.add(INITIALIZED, INITIALIZED, Verb::Helo, &[], None)?;
        machine.add(INITIALIZED, INITIALIZED, Verb::Ehlo, &["set_esmtp"], None)?;
    }

    // HELP, NOOP and QUIT work from everywhere once the peer was greeted.
    for state in machine.known_states() {
        if state == NEW || state == FINISHED {
            continue;
        }
        machine.add(state, state, Verb::Noop, &[], None)?;
        machine.add(state, state, Verb::Help, &[], None)?;
        machine.add(state, FINISHED, Verb::Quit, &[], None)?;
    }

    for state in machine.known_non_final_states() {
        if state == NEW {
            machine.add(state, state, Verb::Rset, &[], None)?;
        } else {
            machine.add(state, INITIALIZED, Verb::Rset, &[], None)?;
        }
    }

    Ok(machine)
}

#[cfg(test)]
mod test {
    use super::{SessionConfig, build_state_machine};
    use crate::smtp::command::Verb;

    #[test]
    fn auth_is_gated_on_esmtp() {
        let mut machine = build_state_machine(&SessionConfig::default()).unwrap();
        machine.execute(Verb::Greet).unwrap();
        machine.execute(Verb::Helo).unwrap();
        assert!(!machine.allowed_actions().contains(&Verb::AuthPlain));
        assert!(!machine.allowed_actions().contains(&Verb::AuthLogin));

        let mut machine = build_state_machine(&SessionConfig::default()).unwrap();
        machine.execute(Verb::Greet).unwrap();
        machine.execute(Verb::Ehlo).unwrap();
        assert!(machine.is_set("esmtp"));
        assert!(machine.allowed_actions().contains(&Verb::AuthPlain));
        assert!(machine.allowed_actions().contains(&Verb::AuthLogin));
    }

    #[test]
    fn transitions_follow_the_table() {
        let mut machine = build_state_machine(&SessionConfig::default()).unwrap();
        assert_eq!(machine.execute(Verb::Greet), Ok("greeted"));
        assert_eq!(machine.execute(Verb::Helo), Ok("initialized"));
        assert_eq!(machine.execute(Verb::MailFrom), Ok("sender_known"));
        assert_eq!(machine.execute(Verb::RcptTo), Ok("recipient_known"));
        assert_eq!(machine.execute(Verb::RcptTo), Ok("recipient_known"));
        assert_eq!(machine.execute(Verb::Data), Ok("receiving_message"));
        assert_eq!(machine.execute(Verb::MsgData), Ok("initialized"));
        assert_eq!(machine.execute(Verb::Quit), Ok("finished"));
        assert!(machine.allowed_actions().is_empty());
    }

    #[test]
    fn rset_loops_back_to_initialized() {
        let mut machine = build_state_machine(&SessionConfig::default()).unwrap();
        machine.execute(Verb::Greet).unwrap();
        machine.execute(Verb::Helo).unwrap();
        machine.execute(Verb::MailFrom).unwrap();
        assert_eq!(machine.execute(Verb::Rset), Ok("initialized"));
    }

    #[test]
    fn repeated_helo_needs_the_config_switch() {
        let mut machine = build_state_machine(&SessionConfig::default()).unwrap();
        machine.execute(Verb::Greet).unwrap();
        machine.execute(Verb::Helo).unwrap();
        assert!(machine.execute(Verb::Helo).is_err());

        let config = SessionConfig {
            allow_repeated_helo: true,
            ..SessionConfig::default()
        };
        let mut machine = build_state_machine(&config).unwrap();
        machine.execute(Verb::Greet).unwrap();
        machine.execute(Verb::Helo).unwrap();
        assert_eq!(machine.execute(Verb::Ehlo), Ok("initialized"));
        assert!(machine.is_set("esmtp"));
    }
}
