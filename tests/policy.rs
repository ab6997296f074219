//! Every decision point can be controlled by a policy, and every return
//! shape of a policy decision is honoured.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use pretty_assertions::assert_eq;

use mailgate::{
    Decision, Message, Peer, Policy, Reply,
    test_util::{DummyAuthenticator, SessionHarness},
};

fn b64(value: &str) -> String {
    BASE64.encode(value.as_bytes())
}

#[test]
fn connection_can_be_rejected() {
    struct FalsePolicy;
    impl Policy for FalsePolicy {
        fn accept_new_connection(&mut self, _peer: &Peer) -> Decision {
            Decision::reject()
        }
    }

    let harness = SessionHarness::with_policy(FalsePolicy);
    assert!(!harness.is_open());
    assert_eq!(harness.replies().len(), 1);
    let reply = harness.last_reply();
    assert_eq!(reply.code(), 554);
    assert_eq!(reply.text(), "SMTP service not available");
}

#[test]
fn decisions_convert_from_bool() {
    assert!(Decision::from(true).is_accepted());
    assert!(!Decision::from(false).is_accepted());
}

#[test]
fn connection_rejection_may_carry_a_custom_reply() {
    struct CustomCodePolicy;
    impl Policy for CustomCodePolicy {
        fn accept_new_connection(&mut self, _peer: &Peer) -> Decision {
            Decision::reject_with_reply(Reply::new(553u16, "Go away"))
        }
    }

    let harness = SessionHarness::with_policy(CustomCodePolicy);
    assert!(!harness.is_open());
    assert_eq!(harness.replies().len(), 1);
    let reply = harness.last_reply();
    assert_eq!(reply.code(), 553);
    assert_eq!(reply.text(), "Go away");
}

#[test]
fn custom_replies_may_be_multiline() {
    struct CustomCodePolicy;
    impl Policy for CustomCodePolicy {
        fn accept_new_connection(&mut self, _peer: &Peer) -> Decision {
            Decision::reject_with_reply(Reply::multiline(
                552u16,
                vec!["Go away".to_string(), "Evil IP".to_string()],
            ))
        }
    }

    let harness = SessionHarness::with_policy(CustomCodePolicy);
    assert_eq!(harness.replies().len(), 1);
    let reply = harness.last_reply();
    assert_eq!(reply.code(), 552);
    assert_eq!(reply.lines(), &["Go away".to_string(), "Evil IP".to_string()]);
    assert!(!harness.is_open());
}

#[test]
fn helo_can_be_rejected_conditionally() {
    struct LocalhostOnly;
    impl Policy for LocalhostOnly {
        fn accept_helo(&mut self, helo: &str, _message: &Message) -> Decision {
            Decision::from(helo == "localhost")
        }
    }

    let mut harness = SessionHarness::with_policy(LocalhostOnly);
    harness.send_invalid("HELO", Some("foo.example.com"));
    harness.send_invalid("HELO", Some("bar.example.net"));
    harness.send_valid("HELO", Some("localhost"));
}

#[test]
fn rejected_helo_uses_the_default_denial() {
    struct FalsePolicy;
    impl Policy for FalsePolicy {
        fn accept_helo(&mut self, _helo: &str, _message: &Message) -> Decision {
            Decision::reject()
        }
    }

    let mut harness = SessionHarness::with_policy(FalsePolicy);
    let reply = harness.send_invalid("HELO", Some("foo.example.com"));
    assert_eq!(reply.code(), 550);
    assert_eq!(reply.text(), "Administrative Prohibition");
}

#[test]
fn helo_denial_may_carry_a_custom_reply() {
    struct TiredPolicy;
    impl Policy for TiredPolicy {
        fn accept_helo(&mut self, _helo: &str, _message: &Message) -> Decision {
            Decision::reject_with_reply(Reply::new(553u16, "I am tired"))
        }
    }

    let mut harness = SessionHarness::with_policy(TiredPolicy);
    let reply = harness.send_invalid("HELO", Some("foo.example.com"));
    assert_eq!(reply.code(), 553);
    assert_eq!(reply.text(), "I am tired");
}

#[test]
fn connection_can_close_after_a_custom_reply() {
    struct SpammerPolicy;
    impl Policy for SpammerPolicy {
        fn accept_helo(&mut self, _helo: &str, _message: &Message) -> Decision {
            Decision::reject_with_reply(Reply::new(552u16, "Stupid Spammer")).close_after_response()
        }
    }

    let mut harness = SessionHarness::with_policy(SpammerPolicy);
    let reply = harness.send_invalid("HELO", Some("foo.example.com"));
    assert_eq!(reply.code(), 552);
    assert_eq!(reply.text(), "Stupid Spammer");
    assert!(!harness.is_open());
}

#[test]
fn connection_can_close_without_any_response() {
    struct SilentDropPolicy;
    impl Policy for SilentDropPolicy {
        fn accept_helo(&mut self, _helo: &str, _message: &Message) -> Decision {
            Decision::reject().close_before_response()
        }
    }

    let mut harness = SessionHarness::with_policy(SilentDropPolicy);
    let replies_before = harness.replies().len();
    harness.process(b"HELO foo.example.com\r\n");
    assert_eq!(harness.replies().len(), replies_before);
    assert!(!harness.is_open());
}

#[test]
fn connection_can_close_after_the_default_response() {
    struct ClosingPolicy;
    impl Policy for ClosingPolicy {
        fn accept_helo(&mut self, _helo: &str, _message: &Message) -> Decision {
            Decision::reject().close_after_response()
        }
    }

    let mut harness = SessionHarness::with_policy(ClosingPolicy);
    let reply = harness.send_invalid("HELO", Some("foo.example.com"));
    assert_eq!(reply.code(), 550);
    assert_eq!(reply.text(), "Administrative Prohibition");
    assert!(!harness.is_open());
}

#[test]
fn connection_can_close_after_a_positive_response() {
    struct OneShotPolicy;
    impl Policy for OneShotPolicy {
        fn accept_helo(&mut self, _helo: &str, _message: &Message) -> Decision {
            Decision::accept().close_after_response()
        }
    }

    let mut harness = SessionHarness::with_policy(OneShotPolicy);
    harness.send_valid("HELO", Some("foo.example.com"));
    assert!(!harness.is_open());
}

#[test]
fn double_close_does_not_panic() {
    struct DoubleClosePolicy;
    impl Policy for DoubleClosePolicy {
        fn accept_helo(&mut self, _helo: &str, _message: &Message) -> Decision {
            Decision::accept()
                .close_before_response()
                .close_after_response()
        }
    }

    let mut harness = SessionHarness::with_policy(DoubleClosePolicy);
    let replies_before = harness.replies().len();
    harness.process(b"HELO foo.example.com\r\n");
    assert_eq!(harness.replies().len(), replies_before);
    assert!(!harness.is_open());
}

#[test]
fn auth_plain_can_be_rejected() {
    struct FalsePolicy;
    impl Policy for FalsePolicy {
        fn accept_auth_plain(
            &mut self,
            _username: &str,
            _password: &str,
            _message: &Message,
        ) -> Decision {
            Decision::reject()
        }
    }

    let mut harness =
        SessionHarness::with(Some(Box::new(FalsePolicy)), Some(Box::new(DummyAuthenticator)));
    harness.send_valid("EHLO", Some("foo.example.com"));
    harness.send_invalid("AUTH PLAIN", Some(&b64("\0foo\0foo")));
}

#[test]
fn accepted_auth_plain_with_custom_reply_does_not_double_reply() {
    struct ChattyPolicy;
    impl Policy for ChattyPolicy {
        fn accept_auth_plain(
            &mut self,
            _username: &str,
            _password: &str,
            _message: &Message,
        ) -> Decision {
            Decision::accept_with_reply(Reply::new(250u16, "looks fine to me"))
        }
    }

    let mut harness =
        SessionHarness::with(Some(Box::new(ChattyPolicy)), Some(Box::new(DummyAuthenticator)));
    harness.send_valid("EHLO", Some("foo.example.com"));

    // Only the policy's reply goes out; the credential exchange is aborted
    // and the session is not authenticated.
    let reply = harness.send("AUTH PLAIN", Some(&b64("\0foo\0foo")));
    assert_eq!(reply.code(), 250);
    assert_eq!(reply.text(), "looks fine to me");
    assert_eq!(harness.session.state(), Some("initialized"));
}

#[test]
fn accepted_auth_login_with_custom_reply_does_not_start_the_exchange() {
    struct ChattyPolicy;
    impl Policy for ChattyPolicy {
        fn accept_auth_login(&mut self, _username: Option<&str>, _message: &Message) -> Decision {
            Decision::accept_with_reply(Reply::new(250u16, "go ahead"))
        }
    }

    let mut harness =
        SessionHarness::with(Some(Box::new(ChattyPolicy)), Some(Box::new(DummyAuthenticator)));
    harness.send_valid("EHLO", Some("foo.example.com"));

    let reply = harness.send("AUTH LOGIN", None);
    assert_eq!(reply.code(), 250);
    assert_eq!(reply.text(), "go ahead");
    assert_eq!(harness.session.state(), Some("initialized"));

    // No 334 challenge was issued, so a credential line is garbage.
    let reply = harness.send_auth_credentials(&b64("foo"));
    assert_eq!(reply.code(), 501);
}

#[test]
fn auth_login_can_be_rejected() {
    struct FalsePolicy;
    impl Policy for FalsePolicy {
        fn accept_auth_login(&mut self, _username: Option<&str>, _message: &Message) -> Decision {
            Decision::reject()
        }
    }

    let mut harness =
        SessionHarness::with(Some(Box::new(FalsePolicy)), Some(Box::new(DummyAuthenticator)));
    harness.send_valid("EHLO", Some("foo.example.com"));
    harness.send_invalid("AUTH LOGIN", None);
}

#[test]
fn mail_from_can_be_rejected() {
    struct FalsePolicy;
    impl Policy for FalsePolicy {
        fn accept_from(&mut self, _sender: &str, _message: &Message) -> Decision {
            Decision::reject()
        }
    }

    let mut harness = SessionHarness::with_policy(FalsePolicy);
    harness.send_valid("HELO", Some("foo.example.com"));
    harness.send_invalid("MAIL FROM", Some("foo@example.com"));
}

#[test]
fn rcpt_to_can_be_rejected() {
    struct FalsePolicy;
    impl Policy for FalsePolicy {
        fn accept_rcpt_to(&mut self, _recipient: &str, _message: &Message) -> Decision {
            Decision::reject()
        }
    }

    let mut harness = SessionHarness::with_policy(FalsePolicy);
    harness.send_valid("HELO", Some("foo.example.com"));
    harness.send_valid("MAIL FROM", Some("foo@example.com"));
    let reply = harness.send_invalid("RCPT TO", Some("to@example.com"));
    assert_eq!(reply.code(), 550);
    assert_eq!(reply.text(), "relay not permitted");
}

#[test]
fn data_can_be_rejected() {
    struct FalsePolicy;
    impl Policy for FalsePolicy {
        fn accept_data(&mut self, _message: &Message) -> Decision {
            Decision::reject()
        }
    }

    let mut harness = SessionHarness::with_policy(FalsePolicy);
    harness.send_valid("HELO", Some("foo.example.com"));
    harness.send_valid("MAIL FROM", Some("foo@example.com"));
    harness.send_valid("RCPT TO", Some("to@example.com"));
    harness.send_invalid("DATA", None);
}

#[test]
fn message_content_can_be_rejected() {
    struct FalsePolicy;
    impl Policy for FalsePolicy {
        fn accept_msgdata(&mut self, _data: &str, _message: &Message) -> Decision {
            Decision::reject()
        }
    }

    let mut harness = SessionHarness::with_policy(FalsePolicy);
    harness.send_valid("HELO", Some("foo.example.com"));
    harness.send_valid("MAIL FROM", Some("foo@example.com"));
    harness.send_valid("RCPT TO", Some("to@example.com"));
    harness.send_expecting("DATA", None, 3);
    let reply = harness.send_invalid("MSGDATA", Some("Subject: Test\n\nJust testing...\n"));
    assert_eq!(reply.code(), 550);
    assert_eq!(reply.text(), "Message content is not acceptable");
    assert!(harness.received_messages().is_empty());
}

#[test]
fn oversized_messages_are_rejected_and_never_delivered() {
    struct MaxSizePolicy;
    impl Policy for MaxSizePolicy {
        fn max_message_size(&mut self, _peer: &Peer) -> Option<usize> {
            Some(100)
        }
    }

    let mut harness = SessionHarness::with_policy(MaxSizePolicy);
    harness.send_valid("HELO", Some("foo.example.com"));
    harness.send_valid("MAIL FROM", Some("foo@example.com"));
    harness.send_valid("RCPT TO", Some("to@example.com"));
    harness.send_expecting("DATA", None, 3);

    let big_chunk = format!("{}\n", "x".repeat(70)).repeat(1500);
    let payload = format!("Subject: Test\n\nJust testing...\n{big_chunk}");
    let reply = harness.send_invalid("MSGDATA", Some(&payload));
    assert_eq!(reply.code(), 552);
    assert_eq!(reply.text(), "message exceeds fixed maximum message size");
    assert!(harness.received_messages().is_empty());
}

#[test]
fn rejected_message_leaves_the_session_usable() {
    struct FirstMessagePolicy {
        rejected: bool,
    }
    impl Policy for FirstMessagePolicy {
        fn accept_msgdata(&mut self, _data: &str, _message: &Message) -> Decision {
            if self.rejected {
                Decision::accept()
            } else {
                self.rejected = true;
                Decision::reject()
            }
        }
    }

    let mut harness = SessionHarness::with_policy(FirstMessagePolicy { rejected: false });
    harness.send_valid("HELO", Some("foo.example.com"));
    harness.send_valid("MAIL FROM", Some("foo@example.com"));
    harness.send_valid("RCPT TO", Some("to@example.com"));
    harness.send_expecting("DATA", None, 3);
    harness.send_invalid("MSGDATA", Some("unwanted\n"));

    // The session survives the rejection; a fresh transaction goes through.
    harness.send_valid("RSET", None);
    harness.send_valid("MAIL FROM", Some("foo@example.com"));
    harness.send_valid("RCPT TO", Some("to@example.com"));
    harness.send_expecting("DATA", None, 3);
    harness.send_valid("MSGDATA", Some("wanted\n"));
    let messages = harness.received_messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].msg_data.as_deref(), Some("wanted\n"));
}
