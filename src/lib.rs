//! An embeddable SMTP/ESMTP server library.
//!
//! `mailgate` runs the SMTP conversation and nothing else: the host
//! application decides what to accept (a [`Policy`]), how to check
//! credentials (an [`Authenticator`]), and what happens to accepted
//! messages (a [`Deliverer`]). There is no queueing, routing, or
//! persistence in here.

pub mod fsm;
pub mod listener;
pub mod logging;
pub mod server;
pub mod smtp;
pub mod test_util;
pub mod traits;

pub use tracing;

pub use crate::{
    server::{Server, Signal},
    smtp::{
        envelope::{Message, Peer},
        reply::Reply,
        session::{Session, SessionConfig},
    },
    traits::{
        auth::Authenticator,
        deliver::Deliverer,
        policy::{Decision, DefaultPolicy, Policy},
    },
};
