use core::fmt::{self, Display, Formatter};

/// The reply codes the protocol core emits.
#[repr(u16)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Debug)]
pub enum Status {
    Help = 214,
    ServiceReady = 220,
    GoodBye = 221,
    AuthSuccessful = 235,
    Ok = 250,
    AuthContinue = 334,
    StartMailInput = 354,
    TemporaryFailure = 451,
    UnrecognizedCommand = 500,
    SyntaxError = 501,
    NotImplemented = 502,
    InvalidCommandSequence = 503,
    AuthFailed = 535,
    Rejected = 550,
    ExceededStorage = 552,
    Unavailable = 554,
}

impl Display for Status {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(fmt, "{}", *self as u16)
    }
}

impl From<Status> for u16 {
    fn from(status: Status) -> Self {
        status as Self
    }
}
