use crate::smtp::envelope::Peer;

/// Checks whether credentials presented via AUTH PLAIN / AUTH LOGIN are
/// correct, possibly against an external subsystem. One instance per client
/// connection.
pub trait Authenticator: Send {
    fn authenticate(&mut self, username: &str, password: &str, peer: &Peer) -> bool;
}
