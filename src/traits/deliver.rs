use crate::smtp::envelope::Message;

/// Takes custody of accepted messages (drop them into a mailbox, forward
/// them, hand them to a spool, ...).
///
/// The deliverer is shared by all connections and must tolerate concurrent
/// calls. A message can no longer be rejected here: the transaction has
/// already been acknowledged on the wire, so problems must be handled with
/// a non-delivery report.
pub trait Deliverer: Send + Sync {
    fn new_message_accepted(&self, message: Message);
}
