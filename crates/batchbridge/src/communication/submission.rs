use tokio::sync::oneshot::Sender;
use super::message::Reply;

/// Single-capacity rendezvous a caller waits on for its one reply.
pub(crate) type Slot<Y> = Sender<Reply<Y>>;

/// # Submission
///
/// An item handed to the dispatch loop together with the slot its reply
/// must be delivered into.
///
/// ## Type Parameters
///
/// * `X` - The item to be predicted
/// * `Y` - The prediction the caller is waiting for
pub(crate) struct Submission<X, Y> {
    item: X,
    slot: Slot<Y>,
}

impl<X, Y> Submission<X, Y> {
    pub fn new(item: X, slot: Slot<Y>) -> Self {
        Self { item, slot }
    }

    #[cfg(test)]
    pub fn item(&self) -> &X {
        &self.item
    }

    /// Splits the submission so the slot can be registered while the item is sent.
    pub fn into_parts(self) -> (X, Slot<Y>) {
        (self.item, self.slot)
    }
}
