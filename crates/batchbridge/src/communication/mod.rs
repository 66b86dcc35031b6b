mod message;
mod pending;
mod submission;

pub use message::{CorrelationId, ErrorPayload, Inbound, Outbound, Reply};
pub use pending::PendingReply;
pub(crate) use submission::{Slot, Submission};
