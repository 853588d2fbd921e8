// File: `crates/permit-core/src/lib.rs`
pub mod clock;
pub mod message;
pub mod protocol;

pub use clock::{LamportClock, RequestStamp};
pub use message::{Message, NodeId};
pub use protocol::{Phase, ProtocolState, ReplyDecision};
