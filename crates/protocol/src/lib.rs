//! Wire protocol for FileDepot client-server communication.
//!
//! All control traffic is a JSON envelope ([`envelope::Message`]) over a
//! transport that guarantees in-order, reliable delivery within one
//! connection. File bytes travel as binary chunk frames ([`frame`]), never
//! inside JSON.

pub mod constants;
pub mod envelope;
pub mod frame;
pub mod messages;
pub mod types;

pub use constants::MessageType;
pub use envelope::{Message, WsError};
pub use frame::{ChunkHeader, FrameError, encode_chunk_frame, parse_chunk_frame};
pub use types::{ObjectInfo, TierOfRecord};
