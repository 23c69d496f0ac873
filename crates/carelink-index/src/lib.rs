//! Conversation index: derives inboxes, transcripts and read state from a
//! flat log of directed messages. Conversations are never stored; every
//! view is recomputed from the log on each call.

pub mod error;
pub mod index;
pub mod memory;
pub mod store;

pub use error::IndexError;
pub use index::ConversationIndex;
pub use memory::MemoryStore;
pub use store::{MessageStore, NewMessage};
