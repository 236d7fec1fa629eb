//! Conversation context: the turn log, its compaction policy, and the token
//! estimator both rely on.
//!
//! | Piece | Role |
//! |-------|------|
//! | [`ConversationState`] | Owns the turn log and builds the model view |
//! | [`CompactionPolicy`] | Decides when to compact and where to split |
//! | [`Summarizer`] | Folds evicted turns into the rolling summary |
//! | [`token`] | 4-chars-per-token estimator |

pub mod compaction;
pub mod conversation;
pub mod token;

pub use compaction::{CompactionPolicy, GatewaySummarizer, Summarizer, Summary};
pub use conversation::ConversationState;
