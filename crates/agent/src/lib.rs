//! The core agent loop for grokcli.
//!
//! One user turn follows a **call → act → observe** cycle:
//!
//! 1. **Receive** a user message from the front end
//! 2. **Compact** older turns into a summary if the history is too large
//! 3. **Call the model** through the retrying [`ModelGateway`]
//! 4. **If tool calls**: execute them in order, append results, go to 2
//! 5. **If text**: that is the answer for this turn
//!
//! The loop stops at the first plain answer, the iteration cap or the turn
//! timeout. Token usage and caught errors are kept in [`SessionMetrics`] for
//! the status line.

pub mod context;
pub mod gateway;
pub mod loop_runner;
pub mod metrics;
pub mod prompt;

pub use context::{CompactionPolicy, ConversationState, GatewaySummarizer, Summarizer, Summary};
pub use gateway::{
    GatewayResponse, ModelGateway, RequestQuirks, RetryPolicy, Sleeper, TokioSleeper,
    normalize_request,
};
pub use loop_runner::Agent;
pub use metrics::{SessionMetrics, TokenUsage};
