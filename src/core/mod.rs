//! 核心：状态与错误

pub mod error;
pub mod state;

pub use error::AgentError;
pub use state::{
    Checkpoint, Classification, ConversationState, IssueType, Message, Role, Urgency,
};
