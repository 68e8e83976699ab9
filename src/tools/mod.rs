//! 工具箱：具名、可独立调用的能力集合
//!
//! 每个工具有类型化参数 schema 与结构化（success / error）结果契约。

pub mod experience_lookup;
pub mod kb_search;
pub mod refund;
pub mod registry;
pub mod reservation_lookup;
pub mod schema;
pub mod subscription_lookup;
pub mod user_lookup;

pub use experience_lookup::ExperienceLookupTool;
pub use kb_search::{KnowledgeSearchTool, KNOWLEDGE_SEARCH_TOOL};
pub use refund::RefundTool;
pub use registry::{Tool, ToolRegistry};
pub use reservation_lookup::ReservationLookupTool;
pub use schema::tool_call_schema_json;
pub use subscription_lookup::SubscriptionLookupTool;
pub use user_lookup::UserLookupTool;
