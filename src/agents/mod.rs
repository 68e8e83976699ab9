//! 智能体：路由器、分类、解答、升级

pub mod classifier;
pub mod escalation;
pub mod resolver;
pub mod supervisor;

pub use classifier::ClassifierAgent;
pub use escalation::{ticket_reference, EscalationAgent};
pub use resolver::ResolverAgent;
pub use supervisor::{route, RouteDecision, RouteTarget};

/// 从 LLM 输出中提取 JSON 块（```json 围栏或首个对象 / 数组区间）
pub(crate) fn extract_json(output: &str) -> Option<&str> {
    let trimmed = output.trim();

    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return Some(rest.find("```").map(|end| rest[..end].trim()).unwrap_or_else(|| rest.trim()));
    }

    let first_obj = trimmed.find('{');
    let first_arr = trimmed.find('[');
    match (first_obj, first_arr) {
        (Some(o), Some(a)) if a < o => span(trimmed, a, ']'),
        (Some(o), _) => span(trimmed, o, '}'),
        (None, Some(a)) => span(trimmed, a, ']'),
        (None, None) => None,
    }
}

fn span(text: &str, start: usize, close: char) -> Option<&str> {
    text.rfind(close)
        .filter(|end| *end > start)
        .map(|end| &text[start..=end])
}
