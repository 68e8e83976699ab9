//! 工单工作流集成测试
//!
//! 用预置脚本的 Mock LLM 走完整图：分类 -> 解答 -> （升级），
//! 跨回合用检查点续接状态，覆盖四个端到端场景。

use std::sync::Arc;

use deskhub::config::RetrievalSection;
use deskhub::core::{ConversationState, Message};
use deskhub::llm::MockLlmClient;
use deskhub::retrieval::{KnowledgeArticle, KnowledgeIndex};
use deskhub::tools::{KnowledgeSearchTool, ToolRegistry};
use deskhub::workflow::{CheckpointStore, TicketWorkflow};

const CLASSIFY_LOGIN_CONFIDENT: &str = r#"{"issue_type": "login", "urgency": "high",
    "confidence": 0.9, "tags": "password", "summary": "Password reset request"}"#;

const CLASSIFY_LOGIN_UNSURE: &str = r#"{"issue_type": "login", "urgency": "medium",
    "confidence": 0.3, "tags": null, "summary": "Unclear login problem"}"#;

fn password_kb() -> Vec<KnowledgeArticle> {
    vec![KnowledgeArticle {
        title: "Password Reset".into(),
        content: "Open the app, tap 'Forgot password' and follow the reset link sent to your email."
            .into(),
        tags: Some("login, password, account".into()),
    }]
}

fn tools_with(articles: Vec<KnowledgeArticle>) -> Arc<ToolRegistry> {
    let index = KnowledgeIndex::build(articles, None, &RetrievalSection::default());
    let mut registry = ToolRegistry::new();
    registry.register(KnowledgeSearchTool::new(Arc::new(index)));
    Arc::new(registry)
}

fn workflow<I, S>(responses: I, articles: Vec<KnowledgeArticle>) -> TicketWorkflow
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    TicketWorkflow::new(
        Arc::new(MockLlmClient::with_responses(responses)),
        tools_with(articles),
    )
}

fn fresh_turn(text: &str) -> ConversationState {
    let mut state = ConversationState::new("t-1", "u-1", "cultpass");
    state.messages.push(Message::user(text));
    state
}

/// 场景 1：无历史分类的密码问题，分类 -> 解答，知识库命中后引用作答
#[tokio::test]
async fn scenario_1_grounded_resolution() {
    let workflow = workflow(
        [
            CLASSIFY_LOGIN_CONFIDENT,
            "As our Password Reset guide explains, tap 'Forgot password' in the app \
             and follow the emailed link.",
        ],
        password_kb(),
    );
    let mut state = fresh_turn("How do I reset my login password?");

    workflow.invoke(&mut state).await;

    let classification = state.classification.as_ref().expect("classified");
    assert_eq!(classification.issue_type.as_str(), "login");
    assert!(state.resolution_attempted);
    assert!(!state.escalation_requested);
    assert!(!state.escalated);
    assert!(state
        .last_assistant_message()
        .unwrap()
        .content
        .contains("Password Reset guide"));
}

/// 场景 2：知识库零命中 -> 解答方不再调用答案模型，直接请求升级；
/// escalated 仍为 false（该位只属于升级智能体）
#[tokio::test]
async fn scenario_2_empty_retrieval_forces_escalation_request() {
    let workflow = workflow([CLASSIFY_LOGIN_CONFIDENT, "SHOULD NOT BE USED"], vec![]);
    let mut state = fresh_turn("How do I reset my login password?");

    workflow.invoke(&mut state).await;

    assert!(state.resolution_attempted);
    assert!(state.escalation_requested);
    assert!(!state.escalated);
    assert!(state
        .messages
        .iter()
        .all(|m| !m.content.contains("SHOULD NOT BE USED")));
    assert!(state
        .last_assistant_message()
        .unwrap()
        .content
        .contains("human support"));
}

/// 场景 3：低置信度分类 -> 本回合解答方直接请求升级，
/// 下一回合升级智能体接手并置位 escalated
#[tokio::test]
async fn scenario_3_low_confidence_escalates_across_turns() {
    let checkpoints = CheckpointStore::new();

    // 第一回合
    let turn1 = workflow([CLASSIFY_LOGIN_UNSURE], password_kb());
    let mut state = fresh_turn("something wrong, maybe login? or not");
    turn1.invoke(&mut state).await;
    assert!(state.escalation_requested);
    assert!(state.resolution_attempted);
    assert!(!state.escalated);
    checkpoints.save("t-1", state.to_checkpoint());

    // 第二回合：从检查点恢复，路由规则 2 直送升级节点
    let turn2 = workflow(
        ["I'm sorry this wasn't resolved; a specialist will take over your case."],
        password_kb(),
    );
    let checkpoint = checkpoints.load("t-1").unwrap();
    let mut state = ConversationState::resume(checkpoint, "t-1", "u-1", "cultpass");
    state.messages.push(Message::user("okay, please do"));
    turn2.invoke(&mut state).await;

    assert!(state.escalated);
    assert!(state.escalation_requested);
    let handoff = state.last_assistant_message().unwrap();
    assert!(handoff.content.contains("Ticket reference: ESC-"));
}

/// 场景 4：成功解答后用户致谢 -> 直接 End，无升级、无新智能体输出
#[tokio::test]
async fn scenario_4_satisfied_user_ends_turn() {
    let checkpoints = CheckpointStore::new();

    let turn1 = workflow(
        [
            CLASSIFY_LOGIN_CONFIDENT,
            "Tap 'Forgot password' in the app to receive a reset link.",
        ],
        password_kb(),
    );
    let mut state = fresh_turn("How do I reset my login password?");
    turn1.invoke(&mut state).await;
    assert!(state.resolution_attempted);
    checkpoints.save("t-1", state.to_checkpoint());

    let turn2 = workflow(["SHOULD NOT BE USED"], password_kb());
    let checkpoint = checkpoints.load("t-1").unwrap();
    let mut state = ConversationState::resume(checkpoint, "t-1", "u-1", "cultpass");
    let answers_before = state
        .messages
        .iter()
        .filter(|m| m.content.contains("reset link"))
        .count();
    state.messages.push(Message::user("thanks, that solved it"));
    turn2.invoke(&mut state).await;

    assert!(!state.escalation_requested);
    assert!(!state.escalated);
    // 没有新的助手输出，最新助手消息仍是上一回合的解答
    let answers_after = state
        .messages
        .iter()
        .filter(|m| m.content.contains("reset link"))
        .count();
    assert_eq!(answers_before, answers_after);
    assert!(state
        .last_assistant_message()
        .unwrap()
        .content
        .contains("reset link"));
}

/// 解答完成后用户点名要人工：规则 5a 当回合交接
#[tokio::test]
async fn explicit_human_request_escalates_in_same_turn() {
    let checkpoints = CheckpointStore::new();

    let turn1 = workflow(
        [
            CLASSIFY_LOGIN_CONFIDENT,
            "Tap 'Forgot password' in the app to receive a reset link.",
        ],
        password_kb(),
    );
    let mut state = fresh_turn("How do I reset my login password?");
    turn1.invoke(&mut state).await;
    checkpoints.save("t-1", state.to_checkpoint());

    let turn2 = workflow(
        ["Understood - routing you to a human specialist right away."],
        password_kb(),
    );
    let checkpoint = checkpoints.load("t-1").unwrap();
    let mut state = ConversationState::resume(checkpoint, "t-1", "u-1", "cultpass");
    state.messages.push(Message::user("that didn't work, let me speak to a manager"));
    turn2.invoke(&mut state).await;

    assert!(state.escalated);
    assert!(state.escalation_requested);
    assert!(state
        .last_assistant_message()
        .unwrap()
        .content
        .contains("Ticket reference: ESC-"));
}
