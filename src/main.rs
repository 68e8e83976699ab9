//! Deskhub - 多智能体客服工单系统
//!
//! 入口：初始化日志、构建应用上下文，并运行控制台对话循环。

use std::io::Write;

use anyhow::Context;

use deskhub::config::{load_config, AppConfig};
use deskhub::{observability, HubApp};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = load_config(None).unwrap_or_else(|e| {
        eprintln!("Config load failed ({e}), using defaults");
        AppConfig::default()
    });
    observability::init(cfg.log.json);

    let app = HubApp::new(cfg).context("Failed to build application context")?;
    // 每次进程启动开一个新的会话 thread
    let thread_id = uuid::Uuid::new_v4().to_string();

    println!("Deskhub Customer Support");
    println!("Type 'quit', 'exit' or 'q' to end the conversation, 'history' to list past tickets.\n");

    let stdin = std::io::stdin();
    loop {
        print!("User: ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if ["quit", "exit", "q"].contains(&input.to_lowercase().as_str()) {
            println!("Assistant: Goodbye! Thank you for contacting support.");
            break;
        }
        if input.eq_ignore_ascii_case("history") {
            print_history(&app);
            continue;
        }

        let reply = app
            .send(
                &thread_id,
                &app.config().app.user_id,
                &app.config().app.account_id,
                input,
            )
            .await;
        println!("Assistant: {reply}\n");
    }

    Ok(())
}

fn print_history(app: &HubApp) {
    let cfg = app.config();
    match app
        .store()
        .conversation_history(&cfg.app.account_id, &cfg.app.user_id, 5)
    {
        Ok(histories) if histories.is_empty() => println!("(no stored tickets)\n"),
        Ok(histories) => {
            for h in histories {
                println!(
                    "- {} [{}] {} ({} messages)",
                    h.ticket_id,
                    h.status,
                    h.issue_type.unwrap_or_else(|| "unclassified".to_string()),
                    h.messages.len()
                );
            }
            println!();
        }
        Err(e) => println!("History unavailable: {e}\n"),
    }
}
