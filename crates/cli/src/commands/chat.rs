//! `macrosage chat` — One-shot question from the terminal.

use std::sync::Arc;
use std::time::Duration;

use macrosage_agent::{AgentLoop, ChatService, ContextAssembler, Reasoner, ToolDispatcher};
use macrosage_config::AppConfig;
use macrosage_core::store::MemoryStore;
use macrosage_memory::SqliteStore;
use macrosage_reasoner::OpenAiCompatBackend;
use macrosage_tools::{UpstreamClients, default_registry};

pub async fn run(user_id: &str, message: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for an API key early — give a clear error
    if config.llm.api_key.is_none() {
        eprintln!();
        eprintln!("  ERROR: No LLM API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    MACROSAGE_API_KEY = 'sk-...'");
        eprintln!("    OPENAI_API_KEY    = 'sk-...'");
        eprintln!();
        eprintln!("  Or add api_key to the [llm] section of macrosage.toml.");
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let store: Arc<dyn MemoryStore> = Arc::new(SqliteStore::new(&config.database.path).await?);
    let clients = UpstreamClients::from_config(&config.upstream)?;
    let registry = Arc::new(default_registry(&clients));

    let backend = OpenAiCompatBackend::new(
        &config.llm.base_url,
        config.llm.api_key.clone().unwrap_or_default(),
    )?;
    let agent = AgentLoop::new(
        Reasoner::new(
            Arc::new(backend),
            &config.llm.model,
            config.llm.temperature,
            config.llm.max_tokens,
        ),
        ToolDispatcher::new(registry, Duration::from_secs(config.agent.tool_timeout_secs)),
        ContextAssembler::new(
            config.agent.context_budget_chars,
            config.agent.history_limit as usize,
        ),
        config.agent.max_iterations,
    );
    let service = ChatService::new(agent, store, config.agent.history_limit);

    eprint!("  Thinking...");
    let turn = service.chat(user_id, message).await?;
    eprint!("\r             \r");

    println!("{}", turn.response);
    if !turn.tools_used.is_empty() {
        eprintln!();
        eprintln!(
            "  [data: {} | rounds: {}]",
            turn.tools_used.join(", "),
            turn.iterations
        );
    }

    Ok(())
}
