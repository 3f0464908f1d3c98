//! Chorus CLI: chat with a model that can call tools on MCP servers.

use anyhow::{Context, Result};
use chorus_api::AnthropicGateway;
use chorus_config::{ChorusConfig, CliOverrides, load_servers_file};
use chorus_core::{Chat, ConversationLoop, LoopConfig, LoopEvent, RetryConfig};
use chorus_mcp::{LifecycleManager, McpServersConfig, ServerSources, SessionRegistry};
use chorus_types::{ChatRequest, Message, Usage, preview};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// How much of a tool's input or output is echoed to the terminal.
const PREVIEW_BYTES: usize = 200;

#[derive(Parser)]
#[command(
    name = "chorus",
    version,
    about = "Chat with a language model that can call tools on MCP servers"
)]
struct Cli {
    /// MCP server scripts to launch (.py runs under python, .js under node)
    scripts: Vec<PathBuf>,

    /// File declaring MCP servers as {"mcpServers": {...}} (JSON or .toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Send a single prompt and print the answer (non-interactive)
    #[arg(short, long, conflicts_with = "request")]
    prompt: Option<String>,

    /// Answer a chat request read from a JSON file and print the JSON response
    #[arg(long)]
    request: Option<PathBuf>,

    /// Print the tools offered by the connected servers and exit
    #[arg(long)]
    list_tools: bool,

    /// Model to use
    #[arg(long)]
    model: Option<String>,

    /// Maximum tokens in each model response
    #[arg(long)]
    max_tokens: Option<u32>,

    /// API key (overrides ANTHROPIC_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Maximum model calls per conversation
    #[arg(long)]
    max_turns: Option<usize>,

    /// Enable verbose/debug logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let config = ChorusConfig::load(CliOverrides {
        api_key: cli.api_key.clone(),
        model: cli.model.clone(),
        max_tokens: cli.max_tokens,
        max_turns: cli.max_turns,
        servers_file: cli.config.clone(),
    })
    .context("Failed to load configuration")?;

    let sources = server_sources(&cli, &config)?;
    let manager = LifecycleManager::start(&sources)
        .await
        .context("Failed to start MCP servers")?;
    tracing::debug!(
        "Connected {} MCP server(s) offering {} tool(s)",
        manager.registry().len(),
        manager.registry().catalog().len()
    );

    let result = run(&cli, &config, manager.shared_registry()).await;

    let report = manager.stop().await;
    if !report.is_clean() {
        eprintln!(
            "Warning: {} MCP server(s) did not shut down cleanly",
            report.failures.len()
        );
    }
    result
}

/// Scripts on the command line win over the servers file.
fn server_sources(cli: &Cli, config: &ChorusConfig) -> Result<ServerSources> {
    if !cli.scripts.is_empty() {
        return Ok(ServerSources::Scripts(cli.scripts.clone()));
    }
    let servers = match &config.servers_file {
        Some(path) => load_servers_file(path).context("Failed to load MCP server declarations")?,
        None => McpServersConfig::default(),
    };
    Ok(ServerSources::Config(servers))
}

async fn run(cli: &Cli, config: &ChorusConfig, registry: Arc<SessionRegistry>) -> Result<()> {
    if cli.list_tools {
        print_tools(&registry);
        return Ok(());
    }

    let gateway = AnthropicGateway::new(
        config.require_api_key()?,
        &config.api_base_url,
        &config.model,
        config.max_tokens,
    )
    .context("Failed to create API client")?;
    tracing::debug!(
        "Using model {} (max_tokens {})",
        gateway.model(),
        gateway.max_tokens()
    );

    let loop_config = LoopConfig {
        max_turns: config.max_turns,
        retry: RetryConfig {
            max_retries: config.max_retries,
            ..RetryConfig::default()
        },
        annotate_tool_calls: config.annotate_tool_calls,
    };
    let chat = Chat::new(Arc::new(gateway), registry, loop_config);

    if let Some(prompt) = &cli.prompt {
        let outcome = chat
            .conversation()
            .run_with_events(vec![Message::user_text(prompt)], print_event)
            .await?;
        println!("{}", outcome.answer);
        print_usage(&outcome.usage);
        return Ok(());
    }

    if let Some(path) = &cli.request {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let request: ChatRequest = serde_json::from_str(&text)
            .with_context(|| format!("Invalid chat request in {}", path.display()))?;
        let response = chat.respond(request).await;
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    repl(chat.conversation(), config).await
}

async fn repl(conversation: &ConversationLoop, config: &ChorusConfig) -> Result<()> {
    let stdin = io::stdin();
    let mut history: Vec<Message> = Vec::new();
    let mut total_usage = Usage::default();

    let summary = conversation.registry().server_summary();
    eprintln!(
        "chorus v{} (model: {}, {} server(s), {} tools)",
        env!("CARGO_PKG_VERSION"),
        config.model,
        summary.len(),
        conversation.registry().catalog().len()
    );
    eprintln!("Type your message. /help for commands, Ctrl+D to exit.\n");

    loop {
        eprint!("> ");
        io::stderr().flush()?;

        let mut input = String::new();
        let bytes_read = stdin.lock().read_line(&mut input)?;
        if bytes_read == 0 {
            eprintln!();
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if input.starts_with('/') {
            match input {
                "/quit" | "/exit" => break,
                "/tools" => print_tools(conversation.registry()),
                "/clear" => {
                    history.clear();
                    eprintln!("Conversation cleared.");
                }
                "/cost" => print_usage(&total_usage),
                "/help" => print_help(),
                _ => eprintln!("Unknown command: {input}. Type /help for available commands."),
            }
            continue;
        }

        let mut turn = history.clone();
        turn.push(Message::user_text(input));

        match conversation.run_with_events(turn, print_event).await {
            Ok(outcome) => {
                println!("{}\n", outcome.answer);
                total_usage.add(&outcome.usage);
                history = outcome.history;
            }
            // The failed turn is dropped from the history
            Err(e) => eprintln!("\nError: {e}"),
        }
    }

    print_usage(&total_usage);
    Ok(())
}

fn print_event(event: LoopEvent) {
    match event {
        LoopEvent::ToolStart { name, input } => {
            eprintln!("  [tool: {name} {}]", preview(&input.to_string(), PREVIEW_BYTES));
        }
        LoopEvent::ToolEnd {
            name,
            output,
            is_error,
        } => {
            if is_error {
                eprintln!("  [tool {name} error: {}]", preview(&output, PREVIEW_BYTES));
            } else {
                eprintln!("  [tool {name} done: {}]", preview(&output, PREVIEW_BYTES));
            }
        }
        LoopEvent::Retry {
            attempt,
            delay_ms,
            error,
        } => eprintln!("  [retry {attempt} in {delay_ms}ms: {error}]"),
        LoopEvent::State(_) | LoopEvent::Text(_) => {}
    }
}

fn print_tools(registry: &SessionRegistry) {
    for (server, count) in registry.server_summary() {
        eprintln!("{server}: {count} tool(s)");
    }
    for tool in registry.catalog() {
        if tool.description.is_empty() {
            println!("{}", tool.name);
        } else {
            println!("{}\t{}", tool.name, tool.description);
        }
    }
    for collision in registry.collisions() {
        eprintln!(
            "Warning: '{}' from {} is shadowed by {}",
            collision.tool, collision.shadowed_server, collision.kept_server
        );
    }
}

fn print_usage(usage: &Usage) {
    eprintln!(
        "Tokens: input: {}, output: {}",
        usage.input_tokens, usage.output_tokens
    );
}

fn print_help() {
    eprintln!("Available commands:");
    eprintln!("  /help   Show this help");
    eprintln!("  /tools  List the tools of the connected servers");
    eprintln!("  /cost   Show token usage");
    eprintln!("  /clear  Clear the conversation");
    eprintln!("  /quit   Exit");
}
