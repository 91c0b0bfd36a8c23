mod actions_cmd;
mod capabilities;
mod chat_cmd;
mod config;
mod files_cmd;
mod recover_cmd;
mod serve_cmd;
mod session_cmd;
mod session_ctx;
mod subagents_cmd;
mod tasks_cmd;

use anyhow::Context;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use config::ResolvedConfig;
use taskforge_db::pool;

#[derive(Parser)]
#[command(name = "taskforge", about = "durable, hierarchical task orchestrator for an LLM coding agent")]
struct Cli {
    /// Database URL (overrides TASKFORGE_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a taskforge config file (no database required)
    Init {
        #[arg(long, default_value = "postgresql://localhost:5432/taskforge")]
        db_url: String,
        #[arg(long)]
        force: bool,
    },
    /// Create and migrate the taskforge database
    DbInit,
    /// Session management
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Send a chat message and run one orchestrator turn
    Chat {
        session_id: String,
        message: String,
        #[command(subcommand)]
        command: Option<ChatCommands>,
    },
    /// List the task graph for a session
    Tasks { session_id: String },
    /// Action log for a session
    Actions {
        session_id: String,
        #[arg(long)]
        tool: Option<String>,
        #[arg(long)]
        limit: Option<i64>,
        #[command(subcommand)]
        command: Option<ActionsCommands>,
    },
    /// List the document store's tracked paths for a session
    Files { session_id: String },
    /// Show, write, or remove a single document
    File {
        #[command(subcommand)]
        command: FileCommands,
    },
    /// Subagent management
    Subagents {
        #[command(subcommand)]
        command: SubagentsCommands,
    },
    /// Re-run the orphaned-scheduling-message scan
    Recover {
        #[arg(long, default_value_t = 30_000)]
        heartbeat_timeout_ms: i64,
        #[arg(long, default_value_t = 3)]
        max_attempts: u32,
    },
    /// Run the HTTP server
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Create a new session
    Create,
    /// Show a session's status and task count
    Show { session_id: String },
}

#[derive(Subcommand)]
enum ChatCommands {
    /// Show chat history instead of sending a message
    History,
    /// Clear chat history
    Clear,
}

#[derive(Subcommand)]
enum ActionsCommands {
    /// Clear the action log
    Clear,
}

#[derive(Subcommand)]
enum FileCommands {
    /// Print a file's contents
    Show { session_id: String, path: String },
    /// Write a file
    Write {
        session_id: String,
        path: String,
        content: String,
    },
    /// Remove a file
    Rm { session_id: String, path: String },
}

#[derive(Subcommand)]
enum SubagentsCommands {
    /// Spawn a subagent under a session's root task
    Spawn {
        session_id: String,
        title: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Count currently running subagents
    List { session_id: String },
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn parse_session_id(raw: &str) -> anyhow::Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("invalid session id: {raw}"))
}

async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = ResolvedConfig::resolve(cli_db_url);

    println!("Initializing taskforge database...");
    pool::ensure_database_exists(&resolved.db_config).await?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    let migrations_path = pool::default_migrations_path();
    pool::run_migrations(&db_pool, migrations_path).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;
    println!("taskforge db-init complete.");
    Ok(())
}

fn cmd_init(db_url: &str, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();
    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
    };
    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!();
    println!("Next: run `taskforge db-init` to create and migrate the database.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { db_url, force } => {
            cmd_init(&db_url, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Session { command } => {
            let resolved = ResolvedConfig::resolve(cli.database_url.as_deref());
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = async {
                match command {
                    SessionCommands::Create => session_cmd::run_create(&db_pool, now_ms()).await,
                    SessionCommands::Show { session_id } => {
                        session_cmd::run_show(&db_pool, parse_session_id(&session_id)?).await
                    }
                }
            }
            .await;
            db_pool.close().await;
            result?;
        }
        Commands::Chat {
            session_id,
            message,
            command,
        } => {
            let resolved = ResolvedConfig::resolve(cli.database_url.as_deref());
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let session_id = parse_session_id(&session_id)?;
            let result = async {
                match command {
                    Some(ChatCommands::History) => chat_cmd::run_history(&db_pool, session_id).await,
                    Some(ChatCommands::Clear) => chat_cmd::run_clear(&db_pool, session_id).await,
                    None => {
                        chat_cmd::run_send(&db_pool, resolved.orchestrator, session_id, &message, now_ms())
                            .await
                    }
                }
            }
            .await;
            db_pool.close().await;
            result?;
        }
        Commands::Tasks { session_id } => {
            let resolved = ResolvedConfig::resolve(cli.database_url.as_deref());
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = tasks_cmd::run_list(&db_pool, parse_session_id(&session_id)?).await;
            db_pool.close().await;
            result?;
        }
        Commands::Actions {
            session_id,
            tool,
            limit,
            command,
        } => {
            let resolved = ResolvedConfig::resolve(cli.database_url.as_deref());
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let session_id = parse_session_id(&session_id)?;
            let result = async {
                match command {
                    Some(ActionsCommands::Clear) => actions_cmd::run_clear(&db_pool, session_id).await,
                    None => actions_cmd::run_list(&db_pool, session_id, tool.as_deref(), limit).await,
                }
            }
            .await;
            db_pool.close().await;
            result?;
        }
        Commands::Files { session_id } => {
            let resolved = ResolvedConfig::resolve(cli.database_url.as_deref());
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let session_id = parse_session_id(&session_id)?;
            let result = files_cmd::run_list(&db_pool, resolved.orchestrator, session_id, now_ms()).await;
            db_pool.close().await;
            result?;
        }
        Commands::File { command } => {
            let resolved = ResolvedConfig::resolve(cli.database_url.as_deref());
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let now = now_ms();
            let result = async {
                match command {
                    FileCommands::Show { session_id, path } => {
                        files_cmd::run_show(&db_pool, resolved.orchestrator, parse_session_id(&session_id)?, &path, now)
                            .await
                    }
                    FileCommands::Write {
                        session_id,
                        path,
                        content,
                    } => {
                        files_cmd::run_write(
                            &db_pool,
                            resolved.orchestrator,
                            parse_session_id(&session_id)?,
                            &path,
                            &content,
                            now,
                        )
                        .await
                    }
                    FileCommands::Rm { session_id, path } => {
                        files_cmd::run_rm(&db_pool, resolved.orchestrator, parse_session_id(&session_id)?, &path, now)
                            .await
                    }
                }
            }
            .await;
            db_pool.close().await;
            result?;
        }
        Commands::Subagents { command } => {
            let resolved = ResolvedConfig::resolve(cli.database_url.as_deref());
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let now = now_ms();
            let result = async {
                match command {
                    SubagentsCommands::Spawn {
                        session_id,
                        title,
                        description,
                    } => {
                        subagents_cmd::run_spawn(
                            &db_pool,
                            resolved.orchestrator,
                            parse_session_id(&session_id)?,
                            &title,
                            description.as_deref(),
                            now,
                        )
                        .await
                    }
                    SubagentsCommands::List { session_id } => {
                        subagents_cmd::run_list(&db_pool, resolved.orchestrator, parse_session_id(&session_id)?, now)
                            .await
                    }
                }
            }
            .await;
            db_pool.close().await;
            result?;
        }
        Commands::Recover {
            heartbeat_timeout_ms,
            max_attempts,
        } => {
            let resolved = ResolvedConfig::resolve(cli.database_url.as_deref());
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = recover_cmd::run(&db_pool, now_ms(), heartbeat_timeout_ms, max_attempts).await;
            db_pool.close().await;
            result?;
        }
        Commands::Serve { bind, port } => {
            let resolved = ResolvedConfig::resolve(cli.database_url.as_deref());
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            serve_cmd::run_serve(db_pool, resolved.orchestrator, &bind, port).await?;
        }
    }

    Ok(())
}
