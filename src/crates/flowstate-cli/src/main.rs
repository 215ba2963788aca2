//! flowstate CLI - run demo agent graphs and inspect their threads
//!
//! With the sqlite backend a thread outlives the process, so a review can be
//! started in one invocation and approved in another:
//!
//! ```text
//! flowstate --backend sqlite review "Draft a tweet about LangGraph." --thread t1
//! flowstate --backend sqlite state t1
//! flowstate --backend sqlite resume t1 Approved
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use flowstate_cli::config::{Backend, CliConfig};
use flowstate_cli::output::{history_line, message_line, outcome_line};
use flowstate_cli::scenarios::human_input;
use flowstate_cli::{open_checkpointer, parse_resume_value, Overrides, Scenario};
use flowstate_core::{messages, CompiledGraph, RunResult};
use std::io::BufRead;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flowstate")]
#[command(about = "flowstate - stateful agent graphs with checkpointed threads", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Config file (.yaml, .yml or .toml)
    #[arg(short, long, env = "FLOWSTATE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Checkpoint backend
    #[arg(long, value_enum, env = "FLOWSTATE_BACKEND", global = true)]
    backend: Option<Backend>,

    /// SQLite URL for the sqlite backend
    #[arg(long, env = "FLOWSTATE_DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Maximum steps per invoke or resume
    #[arg(long, global = true)]
    recursion_limit: Option<usize>,

    /// Log filter directives (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    log_filter: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the model a question, without documents or tools
    Chat {
        question: String,
        #[arg(short, long, default_value = "chat")]
        thread: String,
    },

    /// Answer a question from the knowledge base
    Rag {
        question: String,
        #[arg(short, long, default_value = "rag")]
        thread: String,
    },

    /// Ask the ReAct agent a question
    React {
        question: String,
        #[arg(short, long, default_value = "react")]
        thread: String,
    },

    /// Have the research team write about a topic
    Team {
        topic: String,
        #[arg(short, long, default_value = "team")]
        thread: String,
    },

    /// Draft a reply and pause for review
    Review {
        request: String,
        #[arg(short, long, default_value = "review")]
        thread: String,
        /// Verdict to resume with right away; `-` reads one line from stdin
        #[arg(short, long)]
        feedback: Option<String>,
    },

    /// Resume an interrupted thread
    Resume {
        thread: String,
        /// JSON value, or plain text
        value: String,
        #[arg(long, value_enum, default_value_t = Scenario::Review)]
        scenario: Scenario,
    },

    /// Show the latest snapshot of a thread
    State {
        thread: String,
        /// Print the full snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// List every checkpoint of a thread
    History { thread: String },

    /// List stored threads
    Threads,

    /// Write values into a thread, optionally as if a node produced them
    Update {
        thread: String,
        /// JSON object
        values: String,
        #[arg(long)]
        as_node: Option<String>,
        #[arg(long, value_enum, default_value_t = Scenario::Review)]
        scenario: Scenario,
    },

    /// Copy a historical checkpoint forward as the thread's head
    Fork {
        thread: String,
        step: u64,
        #[arg(long, value_enum, default_value_t = Scenario::Review)]
        scenario: Scenario,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = std::env::current_dir().context("cannot read the working directory")?;
    let config = CliConfig::load(cli.config.as_deref(), &cwd)?.with_overrides(Overrides {
        backend: cli.backend,
        database_url: cli.database_url,
        recursion_limit: cli.recursion_limit,
        log_filter: cli.log_filter,
    })?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(backend = %config.backend, recursion_limit = config.recursion_limit, "Configuration loaded");

    let saver = open_checkpointer(&config)
        .await
        .with_context(|| format!("cannot open {} checkpointer", config.backend))?;
    let open = |scenario: Scenario| {
        scenario
            .build(saver.clone(), config.recursion_limit)
            .with_context(|| format!("cannot build the {} graph", scenario))
    };

    match cli.command {
        Commands::Chat { question, thread } => {
            let graph = open(Scenario::Chat)?;
            run(&graph, &thread, &question).await?;
        }
        Commands::Rag { question, thread } => {
            let graph = open(Scenario::Rag)?;
            run(&graph, &thread, &question).await?;
        }
        Commands::React { question, thread } => {
            let graph = open(Scenario::React)?;
            run(&graph, &thread, &question).await?;
        }
        Commands::Team { topic, thread } => {
            let graph = open(Scenario::Team)?;
            run(&graph, &thread, &topic).await?;
        }
        Commands::Review { request, thread, feedback } => {
            let graph = open(Scenario::Review)?;
            let result = run(&graph, &thread, &request).await?;
            if let (true, Some(raw)) = (result.is_interrupted(), feedback) {
                let verdict = if raw == "-" { read_line()? } else { raw };
                let result = graph.resume(&thread, parse_resume_value(&verdict)).await?;
                report(&thread, &result);
            } else if result.is_interrupted() && config.backend == Backend::Memory {
                tracing::warn!("memory backend: this thread is lost when the process exits");
            }
        }
        Commands::Resume { thread, value, scenario } => {
            require_durable(&config, "resume")?;
            let graph = open(scenario)?;
            let result = graph.resume(&thread, parse_resume_value(&value)).await?;
            report(&thread, &result);
        }
        Commands::State { thread, json } => {
            let graph = open(Scenario::Review)?;
            let Some(snapshot) = graph.get_state(&thread).await? else {
                bail!("no such thread: {}", thread);
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                for message in messages::read(&snapshot.values)? {
                    println!("{}", message_line(&message));
                }
                println!("{}", history_line(&snapshot));
            }
        }
        Commands::History { thread } => {
            let graph = open(Scenario::Review)?;
            for snapshot in graph.get_state_history(&thread).await? {
                println!("{}", history_line(&snapshot));
            }
        }
        Commands::Threads => {
            for thread in saver.threads().await? {
                println!("{}", thread);
            }
        }
        Commands::Update { thread, values, as_node, scenario } => {
            let graph = open(scenario)?;
            let values = serde_json::from_str(&values).context("values must be JSON")?;
            let snapshot = graph.update_state(&thread, values, as_node.as_deref()).await?;
            println!("{}", history_line(&snapshot));
        }
        Commands::Fork { thread, step, scenario } => {
            let graph = open(scenario)?;
            let snapshot = graph.fork(&thread, step).await?;
            println!("{}", history_line(&snapshot));
        }
    }

    Ok(())
}

/// Invoke `graph` with one human message and print the conversation
async fn run(graph: &CompiledGraph, thread: &str, text: &str) -> Result<RunResult> {
    let result = graph.invoke(human_input(text), thread).await?;
    report(thread, &result);
    Ok(result)
}

fn report(thread: &str, result: &RunResult) {
    match messages::read(result.values()) {
        Ok(history) => history.iter().for_each(|m| println!("{}", message_line(m))),
        Err(err) => tracing::warn!(error = %err, "state has no readable message history"),
    }
    println!("{}", outcome_line(thread, result));
}

fn require_durable(config: &CliConfig, action: &str) -> Result<()> {
    if config.backend == Backend::Memory {
        bail!(
            "cannot {} with the memory backend: threads do not outlive the process (use --backend sqlite)",
            action
        );
    }
    Ok(())
}

fn read_line() -> Result<String> {
    eprint!("feedback> ");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("cannot read feedback from stdin")?;
    Ok(line.trim().to_string())
}
