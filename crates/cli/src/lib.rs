//! `modaletta` command line: agent management, one-off wakeups, the digest
//! and the long-running job scheduler.

pub mod render;
pub mod scheduler;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use config::{AgentBackendConfig, DigestConfig, SchedulerConfig};
use services::{
    agents::{AgentService, MessageRole, NewAgent},
    digest::{DeliveryOutcome, DigestService},
    wakeup::{RosterEntry, WakeupService},
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "modaletta",
    version,
    about = "Manage Letta agents, wakeups and digests"
)]
pub struct Cli {
    /// YAML file with agent backend settings (environment variables otherwise)
    #[arg(long, global = true, value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// List agents
    ListAgents {
        #[arg(long)]
        project_id: Option<String>,
    },
    /// Create an agent from the configured defaults
    CreateAgent(CreateAgentArgs),
    /// Delete an agent
    DeleteAgent { agent_id: String },
    /// Send a message and print the agent's reply
    SendMessage {
        agent_id: String,
        message: String,
        #[arg(long, default_value = "user")]
        role: MessageRole,
    },
    /// Print an agent's memory blocks
    GetMemory { agent_id: String },
    /// Print the active configuration with secrets masked
    ConfigInfo,
    /// Wake one agent now
    Wakeup {
        #[arg(long)]
        agent_id: String,
        /// Sent verbatim instead of the default wakeup prompt
        #[arg(long)]
        prompt: Option<String>,
    },
    /// Wake every enabled agent in the roster
    WakeupAll,
    /// Replace the wakeup roster with the given agents
    RosterInit {
        #[arg(long = "agent-id", required = true)]
        agent_ids: Vec<String>,
        #[arg(long)]
        prompt: Option<String>,
    },
    /// Show an agent's most recent wakeups
    WakeupLogs {
        #[arg(long)]
        agent_id: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Build the feed digest and optionally deliver it
    Digest(DigestArgs),
    /// Run the wakeup and digest jobs until interrupted
    Schedule,
}

#[derive(Args, Debug, Clone, PartialEq, Default)]
pub struct CreateAgentArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub system: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long)]
    pub persona: Option<String>,
    #[arg(long)]
    pub human: Option<String>,
    /// Tool to attach; repeat for several
    #[arg(long = "tool")]
    pub tools: Vec<String>,
}

impl From<CreateAgentArgs> for NewAgent {
    fn from(args: CreateAgentArgs) -> Self {
        Self {
            name: args.name,
            system: args.system,
            model: args.model,
            persona: args.persona,
            human: args.human,
            tools: args.tools,
        }
    }
}

#[derive(Args, Debug, Clone, PartialEq, Default)]
pub struct DigestArgs {
    /// Look-back window; the digest config decides when omitted
    #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
    pub since_hours: Option<i64>,
    /// Send the digest to the agent instead of printing it
    #[arg(long)]
    pub deliver: bool,
    /// Target agent, defaults to DIGEST_AGENT_ID
    #[arg(long)]
    pub agent_id: Option<String>,
    /// Digest source list (YAML)
    #[arg(long, value_name = "PATH")]
    pub digest_config: Option<PathBuf>,
}

pub fn load_backend_config(config_file: Option<&PathBuf>) -> anyhow::Result<AgentBackendConfig> {
    match config_file {
        Some(path) => AgentBackendConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display())),
        None => Ok(AgentBackendConfig::from_env()?),
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let backend_config = load_backend_config(cli.config_file.as_ref())?;
    let scheduler_config = SchedulerConfig::from_env();

    if cli.command == Commands::ConfigInfo {
        print_config(&backend_config, &scheduler_config);
        return Ok(());
    }

    let agents = AgentService::letta(backend_config)?;
    execute(cli.command, &agents, &scheduler_config).await
}

/// Run one command against an agent service.
pub async fn execute(
    command: Commands,
    agents: &AgentService,
    scheduler_config: &SchedulerConfig,
) -> anyhow::Result<()> {
    let wakeups = || WakeupService::from_config(agents.backend().clone(), scheduler_config);

    match command {
        Commands::ListAgents { project_id } => {
            let list = agents
                .list_agents(project_id)
                .await
                .context("listing agents")?;
            if list.is_empty() {
                println!("No agents found.");
                return Ok(());
            }
            let rows: Vec<Vec<String>> = list
                .into_iter()
                .map(|agent| {
                    vec![
                        agent.id,
                        agent.name,
                        agent.created_at.unwrap_or_else(|| "N/A".to_string()),
                    ]
                })
                .collect();
            println!("{}", render::render_table(&["ID", "Name", "Created"], &rows));
        }
        Commands::CreateAgent(args) => {
            let agent_id = agents
                .create_agent(args.into())
                .await
                .context("creating agent")?;
            println!("Created agent: {agent_id}");
        }
        Commands::DeleteAgent { agent_id } => {
            agents
                .delete_agent(&agent_id)
                .await
                .context("deleting agent")?;
            println!("Deleted agent: {agent_id}");
        }
        Commands::SendMessage {
            agent_id,
            message,
            role,
        } => {
            let response = agents
                .send_message(&agent_id, role, &message)
                .await
                .context("sending message")?;
            println!("Sent: {message}");
            println!("Response:");
            for line in render::render_messages(&response) {
                println!("{line}");
            }
        }
        Commands::GetMemory { agent_id } => {
            let blocks = agents
                .list_blocks(&agent_id)
                .await
                .context("getting memory")?;
            println!("Memory blocks for agent {agent_id}:");
            for line in render::render_memory(&blocks) {
                println!("{line}");
            }
        }
        Commands::ConfigInfo => {
            print_config(agents.config(), scheduler_config);
        }
        Commands::Wakeup { agent_id, prompt } => {
            let result = wakeups()
                .wake_once(&agent_id, prompt.as_deref())
                .await
                .context("waking agent")?;
            println!("Woke agent {} at {}", result.agent_id, result.timestamp);
            for line in render::render_messages(&result.response) {
                println!("{line}");
            }
        }
        Commands::WakeupAll => {
            let report = wakeups().run_all().await.context("running wakeups")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::RosterInit { agent_ids, prompt } => {
            let entries = agent_ids
                .into_iter()
                .map(|id| RosterEntry::enabled(id, prompt.clone()))
                .collect();
            let service = wakeups();
            let count = service.init_roster(entries).context("writing roster")?;
            println!(
                "Roster initialised with {count} agent(s) at {}",
                scheduler_config.roster_path().display()
            );
        }
        Commands::WakeupLogs { agent_id, limit } => {
            let entries = wakeups()
                .recent_logs(&agent_id, limit)
                .context("reading wakeup logs")?;
            if entries.is_empty() {
                println!("No wakeups logged for {agent_id}.");
            }
            for entry in &entries {
                for line in render::render_wakeup_log(entry) {
                    println!("{line}");
                }
            }
        }
        Commands::Digest(args) => {
            let config_path = args
                .digest_config
                .or_else(|| scheduler_config.digest_config_file.clone());
            let digest_config = DigestConfig::load(config_path.as_deref())?;
            let service = DigestService::new(digest_config)?;
            let digest = service
                .generate(args.since_hours)
                .await
                .context("building digest")?;

            if !args.deliver {
                print!("{}", digest.to_markdown());
                return Ok(());
            }

            let target = args
                .agent_id
                .or_else(|| scheduler_config.digest_agent_id.clone());
            match service
                .deliver(Some(agents.backend().as_ref()), target.as_deref(), &digest)
                .await
                .context("delivering digest")?
            {
                DeliveryOutcome::Delivered {
                    agent_id,
                    response_count,
                } => println!(
                    "Delivered digest ({} posts) to {agent_id}, {response_count} response message(s)",
                    digest.total_posts()
                ),
                DeliveryOutcome::DryRun => {
                    println!("No agent configured, printing digest instead.");
                    print!("{}", digest.to_markdown());
                }
            }
        }
        Commands::Schedule => {
            let digest_config =
                DigestConfig::load(scheduler_config.digest_config_file.as_deref())?;
            scheduler::run_until_interrupted(agents.clone(), scheduler_config.clone(), digest_config)
                .await?;
        }
    }

    Ok(())
}

fn print_config(backend: &AgentBackendConfig, scheduler: &SchedulerConfig) {
    println!("Agent backend:");
    for (key, value) in backend.display_entries() {
        println!("  {key}: {value}");
    }
    println!("Scheduler:");
    println!("  data_dir: {}", scheduler.data_dir.display());
    println!("  wakeup_cron: {}", scheduler.wakeup_cron);
    println!("  digest_cron: {}", scheduler.digest_cron);
    println!(
        "  digest_agent_id: {}",
        scheduler.digest_agent_id.as_deref().unwrap_or("Not set")
    );
}
