// ABOUTME: Entry point for the herald binary.
// ABOUTME: Parses CLI arguments, initializes tracing, and runs catalog agents against the configured provider.

use std::io::Write;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};

use herald_agent::{HeraldConfig, Runner, create_runtime};
use herald_core::{Agent, catalog, tools::current_time};

/// Declarative Gemini agents with local tools and built-in search
#[derive(Parser)]
#[command(name = "herald", version)]
#[command(about = "Run declarative Gemini agents with local tools and built-in search")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List catalog agents
    List,
    /// Print an agent definition
    Show {
        /// Agent name
        agent: String,
        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Yaml)]
        format: Format,
    },
    /// Print the current_time tool output
    Time,
    /// Send one message to an agent and print the answer
    Run {
        /// Agent name
        agent: String,
        /// Message text
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
    /// Interactive conversation with an agent on stdin
    Chat {
        /// Agent name
        agent: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("herald=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => {
            print!("{}", render_list(&catalog::all_agents()));
        }
        Commands::Show { agent, format } => {
            let agent = lookup(&agent)?;
            println!("{}", render_summary(&agent, format)?);
        }
        Commands::Time => {
            println!("{}", current_time::current_time());
        }
        Commands::Run { agent, message } => {
            let runner = build_runner(&agent)?;
            let mut session = runner.new_session();
            let outcome = runner
                .run(&mut session, &message.join(" "))
                .await
                .with_context(|| format!("agent '{}' failed", agent))?;
            println!("{}", outcome.text);
        }
        Commands::Chat { agent } => {
            let runner = build_runner(&agent)?;
            chat(&runner).await?;
        }
    }

    Ok(())
}

fn lookup(name: &str) -> Result<Agent> {
    catalog::find_agent(name).with_context(|| {
        format!(
            "unknown agent '{}'; available: {}",
            name,
            catalog::agent_names().join(", ")
        )
    })
}

fn build_runner(name: &str) -> Result<Runner> {
    let agent = lookup(name)?;
    let config = HeraldConfig::from_env().context("invalid configuration")?;
    let runtime = create_runtime(&config.provider)
        .with_context(|| format!("could not create '{}' runtime", config.provider))?;
    tracing::info!(agent = %agent.name, provider = %config.provider, max_steps = config.max_steps, "runner ready");
    Ok(Runner::new(agent, runtime)?.with_max_steps(config.max_steps))
}

async fn chat(runner: &Runner) -> Result<()> {
    let mut session = runner.new_session();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("[user]: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        match runner.run(&mut session, line).await {
            Ok(outcome) => println!("[{}]: {}", outcome.agent, outcome.text),
            Err(e) => {
                tracing::error!(error = %e, "turn failed");
                eprintln!("error: {}", e);
            }
        }
    }

    Ok(())
}

fn render_list(agents: &[Agent]) -> String {
    fn walk(agent: &Agent, depth: usize, out: &mut String) {
        out.push_str(&format!(
            "{}{} ({}) tools: [{}]\n",
            "  ".repeat(depth),
            agent.name,
            agent.model,
            agent.tool_names().join(", ")
        ));
        for sub in &agent.sub_agents {
            walk(sub, depth + 1, out);
        }
    }

    let mut out = String::new();
    for agent in agents {
        walk(agent, 0, &mut out);
    }
    out
}

fn render_summary(agent: &Agent, format: Format) -> Result<String> {
    let summary = agent.summary();
    Ok(match format {
        Format::Json => serde_json::to_string_pretty(&summary)?,
        Format::Yaml => serde_yaml::to_string(&summary)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_run_message_words() {
        let cli = Cli::try_parse_from(["herald", "run", "tool_agent", "what", "time?"]).unwrap();
        match cli.command {
            Commands::Run { agent, message } => {
                assert_eq!(agent, "tool_agent");
                assert_eq!(message.join(" "), "what time?");
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn cli_requires_run_message() {
        assert!(Cli::try_parse_from(["herald", "run", "tool_agent"]).is_err());
    }

    #[test]
    fn render_list_indents_sub_agents() {
        let out = render_list(&catalog::all_agents());
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "tool_agent (gemini-2.0-flash) tools: [current_time]");
        assert_eq!(lines[1], "manager (gemini-2.0-flash) tools: [current_time]");
        assert_eq!(lines[2], "  news_analyst (gemini-2.0-flash) tools: [google_search]");
    }

    #[test]
    fn render_summary_in_both_formats() {
        let agent = catalog::news_analyst();

        let json = render_summary(&agent, Format::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["name"], "news_analyst");

        let yaml = render_summary(&agent, Format::Yaml).unwrap();
        assert!(yaml.contains("name: news_analyst"));
        assert!(yaml.contains("- google_search"));
    }

    #[test]
    fn lookup_reports_available_agents() {
        let err = lookup("nope").unwrap_err().to_string();
        assert!(err.contains("tool_agent"));
        assert!(err.contains("news_analyst"));
    }
}
