use anyhow::Result;
use clap::{Parser, Subcommand};
use prettytable::{Table, row};
use tracing::info;

use reason_bench::bench::AGENT_TYPES;
use reason_bench::config::Config;
use reason_bench::harness::Harness;
use reason_bench::tracker::BenchmarkTracker;

#[derive(Parser)]
#[command(name = "reason-bench", about = "LLM agent evaluation harness")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run an agent evaluation
    Run {
        /// Agent type to evaluate; see `reason-bench agents`
        #[arg(long)]
        agent: String,
        /// Override the question from the static bank
        #[arg(long)]
        question: Option<String>,
    },
    /// List the agent types the harness evaluates
    Agents,
    /// Show evaluation history
    History,
    /// Compare model performances across agent types
    Compare,
    /// Export results to CSV
    Export {
        #[arg(long, default_value = "data/benchmark_results.csv")]
        out: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reason_bench=info".into()),
        )
        .init();

    reason_bench::load_env();
    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Command::Run { agent, question } => {
            let harness = Harness::new(config)?;
            let outcome = match question {
                Some(q) => {
                    let technique = reason_bench::bench::technique_for_agent(&agent);
                    harness.evaluate_question(&agent, &q, technique).await?
                }
                None => harness.evaluate_agent(&agent).await?,
            };
            println!("Question: {}", outcome.question);
            println!("Technique: {}", outcome.technique);
            println!(
                "Scores: structure={:.2} content={:.2} total={:.2}",
                outcome.report.structure_score,
                outcome.report.content_score,
                outcome.report.total_score
            );
            if let Some(comparison) = &outcome.history_comparison {
                println!(
                    "History: consensus_index={} significant_differences={}",
                    comparison.consensus_index,
                    comparison.differences.len()
                );
            }
            if !outcome.emerged_topics.is_empty() {
                println!("New topics: {:?}", outcome.emerged_topics);
            }
        }
        Command::Agents => {
            for agent_type in AGENT_TYPES {
                println!("{agent_type}");
            }
        }
        Command::History => {
            let tracker = BenchmarkTracker::new(&config.tracker.results_path)?;
            for record in tracker.load_results()? {
                println!(
                    "{} model={} agent={} total={:.2}",
                    record.timestamp,
                    record.model,
                    record.agent_type,
                    record.evaluation.total_score
                );
            }
        }
        Command::Compare => {
            let tracker = BenchmarkTracker::new(&config.tracker.results_path)?;
            let performance = tracker.compare_models()?;
            let mut table = Table::new();
            table.add_row(row!["Model", "Agent Type", "Runs", "Mean Score"]);
            for (model, agents) in &performance {
                for (agent_type, scores) in agents {
                    let mean = scores.iter().sum::<f32>() / scores.len() as f32;
                    table.add_row(row![model, agent_type, scores.len(), format!("{mean:.2}")]);
                }
            }
            table.printstd();
        }
        Command::Export { out } => {
            let tracker = BenchmarkTracker::new(&config.tracker.results_path)?;
            let count = tracker.export_csv(&out)?;
            info!("exported {count} records to {out}");
        }
    }

    Ok(())
}
