//! Signal Agency CLI
//!
//! Interactive REPL, one-shot queries and operations, the HTTP server and a
//! mock data generator.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use signal_agency::data::{load_file, mock, write_json, MockConfig};
use signal_agency::server::{run_server, AppState};
use signal_agency::utils::{init_logging, logging::DEFAULT_FILTER};
use signal_agency::{
    Assistant, AssistantConfig, CandidateOperation, Dataset, IntentResolver, OperationCatalog,
    OperationResult, ResolutionOutcome, Vocabulary, VocabularyStore,
};

#[derive(Parser)]
#[command(name = "signal_agency", version, about = "Ask questions about time-series signals")]
struct Cli {
    /// Keyword and alias tables, written with the defaults when missing
    #[arg(long, global = true, env = "SIGNAL_AGENCY_VOCABULARY")]
    vocabulary: Option<PathBuf>,

    /// Never consult the external assistant
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive session
    Repl {
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long, conflicts_with = "file")]
        mock: bool,
    },
    /// Resolve one query
    Query {
        text: String,
        #[arg(long)]
        file: Option<PathBuf>,
        /// Run the resolved operations
        #[arg(long)]
        execute: bool,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run one operation directly
    Run {
        operation: String,
        #[arg(long = "signal", required = true)]
        signals: Vec<String>,
        /// key=value, where value may be JSON
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, Value)>,
        #[arg(long)]
        output: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Serve the HTTP API
    Serve {
        #[arg(long, default_value_t = 5000, env = "SIGNAL_AGENCY_PORT")]
        port: u16,
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long, conflicts_with = "file")]
        mock: bool,
    },
    /// Write a mock drive recording as JSON
    Mock {
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 60.0)]
        duration: f64,
        #[arg(long, default_value_t = 100.0)]
        sample_rate: f64,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.trim().to_string(), value))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_logging(DEFAULT_FILTER);

    let cli = Cli::parse();
    match &cli.command {
        Command::Repl { file, mock } => {
            let dataset = load_dataset(file.as_deref(), *mock)?;
            let resolver = build_resolver(&cli).await?;
            repl(&resolver, &dataset).await
        }
        Command::Query {
            text,
            file,
            execute,
            json,
        } => {
            let dataset = load_dataset(file.as_deref(), file.is_none())?;
            let resolver = build_resolver(&cli).await?;
            let (outcome, results) = if *execute {
                resolver.resolve_and_execute(text, &dataset, None).await
            } else {
                (resolver.resolve(text, &dataset, None).await, Vec::new())
            };
            if *json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_outcome(&outcome, &results);
            }
            Ok(())
        }
        Command::Run {
            operation,
            signals,
            params,
            output,
            file,
        } => {
            let dataset = load_dataset(file.as_deref(), file.is_none())?;
            let mut candidate = CandidateOperation {
                operation: operation.clone(),
                signals: signals.clone(),
                output_name: output.clone(),
                ..Default::default()
            };
            for (key, value) in params {
                candidate.parameters.insert(key.clone(), value.clone());
            }
            let catalog = OperationCatalog::standard();
            let (request, result) = catalog.run(&dataset, &candidate)?;
            println!("✅ {} -> {}", result.description(), request.output_name);
            print_result(&result);
            Ok(())
        }
        Command::Serve { port, file, mock } => {
            let resolver = build_resolver(&cli).await?;
            let mut state = AppState::new(resolver);
            if file.is_some() || *mock {
                state = state.with_dataset(load_dataset(file.as_deref(), *mock)?);
            }
            println!("🚀 Signal Agency API: http://0.0.0.0:{}", port);
            run_server(state, *port).await
        }
        Command::Mock {
            out,
            duration,
            sample_rate,
            seed,
        } => {
            let config = MockConfig {
                duration: *duration,
                sample_rate: *sample_rate,
                seed: *seed,
            };
            let dataset = mock::generate(&config);
            write_json(&dataset, out)?;
            println!(
                "💾 Wrote {} signals x {} samples to {}",
                dataset.signals().len(),
                dataset.len(),
                out.display()
            );
            Ok(())
        }
    }
}

async fn build_resolver(cli: &Cli) -> Result<Arc<IntentResolver>> {
    let vocabulary = match &cli.vocabulary {
        Some(path) => VocabularyStore::new(path).load().await?,
        None => Arc::new(Vocabulary::default()),
    };
    let assistant = if cli.offline {
        None
    } else {
        Assistant::from_config(&AssistantConfig::from_env())?
    };
    let catalog = Arc::new(OperationCatalog::standard());
    Ok(Arc::new(IntentResolver::new(catalog, vocabulary, assistant)?))
}

/// Load `file`, or generate the default mock recording when `use_mock` is set
/// and no file was given.
fn load_dataset(file: Option<&Path>, use_mock: bool) -> Result<Dataset> {
    match file {
        Some(path) => {
            load_file(path).with_context(|| format!("Failed to load {}", path.display()))
        }
        None if use_mock => {
            info!("Using generated mock data");
            Ok(mock::generate(&MockConfig::default()))
        }
        None => anyhow::bail!("No dataset given; pass --file or --mock"),
    }
}

async fn repl(resolver: &IntentResolver, dataset: &Dataset) -> Result<()> {
    println!("\n{}", "═".repeat(60));
    println!("📈 Signal Agency v{}", env!("CARGO_PKG_VERSION"));
    println!("{}", "═".repeat(60));
    println!("Signals: {}", dataset.signal_names().join(", "));
    println!("{}\n", "═".repeat(60));
    println!("💡 Commands: 'quit' | 'signals' | 'summary'\n");

    loop {
        print!("🔎 You: ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let query = input.trim();
        if query.is_empty() {
            continue;
        }

        match query.to_lowercase().as_str() {
            "quit" | "exit" | "q" => {
                println!("\n👋 Goodbye!\n");
                break;
            }
            "signals" => {
                for signal in dataset.signals() {
                    println!("   • {} [{}]", signal.name, signal.unit);
                }
                println!();
                continue;
            }
            "summary" => {
                let summary = dataset.summary();
                println!(
                    "\n📊 {} samples over {:.1}s at {:.1} Hz\n",
                    summary.samples, summary.duration, summary.sample_rate
                );
                continue;
            }
            _ => {}
        }

        let (outcome, results) = resolver.resolve_and_execute(query, dataset, None).await;
        print_outcome(&outcome, &results);
    }
    Ok(())
}

fn print_outcome(outcome: &ResolutionOutcome, results: &[OperationResult]) {
    println!("{}", "─".repeat(50));
    match outcome {
        ResolutionOutcome::Answer(answer) => {
            println!("💬 {}", answer.text);
            println!("   (confidence {:.0}%)", answer.confidence * 100.0);
        }
        ResolutionOutcome::Operations {
            clarification: Some(_),
            explanation,
            ..
        } => println!("❓ {}", explanation),
        ResolutionOutcome::Operations {
            operations,
            explanation,
            ..
        } => {
            println!("⚙️  {}", explanation);
            for request in operations {
                println!("   • {} [{}]", request.output_name, request.signals.join(", "));
            }
            for result in results {
                println!("✅ {}", result.description());
                print_result(result);
            }
        }
    }
    println!("{}\n", "─".repeat(50));
}

fn print_result(result: &OperationResult) {
    if let Some(stats) = &result.metadata.statistics {
        println!(
            "   min {:.3} | max {:.3} | mean {:.3} | std {:.3}",
            stats.min, stats.max, stats.mean, stats.std
        );
    }
    let head: Vec<String> = result.data.iter().take(8).map(|v| format!("{:.3}", v)).collect();
    let ellipsis = if result.data.len() > head.len() { ", ..." } else { "" };
    println!("   {} samples: [{}{}]", result.data.len(), head.join(", "), ellipsis);
}
