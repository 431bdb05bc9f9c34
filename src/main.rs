use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use gempod::ParseOutput;
use gempod::file_types::ManifestKind;

#[derive(Parser)]
#[command(name = "gempod")]
#[command(about = "Dependency extraction for Gemfile, Podfile, gemspec and podspec manifests", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a manifest and print the extracted record
    Parse {
        /// Path to the manifest file
        #[arg(short, long)]
        file: PathBuf,

        /// Output format: json or summary
        #[arg(short, long, default_value = "json")]
        output: String,
    },
    /// Dump the token stream of a manifest (debugging aid)
    Tokens {
        /// Path to the manifest file
        #[arg(short, long)]
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Parse { file, output } => run_parse(&file, &output),
        Commands::Tokens { file } => run_tokens(&file),
    }
}

fn run_parse(file: &Path, output: &str) -> ExitCode {
    let content = match fs::read_to_string(file) {
        Ok(content) => content,
        Err(err) => {
            eprintln!("error: cannot read {}: {}", file.display(), err);
            return ExitCode::FAILURE;
        }
    };

    match gempod::parse(&content) {
        Ok(record) => {
            if output == "summary" {
                print_summary(file, &record);
            } else {
                match serde_json::to_string_pretty(&record) {
                    Ok(json) => println!("{json}"),
                    Err(err) => {
                        eprintln!("error: {err}");
                        return ExitCode::FAILURE;
                    }
                }
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn print_summary(file: &Path, record: &ParseOutput) {
    let kind = ManifestKind::detect(file)
        .map(ManifestKind::label)
        .unwrap_or("manifest");
    println!("{} ({})", file.display(), kind);
    if let Some(name) = &record.self_name {
        let version = record.self_version.as_deref().unwrap_or("?");
        println!("  declares {} {}", name, version);
    }
    println!(
        "  {} runtime, {} development",
        record.groups.runtime.len(),
        record.groups.development.len()
    );
    for (bucket, deps) in [
        ("runtime", &record.groups.runtime),
        ("development", &record.groups.development),
    ] {
        for dep in deps {
            let versions = if dep.versions.is_empty() {
                "*".to_string()
            } else {
                dep.versions.join(", ")
            };
            println!("  [{}] {} {}", bucket, dep.name, versions);
        }
    }
}

fn run_tokens(file: &Path) -> ExitCode {
    let content = match fs::read_to_string(file) {
        Ok(content) => content,
        Err(err) => {
            eprintln!("error: cannot read {}: {}", file.display(), err);
            return ExitCode::FAILURE;
        }
    };

    match gempod::lexer::tokenize(&content) {
        Ok(tokens) => {
            for token in &tokens {
                println!(
                    "{}:{}\t{:?}\t{:?}",
                    token.line, token.column, token.kind, token.text
                );
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
