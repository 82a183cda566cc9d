//! User-Agent Switcher CLI
//!
//! CLI tool for previewing the rule table the extension installs for a
//! configuration export.

mod config;

use std::path::Path;

use clap::{Parser, Subcommand};

use ua_compiler::SkipReason;
use ua_core::config::{ConfigSnapshot, ExportDocument};
use ua_core::pattern::compile_domain_pattern;
use ua_core::types::{default_user_agents, DEFAULT_PROFILE_ID};

#[derive(Parser)]
#[command(name = "ua-cli")]
#[command(about = "User-Agent switcher rule planner and tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the URL filters a spoof domain entry compiles to
    Compile {
        /// Domain entry, e.g. `example.com`, `*.example.com` or `example.com/path`
        #[arg(short, long)]
        domain: String,
    },

    /// Print the dynamic rule table for an exported configuration
    Plan {
        /// Exported configuration file
        #[arg(short, long)]
        config: String,

        /// Profile id selected in the popup
        #[arg(short, long, default_value = DEFAULT_PROFILE_ID)]
        active: String,

        /// Report skipped spoof entries
        #[arg(short, long)]
        verbose: bool,
    },

    /// Check an exported configuration for consistency problems
    Validate {
        /// Exported configuration file
        #[arg(short, long)]
        config: String,
    },

    /// Print the profiles seeded on first install
    Defaults,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile { domain } => cmd_compile(&domain),
        Commands::Plan {
            config,
            active,
            verbose,
        } => cmd_plan(&config, &active, verbose),
        Commands::Validate { config } => cmd_validate(&config),
        Commands::Defaults => cmd_defaults(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn cmd_compile(domain: &str) -> Result<(), String> {
    let filters =
        compile_domain_pattern(domain).map_err(|e| format!("Invalid domain '{}': {}", domain, e))?;
    for filter in filters {
        println!("{}", filter);
    }
    Ok(())
}

fn cmd_plan(path: &str, active: &str, verbose: bool) -> Result<(), String> {
    let document = config::read_export(Path::new(path))?;
    let snapshot = ConfigSnapshot::from_export(&document, active);
    if snapshot.active_id != active {
        eprintln!("Profile '{}' not found, using the default", active);
    }

    let (rules, reports) = config::plan_rule_table(&snapshot)?;

    if verbose {
        for report in &reports {
            eprintln!(
                "{}: {} rules",
                report.namespace.as_str(),
                report.added.len()
            );
            for skipped in &report.skipped {
                if skipped.reason != SkipReason::Disabled {
                    eprintln!("  skipped {} ({:?})", skipped.domain, skipped.reason);
                }
            }
        }
    }

    let output = serde_json::to_string_pretty(&rules)
        .map_err(|e| format!("Failed to encode rules: {}", e))?;
    println!("{}", output);
    Ok(())
}

fn cmd_validate(path: &str) -> Result<(), String> {
    let document = config::read_export(Path::new(path))?;
    let snapshot = ConfigSnapshot::from_export(&document, DEFAULT_PROFILE_ID);
    let issues = snapshot.validate();

    println!("Configuration: {}", path);
    println!("  Version:  {}", document.version.as_deref().unwrap_or("-"));
    println!("  Profiles: {}", snapshot.profiles.len());
    println!("  Spoofs:   {}", snapshot.spoofs.len());

    if issues.is_empty() {
        println!("  Valid");
        return Ok(());
    }

    for issue in &issues {
        println!("  - {}", issue);
    }
    Err(format!("{} issue(s) found", issues.len()))
}

fn cmd_defaults() -> Result<(), String> {
    let document = ExportDocument {
        user_agents: Some(default_user_agents()),
        ..ExportDocument::default()
    };
    let output = serde_json::to_string_pretty(&document)
        .map_err(|e| format!("Failed to encode defaults: {}", e))?;
    println!("{}", output);
    Ok(())
}
