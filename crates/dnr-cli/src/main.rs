//! DNR Forge CLI
//!
//! CLI tool for compiling filter lists into declarative rule batches.

mod logger;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};

use dnr_compiler::{
    compile_filter_list, looks_like_filter_list, optimize_with_stats, CompilerConfig, FilterList, Pipeline,
};
use dnr_core::types::RuleKind;

#[derive(Parser)]
#[command(name = "dnr-cli")]
#[command(about = "Filter list to declarative rule compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile filter lists into declarative rule batches
    Compile {
        /// Input filter list files
        #[arg(short, long, required = true)]
        input: Vec<String>,

        /// Domains that always get an allow rule
        #[arg(short, long)]
        whitelist: Vec<String>,

        /// JSON compiler config
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Rules per batch (overrides config)
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Output JSON file
        #[arg(short, long, default_value = "rules.json")]
        output: String,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print parse and optimization statistics
    Stats {
        /// Input filter list files
        #[arg(short, long, required = true)]
        input: Vec<String>,
    },

    /// Check that a downloaded file looks like a filter list
    Check {
        /// File to check
        #[arg(short, long)]
        input: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let verbose = matches!(cli.command, Commands::Compile { verbose: true, .. });
    logger::init(verbose);

    let result = match cli.command {
        Commands::Compile {
            input,
            whitelist,
            config,
            batch_size,
            output,
            verbose,
        } => cmd_compile(&input, whitelist, config.as_deref(), batch_size, &output, verbose),
        Commands::Stats { input } => cmd_stats(&input),
        Commands::Check { input } => cmd_check(&input),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn read_list(path: &str) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))
}

fn list_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

fn cmd_compile(
    inputs: &[String],
    whitelist: Vec<String>,
    config_path: Option<&Path>,
    batch_size: Option<usize>,
    output: &str,
    verbose: bool,
) -> Result<(), String> {
    if inputs.is_empty() {
        return Err("No input files specified".to_string());
    }

    let mut config = match config_path {
        Some(path) => CompilerConfig::load(path).map_err(|e| e.to_string())?,
        None => CompilerConfig::default(),
    };
    if let Some(size) = batch_size {
        config.batch_size = size;
    }
    config.whitelist.extend(whitelist);
    config.validate().map_err(|e| e.to_string())?;

    let start = Instant::now();

    let names: Vec<String> = inputs.iter().map(|p| list_name(p)).collect();
    let texts = inputs.iter().map(|p| read_list(p)).collect::<Result<Vec<_>, _>>()?;
    let lists: Vec<FilterList<'_>> = names
        .iter()
        .zip(&texts)
        .map(|(name, text)| FilterList::new(name, text))
        .collect();

    if verbose {
        for (index, list) in lists.iter().enumerate() {
            println!("  [{}] {} - {} lines", index, list.name, list.text.lines().count());
        }
    }

    let ruleset = Pipeline::new(config).compile(&lists);

    let json = serde_json::to_string_pretty(&ruleset).map_err(|e| format!("Failed to serialize rules: {}", e))?;
    fs::write(output, json).map_err(|e| format!("Failed to write '{}': {}", output, e))?;

    let stats = &ruleset.stats;
    println!("Compiled {} filter lists to '{}'", inputs.len(), output);
    println!("  Parsed:      {} ({} invalid lines)", stats.parsed, stats.invalid);
    println!(
        "  Removed:     {} duplicate, {} merged, {} redundant, {} whitelisted, {} over limit",
        stats.deduplicated, stats.merged, stats.redundant, stats.whitelisted, stats.truncated
    );
    println!(
        "  Network:     {} rules in {} batches",
        ruleset.network_rule_count(),
        ruleset.batches.len()
    );
    println!(
        "  Cosmetic:    {} hide, {} unhide, {} procedural",
        ruleset.cosmetic.hide.len(),
        ruleset.cosmetic.unhide.len(),
        ruleset.cosmetic.procedural.len()
    );
    println!("  Fingerprint: {}", ruleset.fingerprint);
    println!("  Time:        {:.1}ms", start.elapsed().as_secs_f64() * 1000.0);

    Ok(())
}

fn cmd_stats(inputs: &[String]) -> Result<(), String> {
    let mut all_rules = Vec::new();

    for path in inputs {
        let text = read_list(path)?;
        let name = list_name(path);
        let (rules, stats) = compile_filter_list(&text, &name);

        let count = |kind: RuleKind| rules.iter().filter(|r| r.kind() == kind).count();
        println!("{}", name);
        println!("  Lines:       {}", text.lines().count());
        println!("  Network:     {}", count(RuleKind::Network));
        println!("  Cosmetic:    {}", count(RuleKind::Cosmetic));
        println!("  Procedural:  {}", count(RuleKind::Procedural));
        println!("  Invalid:     {}", stats.invalid);

        all_rules.extend(rules);
    }

    let (_, stats) = optimize_with_stats(all_rules);
    println!();
    println!("Optimization:");
    println!("  Rules:       {} -> {}", stats.before, stats.after);
    println!("  Duplicates:  {}", stats.deduplicated);
    println!("  Merged:      {}", stats.merged);
    println!("  Redundant:   {}", stats.redundant);

    Ok(())
}

fn cmd_check(input: &str) -> Result<(), String> {
    let text = read_list(input)?;
    if !looks_like_filter_list(&text) {
        return Err(format!("'{}' does not look like a filter list", input));
    }
    println!("'{}' looks like a filter list ({} bytes)", input, text.len());
    Ok(())
}
