//! ohash CLI: instrument IR modules with oblivious hashing.

use clap::{Parser, Subcommand};
use ohash_analysis::{AnalysisFacts, ModuleAnalysis, ProgramAnalysis};
use ohash_core::config::InstrumentConfig;
use ohash_core::hash::hash_serde;
use ohash_core::ir::Module;
use ohash_core::manifest::InstrumentManifest;
use ohash_pass::explain::{FoldDecision, LogDecision};
use ohash_pass::verify::{check_monotonic_ids, check_non_interference, log_events};
use ohash_pass::{explain, ObliviousHashPass, RuntimeSymbols};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ohash")]
#[command(about = "Oblivious-hashing instrumentation for IR modules", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Instrument a module and write the result
    Instrument {
        /// Path to the module (JSON, or YAML with a .yaml/.yml extension)
        #[arg(short, long)]
        module: PathBuf,

        /// Analysis results for the module
        #[arg(short, long, conflicts_with = "assume_independent")]
        facts: Option<PathBuf>,

        /// Treat every defined function as input-independent and deterministic
        #[arg(long)]
        assume_independent: bool,

        /// Accumulator pool size (overrides OHASH_NUM_HASH)
        #[arg(long)]
        num_hash: Option<usize>,

        /// Random seed (overrides OHASH_SEED; defaults to wall-clock time)
        #[arg(long)]
        seed: Option<u64>,

        /// Where to write the instrumented module as JSON (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Where to write the run manifest
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Check non-interference and log ids after instrumenting
        #[arg(long)]
        verify: bool,

        /// Print the instrumented module in textual form
        #[arg(long)]
        print: bool,
    },

    /// Load a module and its analysis results without instrumenting
    Validate {
        #[arg(short, long)]
        module: PathBuf,

        #[arg(short, long)]
        facts: Option<PathBuf>,
    },

    /// Show what instrumentation would do, per function and block (EXPLAIN)
    Explain {
        #[arg(short, long)]
        module: PathBuf,

        #[arg(short, long)]
        facts: Option<PathBuf>,
    },
}

/// Values given on the command line; these win over the environment.
#[derive(Debug, Default)]
struct CliOverrides {
    num_hash: Option<usize>,
    seed: Option<u64>,
}

impl CliOverrides {
    fn apply(&self, cfg: &mut InstrumentConfig) {
        if let Some(n) = self.num_hash {
            cfg.num_hash = n;
        }
        if let Some(seed) = self.seed {
            cfg.seed = Some(seed);
        }
    }
}

fn main() {
    setup_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Instrument {
            module,
            facts,
            assume_independent,
            num_hash,
            seed,
            output,
            manifest,
            verify,
            print,
        } => {
            let overrides = CliOverrides { num_hash, seed };
            let outputs = Outputs {
                module: output,
                manifest,
                verify,
                print,
            };
            if let Err(e) = instrument(&module, facts.as_deref(), assume_independent, &overrides, &outputs) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Validate { module, facts } => {
            if let Err(e) = validate(&module, facts.as_deref()) {
                eprintln!("Validation failed: {}", e);
                std::process::exit(1);
            }
            println!("✓ Module and analysis results are valid");
        }
        Commands::Explain { module, facts } => {
            if let Err(e) = explain_module(&module, facts.as_deref()) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}

static INIT: Once = Once::new();

/// Logs go to stderr, filtered by `RUST_LOG` (default `warn`).
fn setup_logger() {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        tracing_subscriber::fmt()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter)
            .init();
    });
}

struct Outputs {
    module: Option<PathBuf>,
    manifest: Option<PathBuf>,
    verify: bool,
    print: bool,
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn load_module(path: &Path) -> Result<Module, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)?;
    let module = if is_yaml(path) {
        Module::from_yaml_str(&text)?
    } else {
        Module::from_json_str(&text)?
    };
    info!(path = %path.display(), functions = module.functions.len(), "loaded module");
    Ok(module)
}

/// Facts from `path`, or the permissive default when no file is given.
fn load_facts(
    path: Option<&Path>,
    module: &Module,
) -> Result<AnalysisFacts, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        warn!(module = %module.name, "no analysis results given; every defined function treated as input-independent");
        return Ok(AnalysisFacts::assume_input_independent(module));
    };
    let text = fs::read_to_string(path)?;
    let facts = if is_yaml(path) {
        AnalysisFacts::from_yaml_str(&text)?
    } else {
        AnalysisFacts::from_json_str(&text)?
    };
    info!(path = %path.display(), "loaded analysis results");
    Ok(facts)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn instrument(
    module_path: &Path,
    facts_path: Option<&Path>,
    assume_independent: bool,
    overrides: &CliOverrides,
    outputs: &Outputs,
) -> Result<(), Box<dyn std::error::Error>> {
    let started_ms = now_ms();
    let mut module = load_module(module_path)?;
    if facts_path.is_none() && !assume_independent {
        return Err("analysis results are required: pass --facts or --assume-independent".into());
    }
    let facts = load_facts(facts_path, &module)?;
    let analysis = ModuleAnalysis::new(&module, facts)?;

    let mut config = InstrumentConfig::from_env();
    overrides.apply(&mut config);

    let original = module.clone();
    let input_digest = hash_serde(&original)?;
    let mut pass = ObliviousHashPass::new(config)?;
    let report = pass.run_seeded(&mut module, &analysis)?;
    let seed = report.seed.unwrap_or_default();

    if outputs.verify {
        let symbols = RuntimeSymbols::from_config(pass.config());
        check_non_interference(&original, &module, &symbols)?;
        let events = log_events(&module, &symbols.log);
        check_monotonic_ids(&events)?;
        eprintln!("✓ Verified {} log events", events.len());
    }

    let json = module.to_json_string()?;
    match &outputs.module {
        Some(path) => {
            fs::write(path, &json)?;
            info!(path = %path.display(), "wrote instrumented module");
        }
        None if !outputs.print => println!("{json}"),
        None => {}
    }
    if outputs.print {
        println!("{module}");
    }

    if let Some(path) = &outputs.manifest {
        let manifest = InstrumentManifest::new(input_digest, seed, pass.config().num_hash, started_ms)
            .finish(
                now_ms(),
                hash_serde(&module)?,
                report.accumulators.clone(),
                (&report.stats).into(),
            );
        fs::write(path, serde_json::to_string_pretty(&manifest)?)?;
        info!(path = %path.display(), run = %manifest.id.0, "wrote manifest");
    }

    eprintln!("✓ Instrumented '{}'", module.name);
    eprintln!("  Seed: {}", seed);
    eprintln!("  Folds: {}", report.stats.folds);
    eprintln!("  Log events: {}", report.stats.log_events);
    eprintln!("  Terminators: {}", report.stats.terminators);
    Ok(())
}

fn validate(module_path: &Path, facts_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let module = load_module(module_path)?;
    module.validate()?;
    let facts = load_facts(facts_path, &module)?;
    let analysis = ModuleAnalysis::new(&module, facts)?;
    analysis.check_coverage(&module)?;
    Ok(())
}

fn explain_module(
    module_path: &Path,
    facts_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let module = load_module(module_path)?;
    let facts = load_facts(facts_path, &module)?;
    let analysis = ModuleAnalysis::new(&module, facts)?;
    let config = InstrumentConfig::from_env();
    let functions = explain(&module, &analysis, &config)?;

    println!("Instrumentation Plan for '{}'", module.name);
    println!("==============================");
    println!("Accumulators: {}", config.num_hash);
    println!();
    for f in &functions {
        if let Some(skip) = f.skipped {
            println!("{}: skipped ({:?})", f.name, skip);
            continue;
        }
        println!("{}:", f.name);
        for b in &f.blocks {
            let mut notes = Vec::new();
            if b.exit {
                notes.push("exit".to_string());
            }
            if b.skipped {
                notes.push("skipped".to_string());
            }
            if let Some(header) = b.loop_header {
                notes.push(format!("loop {header}"));
            }
            println!("  {} [{}]", b.id, notes.join(", "));
            for s in &b.sites {
                let fold = match s.fold {
                    FoldDecision::None => "-".to_string(),
                    FoldDecision::InputDependent => "input-dependent".to_string(),
                    FoldDecision::Declined => "declined".to_string(),
                    FoldDecision::Fold(p) => format!("fold {p:?}").to_lowercase(),
                };
                let log = match s.log {
                    LogDecision::Suppressed => "suppressed",
                    LogDecision::Always => "always",
                    LogDecision::ExternalCall => "external call",
                    LogDecision::Coin => "coin",
                };
                let end = if s.terminator { ", terminator" } else { "" };
                println!("    {}: {}; log {}{}", s.inst, fold, log, end);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{is_yaml, load_facts, CliOverrides, InstrumentConfig};
    use ohash_core::id::BlockId;
    use ohash_core::ir::{Block, Function, Module};
    use std::path::Path;

    #[test]
    fn cli_overrides_take_priority_over_env_values() {
        let mut config = InstrumentConfig {
            num_hash: 4,
            seed: Some(1),
            ..InstrumentConfig::default()
        };
        let overrides = CliOverrides {
            num_hash: Some(8),
            seed: None,
        };
        overrides.apply(&mut config);
        assert_eq!(config.num_hash, 8);
        assert_eq!(config.seed, Some(1));
    }

    #[test]
    fn yaml_is_picked_by_extension() {
        assert!(is_yaml(Path::new("m.yaml")));
        assert!(is_yaml(Path::new("dir/m.yml")));
        assert!(!is_yaml(Path::new("m.json")));
        assert!(!is_yaml(Path::new("m")));
    }

    #[test]
    fn missing_facts_path_falls_back_to_permissive_results() {
        let mut module = Module::new("m");
        module.functions = vec![
            Function::declaration("ext", vec![], ohash_core::types::Type::Void),
            Function {
                name: "f".into(),
                params: vec![],
                ret: ohash_core::types::Type::Void,
                blocks: vec![Block::new(BlockId::new(0), vec![])],
            },
        ];
        let facts = load_facts(None, &module).unwrap();
        assert_eq!(facts.functions.keys().collect::<Vec<_>>(), vec!["f"]);
        assert!(facts.functions["f"].input_independent);
    }
}
