//! Command dispatch and output rendering

use std::fs;
use std::path::Path;

use ruql_core::config::EngineConfig;
use ruql_core::engine::Engine;
use ruql_core::error::{Result, RuqlError};
use ruql_core::filter::{FilterOptions, FilterReport};
use ruql_core::format::OutputFormat;
use ruql_core::manager::{Bundle, ResourceManager};
use ruql_core::records;
use ruql_core::resolve::ViewMode;
use ruql_core::resource::ResourceId;
use ruql_core::tree::{ResourceTree, TreeNodeKind};

use super::parse::ContextPair;
use super::{Cli, Commands};

/// Execute the parsed command line
pub fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::List { context } => list(cli, context),
        Commands::Resolve { id, context, view } => resolve(cli, id, context, *view),
        Commands::Filter {
            context,
            reduce,
            strict,
        } => filter(cli, context, *reduce, *strict),
        Commands::Tree => tree(cli),
    }
}

/// Build an engine from the --bundle and --config flags
fn load_engine(cli: &Cli) -> Result<Engine> {
    let bundle_path = cli
        .bundle
        .as_ref()
        .ok_or_else(|| RuqlError::UsageError("--bundle is required".to_string()))?;
    let manager = load_manager(bundle_path)?;

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    Ok(Engine::new(config, manager))
}

fn load_manager(path: &Path) -> Result<ResourceManager> {
    let content = fs::read_to_string(path)?;
    let bundle = Bundle::from_json_str(&content).map_err(|e| RuqlError::InvalidBundle {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    ResourceManager::from_bundle(bundle)
}

/// Apply context assignments through the engine's pending/applied cycle
fn apply_context(cli: &Cli, engine: &mut Engine, pairs: &[ContextPair]) {
    for pair in pairs {
        engine.update_context_value(&pair.qualifier, Some(pair.value.clone()));
    }
    let outcome = engine.apply_context();
    if !cli.quiet {
        for warning in &outcome.warnings {
            eprintln!("warning: {}", warning);
        }
    }
}

fn list(cli: &Cli, pairs: &[ContextPair]) -> Result<()> {
    let mut engine = load_engine(cli)?;
    apply_context(cli, &mut engine, pairs);
    let entries = engine.list_resources();

    match cli.format {
        OutputFormat::Human => {
            for entry in &entries {
                let mut annotations = String::new();
                if let Some(kind) = entry.pending {
                    annotations.push_str(&format!(" [{:?}]", kind).to_lowercase());
                }
                if entry.has_edit {
                    annotations.push_str(" [edited]");
                }
                println!(
                    "{}  candidates={}{}",
                    entry.id, entry.candidate_count, annotations
                );
            }
            if !cli.quiet {
                eprintln!("{} resources", entries.len());
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "resources": entries }))?);
        }
        OutputFormat::Records => {
            for entry in &entries {
                println!("{}", records::format_resource_record(entry));
            }
        }
    }
    Ok(())
}

fn resolve(cli: &Cli, id: &str, pairs: &[ContextPair], view: ViewMode) -> Result<()> {
    // Validate the id up front so malformed input gets a precise error.
    let resource_id = ResourceId::new(id)?;
    let mut engine = load_engine(cli)?;
    apply_context(cli, &mut engine, pairs);

    let report = engine.select_resource(resource_id.as_str(), view);

    match cli.format {
        OutputFormat::Human => {
            if let Some(value) = &report.value {
                println!("{}", serde_json::to_string_pretty(value)?);
            }
            for candidate in &report.candidates {
                let conditions = candidate
                    .conditions
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                println!(
                    "candidate {}: matched={} specificity={} [{}]",
                    candidate.index, candidate.matched, candidate.specificity, conditions
                );
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Records => println!("{}", records::format_resolution_record(&report)),
    }

    if report.success {
        Ok(())
    } else {
        Err(RuqlError::ResourceNotFound {
            id: resource_id.to_string(),
        })
    }
}

fn filter(cli: &Cli, pairs: &[ContextPair], reduce: bool, strict: bool) -> Result<()> {
    let mut engine = load_engine(cli)?;
    // The filter context is partial by construction: only the qualifiers
    // assigned on the command line are set.
    apply_context(cli, &mut engine, pairs);
    let options = FilterOptions {
        partial_context_match: !strict,
        reduce_qualifiers: reduce,
    };
    let report = engine.filter_with_applied_context(options)?;
    print_filter_report(cli, &report)?;
    Ok(())
}

fn print_filter_report(cli: &Cli, report: &FilterReport) -> Result<()> {
    match cli.format {
        OutputFormat::Human => {
            for entry in &report.filtered_resources {
                let warn = if entry.has_warning { "  (unresolvable)" } else { "" };
                println!(
                    "{}  kept {}/{}{}",
                    entry.id, entry.filtered_candidate_count, entry.original_candidate_count, warn
                );
            }
            if !cli.quiet {
                for problem in &report.problems {
                    eprintln!("warning: {}", problem);
                }
                eprintln!(
                    "{} resources, {} unresolvable",
                    report.processed_resources,
                    report.warnings.len()
                );
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Records => {
            for entry in &report.filtered_resources {
                println!("{}", records::format_filter_record(entry));
            }
        }
    }
    Ok(())
}

fn tree(cli: &Cli) -> Result<()> {
    let engine = load_engine(cli)?;
    let tree = engine.resource_tree();

    match cli.format {
        OutputFormat::Human => print_tree_human(&tree),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tree)?),
        OutputFormat::Records => {
            for (depth, node) in tree.walk() {
                let kind = match node.kind {
                    TreeNodeKind::Folder => "folder",
                    TreeNodeKind::Resource => "resource",
                };
                println!("T {} {} {}", depth, node.path, kind);
            }
        }
    }
    Ok(())
}

fn print_tree_human(tree: &ResourceTree) {
    for (depth, node) in tree.walk() {
        let indent = "  ".repeat(depth);
        match node.kind {
            TreeNodeKind::Folder => println!("{}{}/", indent, node.name),
            TreeNodeKind::Resource => println!("{}{}", indent, node.name),
        }
    }
}
