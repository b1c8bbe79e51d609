//! `remodel` command-line driver
//!
//! Loads a document and an engine configuration, then rewrites, lists rules
//! or reports which nodes would be rewritten.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use remodel_core::{load_record, EngineConfig};
use remodel_rules::RuleSet;
use remodel_tree::{MemorySession, NodeId, NodeRecord, Session, Tree};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let document = Arg::new("document")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Document to process (.yaml, .yml or .json)");

    Command::new("remodel")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Rule-based rewriting of content trees")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Engine configuration (.yaml, .yml or .json)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("rewrite")
                .about("Rewrite a document to a fixed point")
                .arg(document.clone())
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_parser(value_parser!(PathBuf))
                        .help("Write the result here instead of stdout"),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .default_value("yaml")
                        .value_parser(["yaml", "json"])
                        .help("Output format"),
                )
                .arg(
                    Arg::new("report")
                        .long("report")
                        .action(ArgAction::SetTrue)
                        .help("Print a JSON rewrite report to stderr"),
                ),
        )
        .subcommand(Command::new("rules").about("List configured rules in ranking order"))
        .subcommand(
            Command::new("matches")
                .about("List nodes some rule matches, without rewriting")
                .arg(document),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(args: &ArgMatches) -> Result<EngineConfig> {
    match args.get_one::<PathBuf>("config") {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading configuration {}", path.display())),
        None => Ok(EngineConfig::new()),
    }
}

fn open_document(config: &EngineConfig, path: &Path) -> Result<(MemorySession, NodeId)> {
    let record = load_record(path).with_context(|| format!("loading document {}", path.display()))?;
    let tree = Tree::from_record(&record, config.store.clone())?;
    let root = tree.root();
    Ok((MemorySession::new(tree), root))
}

fn render(record: &NodeRecord, format: &str) -> Result<String> {
    Ok(match format {
        "json" => record.to_json()?,
        _ => record.to_yaml()?,
    })
}

fn rewrite(args: &ArgMatches) -> Result<()> {
    let config = load_config(args)?;
    let rewriter = config.rewriter()?;
    let path = args
        .get_one::<PathBuf>("document")
        .context("missing document")?;
    let (mut session, document) = open_document(&config, path)?;

    let report = rewriter
        .rewrite_with_report(&mut session, document)
        .with_context(|| format!("rewriting {}", path.display()))?;
    info!(
        document = %path.display(),
        applications = report.applications,
        "document rewritten"
    );

    if args.get_flag("report") {
        let summary = serde_json::json!({
            "document": path.display().to_string(),
            "passes": report.passes,
            "applications": report.applications,
            "applied_rules": report.applied_rules,
            "removed": report.root.is_none(),
        });
        eprintln!("{}", serde_json::to_string_pretty(&summary)?);
    }

    let Some(root) = report.root else {
        warn!(document = %path.display(), "rules removed the whole document");
        return Ok(());
    };
    let format = args
        .get_one::<String>("format")
        .map_or("yaml", String::as_str);
    let output = render(&session.tree().export(root)?, format)?;
    match args.get_one::<PathBuf>("output") {
        Some(target) => {
            fs::write(target, output).with_context(|| format!("writing {}", target.display()))?;
        }
        None => print!("{output}"),
    }
    Ok(())
}

fn rules(args: &ArgMatches) -> Result<()> {
    let rule_set: RuleSet = load_config(args)?.build_rule_set()?;
    for rule in rule_set.iter() {
        println!("{}\t{}\t{}", rule.ranking(), rule.id(), rule.title());
    }
    Ok(())
}

fn find_matches(args: &ArgMatches) -> Result<()> {
    let config = load_config(args)?;
    let rule_set = config.build_rule_set()?;
    let path = args
        .get_one::<PathBuf>("document")
        .context("missing document")?;
    let (session, document) = open_document(&config, path)?;
    let tree = session.tree();

    for node in rule_set.find_matches(tree, document)? {
        if let Some(rule) = rule_set.first_match(tree, node)? {
            println!("{}\t{}", tree.path(node)?, rule.id());
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json-logs"));

    match matches.subcommand() {
        Some(("rewrite", args)) => rewrite(args),
        Some(("rules", args)) => rules(args),
        Some(("matches", args)) => find_matches(args),
        _ => Ok(()),
    }
}
