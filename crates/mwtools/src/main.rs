use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use mwtools_core::config::{WikiConfig, load_config};
use mwtools_core::{
    CombineOptions, ExpandOptions, OperationPlan, PageCollection, SetOperator, SetTerm, Wiki,
};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CONFIG_FILE: &str = "mwtools.toml";

#[derive(Debug, Parser)]
#[command(
    name = "mwtools",
    version,
    about = "Discover, filter and combine MediaWiki category members"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH", help = "Config file (default: ./mwtools.toml)")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Print results as JSON")]
    json: bool,
    #[arg(short, long, global = true, help = "Debug logging on stderr")]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Resolve a wiki and report how it will be queried")]
    Probe(ProbeArgs),
    #[command(about = "List the pages of a category or list page")]
    Pages(PagesArgs),
    #[command(about = "Combine several categories with set operations")]
    Set(SetArgs),
    #[command(about = "Compare API and scraped results for one category")]
    Compare(CompareArgs),
}

#[derive(Debug, Args)]
struct ProbeArgs {
    wiki: String,
}

#[derive(Debug, Args)]
struct PagesArgs {
    wiki: String,
    #[arg(value_name = "REF", help = "Category name, namespaced title or URL")]
    reference: String,
    #[arg(long, help = "Include the first level of subcategories")]
    subcats: bool,
    #[arg(long, help = "Walk the whole subcategory tree")]
    recursive: bool,
    #[arg(long, help = "Key results by subcategory")]
    nested: bool,
    #[arg(long, help = "Keep list pages")]
    lists: bool,
    #[arg(long, help = "Only list pages")]
    lists_only: bool,
    #[arg(long, help = "Scrape rendered pages even when the API is available")]
    scrape: bool,
}

#[derive(Debug, Args)]
struct SetArgs {
    wiki: String,
    #[arg(value_name = "REF", required = true)]
    references: Vec<String>,
    #[arg(
        long = "op",
        value_name = "OP",
        required = true,
        help = "union|intersection|difference (aliases: u, i, and, or, not, &, |, -); one per operand or a single one for all"
    )]
    operations: Vec<SetOperator>,
    #[arg(long = "page", value_name = "NAME", help = "Literal page merged last")]
    pages: Vec<String>,
    #[arg(long, help = "Include the first level of subcategories")]
    subcats: bool,
    #[arg(long, help = "Scrape rendered pages even when the API is available")]
    scrape: bool,
}

#[derive(Debug, Args)]
struct CompareArgs {
    wiki: String,
    #[arg(value_name = "REF")]
    reference: String,
    #[arg(long, help = "Include the first level of subcategories")]
    subcats: bool,
    #[arg(long, help = "Walk the whole subcategory tree")]
    recursive: bool,
}

#[derive(Debug, Clone)]
struct RuntimeOptions {
    config: Option<PathBuf>,
    json: bool,
}

impl RuntimeOptions {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            config: cli.config.clone(),
            json: cli.json,
        }
    }

    fn load_config(&self) -> Result<WikiConfig> {
        dotenvy::dotenv().ok();
        let path = self
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        tracing::debug!(path = %normalize_path(&path), "loading config");
        load_config(&path).with_context(|| format!("loading {}", normalize_path(&path)))
    }

    fn connect(&self, wiki: &str) -> Result<Wiki> {
        let config = self.load_config()?;
        Wiki::connect(wiki, &config).with_context(|| format!("connecting to {wiki}"))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let runtime = RuntimeOptions::from_cli(&cli);

    match cli.command {
        Some(Commands::Probe(args)) => run_probe(&runtime, args),
        Some(Commands::Pages(args)) => run_pages(&runtime, args),
        Some(Commands::Set(args)) => run_set(&runtime, args),
        Some(Commands::Compare(args)) => run_compare(&runtime, args),
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run_probe(runtime: &RuntimeOptions, args: ProbeArgs) -> Result<()> {
    let wiki = runtime.connect(&args.wiki)?;
    let identity = wiki.identity();
    if runtime.json {
        return print_json(identity);
    }

    println!("wiki probe");
    println!("base_url: {}", identity.base_url);
    println!("root_segment: {}", identity.root_segment);
    println!("root_source: {}", identity.root_source);
    println!("mode: {}", if identity.has_api() { "api" } else { "scrape" });
    println!(
        "api_endpoint: {}",
        identity.api_endpoint.as_deref().unwrap_or("<none>")
    );
    println!("site_name: {}", wiki.site_name().unwrap_or("<unknown>"));
    Ok(())
}

fn run_pages(runtime: &RuntimeOptions, args: PagesArgs) -> Result<()> {
    let wiki = runtime.connect(&args.wiki)?;
    let options = ExpandOptions {
        include_subcats: args.subcats,
        nested: args.nested,
        include_lists: args.lists,
        recursive: args.recursive,
        lists_only: args.lists_only,
        prefer_api: !args.scrape,
    };
    let collection = wiki.expand(&args.reference, &options)?;
    if runtime.json {
        return print_json(&collection);
    }
    print_collection("pages", &collection);
    Ok(())
}

fn run_set(runtime: &RuntimeOptions, args: SetArgs) -> Result<()> {
    let wiki = runtime.connect(&args.wiki)?;
    let terms = args
        .references
        .iter()
        .map(|reference| wiki.reference(reference).map(SetTerm::from))
        .collect::<mwtools_core::Result<Vec<_>>>()?;
    let trailing = (!args.pages.is_empty()).then(|| args.pages.iter().cloned().collect());
    let plan = build_plan(terms, args.operations, trailing)?;
    let options = CombineOptions {
        include_subcats: args.subcats,
        prefer_api: !args.scrape,
    };

    let pages = wiki.combine(&plan, &options)?;
    if runtime.json {
        return print_json(&pages);
    }
    print_titles("set", &pages);
    Ok(())
}

fn run_compare(runtime: &RuntimeOptions, args: CompareArgs) -> Result<()> {
    let wiki = runtime.connect(&args.wiki)?;
    let options = ExpandOptions {
        include_subcats: args.subcats,
        recursive: args.recursive,
        ..ExpandOptions::default()
    };
    let comparison = wiki.compare_strategies(&args.reference, &options)?;
    if runtime.json {
        return print_json(&comparison);
    }

    println!("strategy comparison");
    println!("equivalent: {}", format_flag(comparison.is_equivalent()));
    println!("shared.count: {}", comparison.shared);
    print_titles("api_only", &comparison.api_only);
    print_titles("scrape_only", &comparison.scrape_only);
    Ok(())
}

/// Accepts one operator for every operand, one per operand, or one per operand
/// after the first (which is always a union).
fn build_plan(
    terms: Vec<SetTerm>,
    operations: Vec<SetOperator>,
    trailing: Option<BTreeSet<String>>,
) -> Result<OperationPlan> {
    let operands = terms.len() + usize::from(trailing.is_some());
    let plan = if operations.len() == 1 {
        OperationPlan::uniform(terms, operations[0], trailing)?
    } else if operations.len() + 1 == operands {
        let operators = std::iter::once(SetOperator::Union)
            .chain(operations)
            .collect();
        OperationPlan::new(terms, operators, trailing)?
    } else {
        OperationPlan::new(terms, operations, trailing)?
    };
    Ok(plan)
}

fn print_collection(prefix: &str, collection: &PageCollection) {
    match collection {
        PageCollection::Flat(titles) => print_titles(prefix, titles),
        PageCollection::Nested(children) => {
            for (key, child) in children {
                print_collection(&format!("{prefix}.{key}"), child);
            }
        }
    }
}

fn print_titles(prefix: &str, titles: &BTreeSet<String>) {
    println!("{prefix}.count: {}", titles.len());
    if titles.is_empty() {
        println!("{prefix}: <none>");
    }
    for title in titles {
        println!("{prefix}.title: {title}");
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
