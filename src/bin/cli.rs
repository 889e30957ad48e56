// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Polyframe CSG routing CLI

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use polyframe_csg::routing::Emission;
use polyframe_csg::{
    load_description_file, logging, BuiltTrees, Category, CsgKernel, FragmentCategories,
    NodeHandle, OperationKind, RoutingConfig, TableFamily, TreeRouting,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "polyframe-csg")]
#[command(about = "Polyframe CSG - category routing for brush trees", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Routing configuration file (defaults to csg-routing.toml when present)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the operation tables
    Tables {
        /// Table family to print; both when omitted
        #[arg(short, long)]
        family: Option<FamilyArg>,
    },

    /// Evaluate a tree description and print its routing tables
    Dump {
        /// Tree description (.json or .toml)
        input: PathBuf,

        /// Only dump this tree
        #[arg(short, long)]
        tree: Option<String>,
    },

    /// Route one fragment of a brush through its tree
    Route {
        /// Tree description (.json or .toml)
        input: PathBuf,

        /// Id of the brush the fragment belongs to
        #[arg(short, long)]
        origin: String,

        /// Fragment category relative to a brush, as ID=I|A|R|O
        #[arg(short = 'C', long = "category", value_name = "ID=CAT")]
        categories: Vec<String>,
    },

    /// Show version information
    Version,
}

#[derive(Clone, Copy, ValueEnum)]
enum FamilyArg {
    Regular,
    Overlap,
}

impl From<FamilyArg> for TableFamily {
    fn from(arg: FamilyArg) -> Self {
        match arg {
            FamilyArg::Regular => TableFamily::Regular,
            FamilyArg::Overlap => TableFamily::OverlapRemoval,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_with_level(if cli.verbose { "debug" } else { "warn" });

    let result = match &cli.command {
        Commands::Tables { family } => {
            tables_command(*family);
            Ok(())
        }
        Commands::Dump { input, tree } => {
            load_config(&cli).and_then(|config| dump_command(input, tree.as_deref(), config))
        }
        Commands::Route {
            input,
            origin,
            categories,
        } => load_config(&cli).and_then(|config| route_command(input, origin, categories, config)),
        Commands::Version => {
            println!("Polyframe CSG v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("\n{} {:#}", "Error:".red().bold(), err);
        std::process::exit(1);
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<RoutingConfig> {
    match &cli.config {
        Some(path) => {
            let mut config = RoutingConfig::from_file(path)?;
            config.apply_env_overrides()?;
            Ok(config)
        }
        None => RoutingConfig::load(),
    }
}

fn tables_command(family: Option<FamilyArg>) {
    let families: Vec<TableFamily> = match family {
        Some(arg) => vec![arg.into()],
        None => TableFamily::ALL.to_vec(),
    };

    for family in families {
        println!("\n{}", format!("{} tables", family).bold());
        for op in OperationKind::ALL {
            println!("  {} {}", op.to_string().cyan(), "(rows: left, columns: right)".bright_black());
            println!("       {}", "I A R O".bright_black());
            for left in Category::ALL {
                let entries: Vec<String> = Category::ALL
                    .iter()
                    .map(|right| family.apply(op, left, *right).symbol().to_string())
                    .collect();
                println!("    {}  {}", left.symbol().to_string().bold(), entries.join(" "));
            }
        }
    }
}

fn dump_command(input: &Path, only: Option<&str>, config: RoutingConfig) -> Result<()> {
    let (kernel, built) = load_description_file(input, config)?;

    let trees: Vec<&(String, NodeHandle)> = match only {
        Some(id) => {
            let tree = built
                .trees
                .iter()
                .find(|(tree_id, _)| tree_id == id)
                .with_context(|| format!("No tree with id '{}'", id))?;
            vec![tree]
        }
        None => built.trees.iter().collect(),
    };

    for (id, tree) in trees {
        let routing = kernel.routing(*tree)?;
        print_routing(id, &routing, &built);
    }
    print_stats(&kernel);
    Ok(())
}

fn print_routing(id: &str, routing: &TreeRouting, built: &BuiltTrees) {
    println!("\n{}", "━".repeat(60).bright_black());
    println!("{} {}", "Tree:".bold(), id.cyan());
    println!("{}", "━".repeat(60).bright_black());

    for node in routing.snapshot().nodes() {
        let name = built.id_of(node.handle).unwrap_or("?");
        let mesh = node.mesh.map(|m| m.to_string()).unwrap_or_default();
        println!(
            "{}{} {:?} {} {}",
            "  ".repeat(node.depth as usize + 1),
            name.bold(),
            node.variant,
            node.operation.symbol(),
            mesh.bright_black()
        );
    }

    let table = routing.shared_table();
    println!(
        "\n{} {} rows, {} lookups, {} dedicated tables",
        "Routing table:".bold(),
        table.row_count(),
        table.node_count(),
        routing.dedicated_count()
    );
    for (slot, lookup) in table.lookups().iter().enumerate() {
        let name = table
            .node(slot)
            .and_then(|h| built.id_of(h))
            .unwrap_or("?");
        let rows: Vec<String> = Category::ALL
            .iter()
            .map(|c| format!("{}:{}", c.symbol(), table.route(slot, *c)))
            .collect();
        println!(
            "  {:>3} {:<12} [{:>3}, {:>3})  {}",
            slot,
            name,
            lookup.start,
            lookup.end,
            rows.join(" ")
        );
    }
}

fn route_command(input: &Path, origin: &str, categories: &[String], config: RoutingConfig) -> Result<()> {
    let (kernel, built) = load_description_file(input, config)?;
    let origin_handle = built
        .handle(origin)
        .with_context(|| format!("No node with id '{}'", origin))?;
    let tree = kernel
        .hierarchy()
        .tree_of(origin_handle)
        .with_context(|| format!("'{}' is not part of a tree", origin))?;

    let mut fragment = FragmentCategories::new(origin_handle);
    for entry in categories {
        let (id, symbol) = entry
            .split_once('=')
            .with_context(|| format!("Expected ID=CATEGORY, got '{}'", entry))?;
        let brush = built
            .handle(id.trim())
            .with_context(|| format!("No node with id '{}'", id))?;
        let Some(category) = Category::parse(symbol) else {
            bail!("Unknown category '{}' (expected I, A, R or O)", symbol);
        };
        fragment.set(brush, category);
    }

    let routing = kernel.routing(tree)?;
    let hops = routing.route_chain(origin_handle, &fragment)?;
    let category = kernel.categorize(tree, origin_handle, &fragment)?;

    println!("\n{} {}", "Origin:".bold(), origin.cyan());
    if routing.has_dedicated(origin_handle) {
        println!("{}", "  uses a dedicated overlap-removal table".yellow());
    }
    for hop in &hops {
        let name = built.id_of(hop.node).unwrap_or("?");
        println!("  {:<12} {}", name, hop.row);
    }
    let verdict = match category.emission() {
        Emission::Emit => "emit".green().bold(),
        Emission::EmitFlipped => "emit flipped".yellow().bold(),
        Emission::Discard => "discard".red().bold(),
    };
    println!("\n{} {} ({})", "Result:".bold(), category, verdict);
    Ok(())
}

fn print_stats(kernel: &CsgKernel) {
    let stats = kernel.cache_stats();
    println!(
        "\n{} {} trees cached, hit rate {:.1}%",
        "Cache:".bold(),
        stats.cached_trees,
        stats.hit_rate()
    );
}
