use std::{io::Cursor, path::PathBuf};

use anyhow::{Context, Result, bail};
use circulation::{
    IngestReport, LendingEngine, LibraryConfig, Resource,
    ingest::{load_catalog, load_catalog_file, load_members, load_members_file},
    logging::init_logging,
};
use clap::Parser;
use colored::*;

/// Catalog used when no `--catalog` file is given
const DEMO_CATALOG: &str = "\
B001 The_Rust_Programming_Language Steve_Klabnik 552 Programming book 2
B002 Structure_and_Interpretation Harold_Abelson 657 Programming book 1
T001 Wait-free_Data_Structures Maurice_Herlihy 180 Concurrency thesis 1 PhD Brown_University
P001 Hazard_Pointers Maged_Michael 12 Memory paper 1 10.1109/TPDS.2004.8 PODC
";

/// Members used when no `--members` file is given
const DEMO_MEMBERS: &str = "\
M001 Grace_Hopper grace@example.edu faculty
M002 Alan_Turing alan@example.edu student
M003 Ada_Lovelace ada@example.edu alumni
";

/// Command-line arguments for the circulation demo
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Catalog listing: `id title author pages topic type copies [extra...]`
    #[arg(short, long)]
    catalog: Option<PathBuf>,

    /// Member listing: `id name email category`
    #[arg(short, long)]
    members: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for the repair draws, overriding the config
    #[arg(long)]
    seed: Option<u64>,

    /// Log every lending transition
    #[arg(short, long)]
    verbose: bool,

    /// Print the final engine state as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => LibraryConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => LibraryConfig::default(),
    };
    if args.seed.is_some() {
        config.repair.seed = args.seed;
    }
    init_logging(args.verbose)?;

    let engine = LendingEngine::new(config).with_standard_observers();

    let catalog = match &args.catalog {
        Some(path) => load_catalog_file(path, &engine)?,
        None => load_catalog(Cursor::new(DEMO_CATALOG), &engine)?,
    };
    report("catalog", &catalog);
    let members = match &args.members {
        Some(path) => load_members_file(path, &engine)?,
        None => load_members(Cursor::new(DEMO_MEMBERS), &engine)?,
    };
    report("members", &members);

    run_demo(&engine)?;

    if args.json {
        let snapshot = serde_json::to_string_pretty(&engine.snapshot())
            .context("serializing engine snapshot")?;
        println!("{snapshot}");
    }
    Ok(())
}

/// Print the outcome of one listing
fn report(what: &str, report: &IngestReport) {
    println!("Loaded {} {what} entries", report.loaded.to_string().green());
    for skipped in &report.skipped {
        println!("  {} {skipped}", "skipped".yellow());
    }
}

/// Walk the first member through a lending cycle on the first resource
fn run_demo(engine: &LendingEngine) -> Result<()> {
    let member = engine.members().into_iter().next();
    let resource = engine.resources().into_iter().next();
    let (Some(member), Some(resource)) = (member, resource) else {
        bail!("the demo needs at least one member and one resource");
    };
    let member_id = member.id().as_str();
    let resource_id = resource.id().as_str();

    println!("\n{}", "Circulation demonstration".green().bold());
    println!("Member:   {member}");
    println!("Resource: {resource}");

    println!("\n{}", "1. Borrowing".yellow().bold());
    match engine.borrow(member_id, resource_id) {
        Ok(receipt) => println!("Lent copy {} ({})", receipt.copy, receipt.transaction),
        Err(error) => println!("{} {error}", "Declined:".red()),
    }

    println!("\n{}", "2. Clean return".yellow().bold());
    match engine.return_resource(member_id, resource_id, false) {
        Ok(receipt) => println!("Took back copy {} ({})", receipt.copy, receipt.transaction),
        Err(error) => println!("{} {error}", "Refused:".red()),
    }

    println!("\n{}", "3. Damaged return".yellow().bold());
    let damaged = engine
        .borrow(member_id, resource_id)
        .and_then(|_| engine.return_resource(member_id, resource_id, true));
    match damaged {
        Ok(receipt) => match receipt.repair {
            Some(decision) => println!("Copy {} came back damaged: {decision:?}", receipt.copy),
            None => println!("Copy {} came back", receipt.copy),
        },
        Err(error) => println!("{} {error}", "Refused:".red()),
    }

    println!("\n{}", "4. Repair sweep".yellow().bold());
    let sweep = engine.repair_sweep();
    let stats = engine.repair_stats();
    println!(
        "Examined {}, repaired {}, still archived {}",
        sweep.examined, sweep.repaired, sweep.rearchived
    );
    println!("Repair requests so far: {}", stats.repair_count);
    for archived in &stats.archived {
        println!("  archived: {archived}");
    }

    println!("\n{}", "5. Popularity".yellow().bold());
    match engine.most_popular() {
        Some(popular) => println!("Most popular: {}", popular.title().bold()),
        None => println!("Most popular: none"),
    }
    for (rank, item) in engine.popularity_report().iter().enumerate() {
        println!("  {}. {} ({} lends)", rank.saturating_add(1), item.title(), item.borrow_count());
    }

    println!("\n{}", "Ledger".green().bold());
    for transaction in engine.ledger().entries() {
        println!("  {transaction}");
    }
    println!("\n{}", "Final state".green().bold());
    let after = engine.member(member_id);
    if let Some(account) = after {
        println!("  {account}");
    }
    engine.resources().iter().map(Resource::to_string).for_each(|line| println!("  {line}"));
    Ok(())
}
