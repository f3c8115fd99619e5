//! The layout command: print the computed arena regions for a session.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use pulso_arena::{NODE_SIZE, Regions};

use crate::session::SessionConfig;

#[derive(Args)]
pub struct LayoutArgs {
    /// Session config file (TOML); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,
}

pub fn run(args: LayoutArgs) -> anyhow::Result<()> {
    let session = match &args.config {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("loading session {}", path.display()))?,
        None => SessionConfig::default(),
    };

    let config = session.arena_config();
    let regions = Regions::compute(&config)?;
    let total_bytes = regions.total_words * 4;

    println!("arena layout for {} nodes:", config.node_capacity);
    println!("  {:<18} {:>10}  {:>10}", "region", "offset", "bytes");
    println!("  {:<18} {:>10}  {:>10}", "header", 0, 128);
    println!("  {:<18} {:>10}  {:>10}", "registers", 128, 128);
    println!(
        "  {:<18} {:>10}  {:>10}",
        "node heap",
        regions.heap,
        config.node_capacity * NODE_SIZE
    );
    println!(
        "  {:<18} {:>10}  {:>10}",
        "identity table",
        regions.id_table,
        regions.table_capacity * 8
    );
    println!(
        "  {:<18} {:>10}  {:>10}",
        "symbol table",
        regions.symbol_table,
        regions.table_capacity * 8
    );
    println!(
        "  {:<18} {:>10}  {:>10}",
        "groove templates",
        regions.groove,
        config.groove_slots * 17 * 4
    );
    println!(
        "  {:<18} {:>10}  {:>10}",
        "command ring",
        regions.ring,
        config.ring_capacity * 16
    );
    println!();
    println!(
        "total: {} bytes ({:.1} KiB); zones split at node {} ({} free-list, {} bump)",
        total_bytes,
        total_bytes as f64 / 1024.0,
        config.zone_split,
        config.zone_split,
        config.node_capacity - config.zone_split
    );
    println!(
        "identity/symbol capacity: {} entries (load warning past {})",
        regions.table_capacity,
        regions.table_capacity * 3 / 4
    );

    Ok(())
}
