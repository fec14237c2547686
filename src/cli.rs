//! CLI definition and dispatch.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_backup;
use crate::domain::config_validation::{
    DEFAULT_BUY_FEE_PCT, DEFAULT_MAX_DUPLICATES, DEFAULT_SELL_FEE_PCT, validate_ledger_config,
};
use crate::domain::error::LedgerError;
use crate::domain::ledger::{Ledger, LedgerSettings, Preview};
use crate::domain::summary::{ItemFilter, Totals};
use crate::domain::trade::{FeeSchedule, Trade, TradeId, TradeInput};
use crate::ports::config_port::ConfigPort;
use crate::ports::trade_store::TradeStore;

#[derive(Parser, Debug)]
#[command(name = "tradeledger", about = "Market listing ledger with undercut chains")]
pub struct Cli {
    /// INI file with [fees], [ledger] and [sqlite] sections
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    /// SQLite database file, overrides [sqlite] path
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

/// Raw listing fields shared by add, preview and edit.
#[derive(Args, Debug, Clone)]
pub struct TradeArgs {
    #[arg(long)]
    pub item: String,
    #[arg(long, allow_hyphen_values = true)]
    pub bid: f64,
    #[arg(long, allow_hyphen_values = true)]
    pub ask: f64,
    #[arg(long, allow_hyphen_values = true)]
    pub buy_units: i64,
    /// Defaults to the buy units
    #[arg(long, allow_hyphen_values = true)]
    pub sell_units: Option<i64>,
    /// Id of the listing this one undercuts
    #[arg(long)]
    pub parent: Option<TradeId>,
    #[arg(long)]
    pub note: Option<String>,
    /// Buy fee percentage for this listing only
    #[arg(long)]
    pub buy_fee: Option<f64>,
    /// Sell fee percentage for this listing only
    #[arg(long)]
    pub sell_fee: Option<f64>,
}

impl TradeArgs {
    /// Builds the raw input. A fee flag overrides `base` for its side only.
    pub fn to_input(&self, base: FeeSchedule) -> TradeInput {
        let fees = match (self.buy_fee, self.sell_fee) {
            (None, None) => None,
            (buy, sell) => Some(FeeSchedule::new(
                buy.unwrap_or(base.buy_pct),
                sell.unwrap_or(base.sell_pct),
            )),
        };
        TradeInput {
            item: self.item.clone(),
            bid: self.bid,
            ask: self.ask,
            buy_units: self.buy_units,
            sell_units: self.sell_units.unwrap_or(self.buy_units),
            parent_trade_id: self.parent,
            note: self.note.clone(),
            fees,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record a listing
    Add {
        #[command(flatten)]
        trade: TradeArgs,
        /// Number of identical listings to save
        #[arg(long, default_value_t = 1)]
        copies: u32,
    },
    /// Value a listing without saving it
    Preview {
        #[command(flatten)]
        trade: TradeArgs,
    },
    /// Replace the fields of a listing
    Edit {
        id: TradeId,
        #[command(flatten)]
        trade: TradeArgs,
    },
    /// Remove a listing, keeping its undercuts as primary listings
    Delete {
        id: TradeId,
        #[arg(long)]
        yes: bool,
    },
    /// Save copies of an existing listing
    Duplicate {
        id: TradeId,
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
    /// List listings, newest first
    List {
        #[arg(long)]
        item: Option<String>,
    },
    /// Show one listing with its lineage
    Show { id: TradeId },
    /// Listings that may be chosen as the parent of an undercut
    Candidates {
        /// Listing being edited; omit for a new listing
        #[arg(long = "for")]
        for_id: Option<TradeId>,
    },
    /// Ledger totals with per-item and daily breakdowns
    Summary {
        #[arg(long)]
        item: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Known item names, or suggestions for a partial name
    Items {
        query: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Add an item name to the registry
    RegisterItem { name: String },
    /// Write a JSON backup of every listing and item
    Export { path: PathBuf },
    /// Write listings as CSV
    ExportCsv {
        path: PathBuf,
        #[arg(long)]
        item: Option<String>,
    },
    /// Load a JSON backup
    Import {
        path: PathBuf,
        /// Clear the ledger before importing
        #[arg(long)]
        replace: bool,
    },
    /// Delete every listing and item
    Reset {
        #[arg(long)]
        yes: bool,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn execute(cli: Cli) -> Result<(), LedgerError> {
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => FileConfigAdapter::empty(),
    };
    let settings = build_settings(&config)?;
    let store = open_store(cli.db.as_deref(), &config)?;
    let ledger = Ledger::new(store.as_ref(), settings);
    dispatch(&ledger, cli.command)
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, LedgerError> {
    FileConfigAdapter::from_file(path).map_err(|e| LedgerError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

pub fn build_settings(config: &dyn ConfigPort) -> Result<LedgerSettings, LedgerError> {
    validate_ledger_config(config)?;
    let max_duplicates = config.get_int("ledger", "max_duplicates", DEFAULT_MAX_DUPLICATES);
    Ok(LedgerSettings {
        fees: FeeSchedule::new(
            config.get_double("fees", "buy_pct", DEFAULT_BUY_FEE_PCT),
            config.get_double("fees", "sell_pct", DEFAULT_SELL_FEE_PCT),
        ),
        max_duplicates: u32::try_from(max_duplicates).map_err(|_| LedgerError::ConfigInvalid {
            section: "ledger".into(),
            key: "max_duplicates".into(),
            reason: "out of range".into(),
        })?,
    })
}

#[cfg(feature = "sqlite")]
fn open_store(
    db_override: Option<&Path>,
    config: &dyn ConfigPort,
) -> Result<Box<dyn TradeStore>, LedgerError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    let adapter = SqliteAdapter::from_config(config, db_override)?;
    adapter.initialize_schema()?;
    Ok(Box::new(adapter))
}

#[cfg(not(feature = "sqlite"))]
fn open_store(
    _db_override: Option<&Path>,
    _config: &dyn ConfigPort,
) -> Result<Box<dyn TradeStore>, LedgerError> {
    Err(LedgerError::Database {
        reason: "sqlite feature is required".into(),
    })
}

pub fn dispatch(ledger: &Ledger<'_>, command: Command) -> Result<(), LedgerError> {
    match command {
        Command::Add { trade, copies } => run_add(ledger, &trade, copies),
        Command::Preview { trade } => run_preview(ledger, &trade),
        Command::Edit { id, trade } => run_edit(ledger, id, &trade),
        Command::Delete { id, yes } => run_delete(ledger, id, yes),
        Command::Duplicate { id, count } => run_duplicate(ledger, id, count),
        Command::List { item } => run_list(ledger, &filter_for(item)),
        Command::Show { id } => run_show(ledger, id),
        Command::Candidates { for_id } => run_candidates(ledger, for_id),
        Command::Summary { item, json } => run_summary(ledger, &filter_for(item), json),
        Command::Items { query, limit } => run_items(ledger, query.as_deref(), limit),
        Command::RegisterItem { name } => run_register_item(ledger, &name),
        Command::Export { path } => run_export(ledger, &path),
        Command::ExportCsv { path, item } => run_export_csv(ledger, path, &filter_for(item)),
        Command::Import { path, replace } => run_import(ledger, &path, replace),
        Command::Reset { yes } => run_reset(ledger, yes),
    }
}

fn filter_for(item: Option<String>) -> ItemFilter {
    ItemFilter { item }
}

fn run_add(ledger: &Ledger<'_>, args: &TradeArgs, copies: u32) -> Result<(), LedgerError> {
    let input = args.to_input(ledger.settings().fees);
    let saved = ledger.save(&input, copies)?;
    for trade in &saved {
        println!("{}", format_row(trade));
    }
    eprintln!("{} listing(s) saved", saved.len());
    Ok(())
}

fn run_preview(ledger: &Ledger<'_>, args: &TradeArgs) -> Result<(), LedgerError> {
    let input = args.to_input(ledger.settings().fees);
    let preview = ledger.preview(&input)?;
    print_preview(&preview);
    Ok(())
}

fn run_edit(ledger: &Ledger<'_>, id: TradeId, args: &TradeArgs) -> Result<(), LedgerError> {
    let existing = ledger.get(id)?;
    let input = args.to_input(existing.fee_schedule());
    let updated = ledger.edit(id, &input)?;
    println!("{}", format_row(&updated));
    Ok(())
}

fn run_delete(ledger: &Ledger<'_>, id: TradeId, yes: bool) -> Result<(), LedgerError> {
    let warning = ledger.delete_warning(id)?;
    if !yes {
        eprintln!("{warning}");
        return Err(LedgerError::invalid("yes", "pass --yes to confirm the delete"));
    }
    let outcome = ledger.delete(id)?;
    eprintln!(
        "Removed #{} ({}); {} undercut(s) are now primary listings",
        outcome.removed.id,
        outcome.removed.item,
        outcome.orphaned.len()
    );
    Ok(())
}

fn run_duplicate(ledger: &Ledger<'_>, id: TradeId, count: u32) -> Result<(), LedgerError> {
    let copies = ledger.duplicate(id, count)?;
    for trade in &copies {
        println!("{}", format_row(trade));
    }
    eprintln!("{} copy(ies) of #{id} saved", copies.len());
    Ok(())
}

fn run_list(ledger: &Ledger<'_>, filter: &ItemFilter) -> Result<(), LedgerError> {
    let views = ledger.list(filter)?;
    if views.is_empty() {
        eprintln!("No listings");
        return Ok(());
    }
    println!("{}", header_row());
    for view in &views {
        println!("{}  {}", format_row(&view.trade), view.lineage);
    }
    Ok(())
}

fn run_show(ledger: &Ledger<'_>, id: TradeId) -> Result<(), LedgerError> {
    let trade = ledger.get(id)?;
    let lineage = ledger.lineage(id)?;
    let ancestry = ledger.ancestry(id)?;

    println!("Listing #{}: {}", trade.id, trade.item);
    println!("  Lineage:         {lineage}");
    if !ancestry.ancestors.is_empty() {
        let chain: Vec<String> = ancestry.ancestors.iter().map(|a| format!("#{a}")).collect();
        println!("  Chain:           #{} <- {}", trade.id, chain.join(" <- "));
    }
    if ancestry.cycle {
        println!("  Chain loops back on itself; walk stopped");
    }
    println!("  Created:         {}", trade.created_at.to_rfc3339());
    println!(
        "  Bid / Ask:       {:.2} / {:.2} ({:+.2} per unit)",
        trade.bid,
        trade.ask,
        trade.unit_spread()
    );
    println!("  Units:           {} bought, {} sold", trade.buy_units, trade.sell_units);
    println!("  Fees:            {}% buy, {}% sell", trade.buy_fee, trade.sell_fee);
    println!("  Buy value:       {:.2}", trade.buy_trade_value);
    println!("  Sale value:      {:.2}", trade.trade_value);
    println!("  Spread:          {:.2}", trade.spread);
    println!("  Own fees:        {:.2}", trade.total_fees);
    println!("  Inherited fees:  {:.2}", trade.inherited_fees);
    println!("  Cumulative fees: {:.2}", trade.cumulative_fees);
    println!("  Real profit:     {:.2}", trade.real_profit);
    if let Some(note) = &trade.note {
        println!("  Note:            {note}");
    }
    Ok(())
}

fn run_candidates(ledger: &Ledger<'_>, for_id: Option<TradeId>) -> Result<(), LedgerError> {
    if let Some(id) = for_id {
        ledger.get(id)?;
    }
    for trade in ledger.undercut_candidates(for_id)? {
        println!("#{}  {}  cumulative fees {:.2}", trade.id, trade.item, trade.cumulative_fees);
    }
    Ok(())
}

fn run_summary(ledger: &Ledger<'_>, filter: &ItemFilter, json: bool) -> Result<(), LedgerError> {
    let summary = ledger.summary(filter)?;
    if json {
        let text = serde_json::to_string_pretty(&summary)
            .map_err(|e| LedgerError::Io(std::io::Error::other(e)))?;
        println!("{text}");
        return Ok(());
    }

    println!("Totals");
    print_totals(&summary.totals);
    if !summary.by_item.is_empty() {
        println!("\nBy item");
        for group in &summary.by_item {
            println!(
                "  {:<24} {:>4} listings  net {:>12.2}  fees {:>10.2}",
                group.item, group.totals.trades, group.totals.real_profit, group.totals.fees
            );
        }
    }
    if !summary.daily.is_empty() {
        println!("\nDaily");
        for day in &summary.daily {
            println!(
                "  {}  net {:>12.2}  spread {:>12.2}  fees {:>10.2}  units {:>6}",
                day.date,
                day.totals.real_profit,
                day.totals.spread,
                day.totals.fees,
                day.totals.units
            );
        }
    }
    Ok(())
}

fn run_items(ledger: &Ledger<'_>, query: Option<&str>, limit: usize) -> Result<(), LedgerError> {
    let names = match query {
        Some(q) => ledger.suggest_items(q, limit)?,
        None => ledger.items()?,
    };
    for name in &names {
        println!("{name}");
    }
    Ok(())
}

fn run_register_item(ledger: &Ledger<'_>, name: &str) -> Result<(), LedgerError> {
    if ledger.register_item(name)? {
        eprintln!("Registered {}", name.trim());
    } else {
        eprintln!("{} is already registered", name.trim());
    }
    Ok(())
}

fn run_export(ledger: &Ledger<'_>, path: &Path) -> Result<(), LedgerError> {
    let backup = ledger.export_backup()?;
    json_backup::write_backup(path, &backup)?;
    eprintln!(
        "Wrote {} listings and {} items to {}",
        backup.trades.len(),
        backup.items.len(),
        path.display()
    );
    Ok(())
}

fn run_export_csv(ledger: &Ledger<'_>, path: PathBuf, filter: &ItemFilter) -> Result<(), LedgerError> {
    let views = ledger.list(filter)?;
    let mut trades: Vec<&Trade> = views.iter().map(|v| &v.trade).collect();
    trades.reverse();
    let display = path.display().to_string();
    let rows = CsvAdapter::new(path).export_trades(&trades)?;
    eprintln!("Wrote {rows} rows to {display}");
    Ok(())
}

fn run_import(ledger: &Ledger<'_>, path: &Path, replace: bool) -> Result<(), LedgerError> {
    let backup = json_backup::read_backup(path)?;
    if replace {
        ledger.reset()?;
    }
    let report = ledger.import_backup(&backup)?;
    eprintln!(
        "Imported {} listings and {} new items",
        report.imported(),
        report.items_registered
    );
    if !report.cleared_references.is_empty() {
        eprintln!(
            "{} listing(s) referenced a parent missing from the backup and are now primary",
            report.cleared_references.len()
        );
    }
    Ok(())
}

fn run_reset(ledger: &Ledger<'_>, yes: bool) -> Result<(), LedgerError> {
    if !yes {
        eprintln!("This deletes every listing and item and cannot be undone.");
        return Err(LedgerError::invalid("yes", "pass --yes to confirm the reset"));
    }
    ledger.reset()?;
    eprintln!("Ledger cleared");
    Ok(())
}

fn print_preview(preview: &Preview) {
    let v = &preview.valuation;
    println!(
        "Fees:            {}% buy, {}% sell",
        preview.fees.buy_pct, preview.fees.sell_pct
    );
    println!("Buy value:       {:.2}", v.buy_trade_value);
    println!("Sale value:      {:.2}", v.trade_value);
    println!("Spread:          {:.2}", v.spread);
    println!("Own fees:        {:.2}", v.total_fees);
    println!("Inherited fees:  {:.2}", v.inherited_fees);
    println!("Cumulative fees: {:.2}", v.cumulative_fees);
    println!("Real profit:     {:.2}", v.real_profit);
    if preview.inheritance.missing_reference {
        println!("Parent listing not found; no fees inherited");
    }
}

fn print_totals(totals: &Totals) {
    println!("  Listings:     {} ({} undercuts)", totals.trades, totals.undercuts);
    println!("  Sale value:   {:.2}", totals.sales_value);
    println!("  Buy cost:     {:.2}", totals.buy_value);
    println!("  Market fees:  {:.2}", totals.fees);
    println!("  Spread:       {:.2}", totals.spread);
    println!("  Net profit:   {:.2}", totals.real_profit);
    println!("  Units moved:  {}", totals.units);
}

fn header_row() -> String {
    format!(
        "{:>6}  {:<24} {:>10} {:>10} {:>6} {:>10} {:>12}",
        "id", "item", "bid", "ask", "units", "fees", "real profit"
    )
}

fn format_row(trade: &Trade) -> String {
    format!(
        "{:>6}  {:<24} {:>10.2} {:>10.2} {:>6} {:>10.2} {:>12.2}",
        trade.id,
        trade.item,
        trade.bid,
        trade.ask,
        trade.sell_units,
        trade.cumulative_fees,
        trade.real_profit
    )
}
