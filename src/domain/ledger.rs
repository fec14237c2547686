//! Ledger operations over a trade store.
//!
//! Every write values the listing against the current state of the store and
//! keeps the chain consistent: a parent's cumulative fees flow into each
//! child, and changes to a parent are pushed down to all of its descendants.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;

use super::backup::{Backup, ImportReport};
use super::chain::{Ancestry, ChainIndex, Inheritance, Lineage};
use super::config_validation::{DEFAULT_BUY_FEE_PCT, DEFAULT_MAX_DUPLICATES, DEFAULT_SELL_FEE_PCT};
use super::error::LedgerError;
use super::summary::{ItemFilter, LedgerSummary};
use super::trade::{FeeSchedule, NewTrade, Trade, TradeId, TradeInput};
use super::valuation::{self, Valuation, ValuationInput};
use crate::ports::trade_store::TradeStore;

/// Values passed into the ledger instead of living in global state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerSettings {
    /// Fee schedule snapshotted onto new listings.
    pub fees: FeeSchedule,
    /// Upper bound on listings created by one save or duplicate request.
    pub max_duplicates: u32,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            fees: FeeSchedule::new(DEFAULT_BUY_FEE_PCT, DEFAULT_SELL_FEE_PCT),
            max_duplicates: DEFAULT_MAX_DUPLICATES as u32,
        }
    }
}

/// Valuation of an unsaved input, as shown while editing.
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    pub valuation: Valuation,
    pub fees: FeeSchedule,
    pub inheritance: Inheritance,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteOutcome {
    pub removed: Trade,
    /// Former children, now roots.
    pub orphaned: Vec<TradeId>,
}

/// A listing together with its resolved lineage.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeView {
    pub trade: Trade,
    pub lineage: Lineage,
}

pub struct Ledger<'a> {
    store: &'a dyn TradeStore,
    settings: LedgerSettings,
}

impl<'a> Ledger<'a> {
    pub fn new(store: &'a dyn TradeStore, settings: LedgerSettings) -> Self {
        Ledger { store, settings }
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    /// Values `input` without persisting anything. A parent that cannot be
    /// found contributes no fees and is flagged instead of failing.
    pub fn preview(&self, input: &TradeInput) -> Result<Preview, LedgerError> {
        let trades = self.store.list_trades()?;
        let index = ChainIndex::new(&trades);
        let inheritance = index.resolve_inherited_fees(input.parent_trade_id);
        let fees = input.fees.unwrap_or(self.settings.fees);
        let valuation = valuation::value_input(input, fees, inheritance.fees)?;
        tracing::debug!(item = %input.item, real_profit = valuation.real_profit, "previewed listing");
        Ok(Preview {
            valuation,
            fees,
            inheritance,
        })
    }

    /// Saves `copies` independent listings from one input. Each copy gets its
    /// own id and the input's parent; copies are never linked to each other.
    pub fn save(&self, input: &TradeInput, copies: u32) -> Result<Vec<Trade>, LedgerError> {
        self.check_copies(copies)?;
        let trades = self.store.list_trades()?;
        let index = ChainIndex::new(&trades);
        require_parent(&index, input.parent_trade_id)?;

        let inheritance = index.resolve_inherited_fees(input.parent_trade_id);
        let checked = valuation::validate(input, self.settings.fees)?;
        let valuation = valuation::value(&checked, inheritance.fees);
        let draft = NewTrade {
            item: input.item.trim().to_string(),
            bid: checked.bid,
            ask: checked.ask,
            fees: checked.fees,
            buy_units: checked.buy_units,
            sell_units: checked.sell_units,
            valuation,
            parent_trade_id: input.parent_trade_id,
            note: input.normalized_note(),
            created_at: Utc::now(),
        };

        let saved = self.store.insert_trades(&vec![draft.clone(); copies as usize])?;
        tracing::info!(
            item = %draft.item,
            copies,
            parent = ?draft.parent_trade_id,
            real_profit = valuation.real_profit,
            "saved listing"
        );
        Ok(saved)
    }

    /// Replaces the raw fields of a listing, keeping its id and creation time.
    /// The fee snapshot is kept unless the input overrides it.
    pub fn edit(&self, id: TradeId, input: &TradeInput) -> Result<Trade, LedgerError> {
        let trades = self.store.list_trades()?;
        let index = ChainIndex::new(&trades);
        let existing = index.get(id).ok_or(LedgerError::TradeNotFound { id })?;

        if let Some(parent_id) = input.parent_trade_id {
            require_parent(&index, Some(parent_id))?;
            if index.would_create_cycle(id, parent_id) {
                return Err(LedgerError::ChainCycle {
                    trade_id: id,
                    parent_id,
                });
            }
        }

        let inheritance = index.resolve_inherited_fees(input.parent_trade_id);
        let checked = valuation::validate(input, existing.fee_schedule())?;
        let valuation = valuation::value(&checked, inheritance.fees);
        let updated = NewTrade {
            item: input.item.trim().to_string(),
            bid: checked.bid,
            ask: checked.ask,
            fees: checked.fees,
            buy_units: checked.buy_units,
            sell_units: checked.sell_units,
            valuation,
            parent_trade_id: input.parent_trade_id,
            note: input.normalized_note(),
            created_at: existing.created_at,
        }
        .into_trade(id);

        self.store.update_trade(&updated)?;
        let refreshed = self.refresh_chains(&[id], false)?;
        tracing::info!(id, refreshed, "edited listing");
        Ok(updated)
    }

    /// Removes a listing. Children are never deleted: their parent reference
    /// is cleared first, then they are revalued as roots.
    pub fn delete(&self, id: TradeId) -> Result<DeleteOutcome, LedgerError> {
        let removed = self
            .store
            .get_trade(id)?
            .ok_or(LedgerError::TradeNotFound { id })?;

        let orphaned = self.store.clear_parent_references(id)?;
        self.store.delete_trade(id)?;
        let refreshed = self.refresh_chains(&orphaned, true)?;

        tracing::info!(id, orphaned = orphaned.len(), refreshed, "deleted listing");
        Ok(DeleteOutcome { removed, orphaned })
    }

    /// Confirmation text naming what a delete does to the listing's children.
    pub fn delete_warning(&self, id: TradeId) -> Result<String, LedgerError> {
        let trades = self.store.list_trades()?;
        let index = ChainIndex::new(&trades);
        if index.get(id).is_none() {
            return Err(LedgerError::TradeNotFound { id });
        }
        let children = index.children_of(id).len();
        Ok(match children {
            0 => format!("Remove listing #{id}?"),
            1 => format!("Remove listing #{id}? 1 child listing will lose its undercut reference."),
            n => format!("Remove listing #{id}? {n} child listings will lose their undercut reference."),
        })
    }

    /// Saves `count` copies of an existing listing with the same raw fields
    /// and fee snapshot. Copies keep the source's parent, never the source itself.
    pub fn duplicate(&self, id: TradeId, count: u32) -> Result<Vec<Trade>, LedgerError> {
        self.check_copies(count)?;
        let source = self
            .store
            .get_trade(id)?
            .ok_or(LedgerError::TradeNotFound { id })?;

        let mut input = TradeInput::from_trade(&source);
        if let Some(parent_id) = input.parent_trade_id {
            if self.store.get_trade(parent_id)?.is_none() {
                tracing::warn!(id, parent_id, "source parent missing, copies saved as roots");
                input.parent_trade_id = None;
            }
        }
        let copies = self.save(&input, count)?;
        tracing::info!(id, count, "duplicated listing");
        Ok(copies)
    }

    pub fn get(&self, id: TradeId) -> Result<Trade, LedgerError> {
        self.store
            .get_trade(id)?
            .ok_or(LedgerError::TradeNotFound { id })
    }

    pub fn lineage(&self, id: TradeId) -> Result<Lineage, LedgerError> {
        let trades = self.store.list_trades()?;
        let index = ChainIndex::new(&trades);
        let trade = index.get(id).ok_or(LedgerError::TradeNotFound { id })?;
        Ok(index.describe_lineage(trade))
    }

    /// Ancestors of `id`, nearest first, as far as the chain resolves.
    pub fn ancestry(&self, id: TradeId) -> Result<Ancestry, LedgerError> {
        let trades = self.store.list_trades()?;
        let index = ChainIndex::new(&trades);
        if index.get(id).is_none() {
            return Err(LedgerError::TradeNotFound { id });
        }
        Ok(index.ancestry(id))
    }

    /// Listings matching `filter`, newest first, with lineage resolved
    /// against the store as it is now.
    pub fn list(&self, filter: &ItemFilter) -> Result<Vec<TradeView>, LedgerError> {
        let trades = self.store.list_trades()?;
        let index = ChainIndex::new(&trades);
        Ok(trades
            .iter()
            .rev()
            .filter(|t| filter.matches(t))
            .map(|t| TradeView {
                trade: t.clone(),
                lineage: index.describe_lineage(t),
            })
            .collect())
    }

    /// Listings `id` may be relisted under; `None` for a new listing.
    pub fn undercut_candidates(&self, id: Option<TradeId>) -> Result<Vec<Trade>, LedgerError> {
        let trades = self.store.list_trades()?;
        let index = ChainIndex::new(&trades);
        Ok(index
            .undercut_candidates(id)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Distinct item names from listings and the registry, sorted.
    pub fn items(&self) -> Result<Vec<String>, LedgerError> {
        let mut names: BTreeSet<String> = self.store.list_registered_items()?.into_iter().collect();
        names.extend(self.store.list_trades()?.into_iter().map(|t| t.item));
        Ok(names.into_iter().collect())
    }

    pub fn register_item(&self, name: &str) -> Result<bool, LedgerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::invalid("item", "item name must not be empty"));
        }
        let added = self.store.register_item(name)?;
        if added {
            tracing::info!(item = name, "registered item");
        }
        Ok(added)
    }

    /// Autocomplete: case-insensitive prefix matches first, then substring matches.
    pub fn suggest_items(&self, query: &str, limit: usize) -> Result<Vec<String>, LedgerError> {
        let needle = query.trim().to_lowercase();
        let names = self.items()?;
        let (prefix, rest): (Vec<String>, Vec<String>) = names
            .into_iter()
            .filter(|n| n.to_lowercase().contains(&needle))
            .partition(|n| n.to_lowercase().starts_with(&needle));
        Ok(prefix.into_iter().chain(rest).take(limit).collect())
    }

    pub fn summary(&self, filter: &ItemFilter) -> Result<LedgerSummary, LedgerError> {
        let trades = self.store.list_trades()?;
        Ok(LedgerSummary::compute(&trades, filter))
    }

    /// Deletes every listing and item. There is no undo.
    pub fn reset(&self) -> Result<(), LedgerError> {
        self.store.reset()?;
        tracing::info!("ledger reset");
        Ok(())
    }

    pub fn export_backup(&self) -> Result<Backup, LedgerError> {
        let items = self.items()?;
        let trades = self.store.list_trades()?;
        tracing::info!(trades = trades.len(), items = items.len(), "exported backup");
        Ok(Backup::new(items, trades, Utc::now()))
    }

    /// Appends a backup under fresh ids. Recorded valuations are kept for
    /// trades whose parent came along; parent links are re-mapped. Links to
    /// trades missing from the document are cleared and those trades, with
    /// their descendants, are revalued as roots.
    pub fn import_backup(&self, backup: &Backup) -> Result<ImportReport, LedgerError> {
        backup.validate()?;
        let mut report = ImportReport::default();

        for name in &backup.items {
            let name = name.trim();
            if !name.is_empty() && self.store.register_item(name)? {
                report.items_registered += 1;
            }
        }

        let ordered = backup.trades_in_import_order();
        let mut inserted = Vec::with_capacity(ordered.len());
        for original in &ordered {
            let mut draft = original.to_new_trade();
            draft.parent_trade_id = None;
            let trade = self.store.insert_trade(&draft)?;
            report.id_map.insert(original.id, trade.id);
            inserted.push(trade);
        }

        for (original, mut trade) in ordered.iter().zip(inserted) {
            let Some(old_parent) = original.parent_trade_id else {
                continue;
            };
            match report.remap(old_parent) {
                Some(new_parent) => {
                    trade.parent_trade_id = Some(new_parent);
                    self.store.update_trade(&trade)?;
                }
                None => {
                    tracing::warn!(
                        original_id = original.id,
                        parent_id = old_parent,
                        "backup parent not in document, reference cleared"
                    );
                    report.cleared_references.push(trade.id);
                }
            }
        }
        self.refresh_chains(&report.cleared_references, true)?;

        tracing::info!(
            imported = report.imported(),
            items = report.items_registered,
            cleared = report.cleared_references.len(),
            "imported backup"
        );
        Ok(report)
    }

    fn check_copies(&self, requested: u32) -> Result<(), LedgerError> {
        if requested == 0 {
            return Err(LedgerError::invalid("count", "must be at least 1"));
        }
        if requested > self.settings.max_duplicates {
            return Err(LedgerError::DuplicateCountExceeded {
                requested,
                max: self.settings.max_duplicates,
            });
        }
        Ok(())
    }

    /// Revalues the descendants of each start id, parents before children.
    /// With `include_starts` the start trades are revalued too. Returns the
    /// number of rows rewritten.
    fn refresh_chains(&self, starts: &[TradeId], include_starts: bool) -> Result<usize, LedgerError> {
        if starts.is_empty() {
            return Ok(0);
        }
        let trades = self.store.list_trades()?;
        let index = ChainIndex::new(&trades);

        let mut order = Vec::new();
        for &start in starts {
            if include_starts {
                order.push(start);
            }
            order.extend(index.descendants(start));
        }

        let mut cumulative: HashMap<TradeId, f64> = HashMap::new();
        let mut rewritten = 0;
        for id in order {
            let Some(current) = index.get(id) else {
                continue;
            };
            let inherited = match current.parent_trade_id {
                None => 0.0,
                Some(parent_id) => match cumulative.get(&parent_id) {
                    Some(&fees) => fees,
                    None => index.resolve_inherited_fees(Some(parent_id)).fees,
                },
            };
            let fresh = valuation::value(
                &ValuationInput {
                    bid: current.bid,
                    ask: current.ask,
                    buy_units: current.buy_units,
                    sell_units: current.sell_units,
                    fees: current.fee_schedule(),
                },
                inherited,
            );
            cumulative.insert(id, fresh.cumulative_fees);
            if fresh.cumulative_fees != current.cumulative_fees
                || fresh.real_profit != current.real_profit
                || fresh.inherited_fees != current.inherited_fees
            {
                let mut updated = current.clone();
                updated.apply_valuation(&fresh);
                self.store.update_trade(&updated)?;
                rewritten += 1;
            }
        }
        Ok(rewritten)
    }
}

fn require_parent(index: &ChainIndex<'_>, parent_id: Option<TradeId>) -> Result<(), LedgerError> {
    match parent_id {
        Some(id) if index.get(id).is_none() => Err(LedgerError::invalid(
            "parent_trade_id",
            format!("listing #{id} does not exist"),
        )),
        _ => Ok(()),
    }
}
