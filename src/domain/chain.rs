//! Undercut chain resolution over a snapshot of the trade set.
//!
//! Parent links are plain ids looked up in an index, so nothing stops a chain
//! from looping. Every walk here is bounded by [`MAX_CHAIN_DEPTH`] and stops at
//! the first repeated id.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;

use super::trade::{Trade, TradeId};

/// Longest ancestor walk attempted before a chain is treated as broken.
pub const MAX_CHAIN_DEPTH: usize = 1024;

/// Fees carried over from a parent listing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Inheritance {
    pub fees: f64,
    /// The listing names a parent that does not exist.
    pub missing_reference: bool,
}

/// Display classification of a listing within its chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Lineage {
    Primary,
    UndercutOf {
        parent_id: TradeId,
        parent_item: String,
    },
    UndercutMissing {
        parent_id: TradeId,
    },
}

impl std::fmt::Display for Lineage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lineage::Primary => write!(f, "Primary"),
            Lineage::UndercutOf {
                parent_id,
                parent_item,
            } => write!(f, "Undercut of #{parent_id} ({parent_item})"),
            Lineage::UndercutMissing { .. } => write!(f, "Undercut (reference not found)"),
        }
    }
}

/// Result of walking a listing's ancestors.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ancestry {
    /// Existing ancestors, nearest first.
    pub ancestors: Vec<TradeId>,
    /// The walk revisited an id.
    pub cycle: bool,
    /// The walk ended at a reference that does not resolve.
    pub dangling: Option<TradeId>,
}

/// Id-indexed view of a trade set.
pub struct ChainIndex<'a> {
    by_id: HashMap<TradeId, &'a Trade>,
    children: HashMap<TradeId, Vec<TradeId>>,
}

impl<'a> ChainIndex<'a> {
    pub fn new(trades: &'a [Trade]) -> Self {
        let mut by_id = HashMap::with_capacity(trades.len());
        let mut children: HashMap<TradeId, Vec<TradeId>> = HashMap::new();
        for trade in trades {
            by_id.insert(trade.id, trade);
            if let Some(parent) = trade.parent_trade_id {
                children.entry(parent).or_default().push(trade.id);
            }
        }
        for ids in children.values_mut() {
            ids.sort_unstable();
        }
        ChainIndex { by_id, children }
    }

    pub fn get(&self, id: TradeId) -> Option<&'a Trade> {
        self.by_id.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Fees inherited from `parent_id`: its cumulative fees, or zero with a
    /// flag when the parent cannot be found.
    pub fn resolve_inherited_fees(&self, parent_id: Option<TradeId>) -> Inheritance {
        match parent_id {
            None => Inheritance::default(),
            Some(id) => match self.get(id) {
                Some(parent) => Inheritance {
                    fees: parent.cumulative_fees,
                    missing_reference: false,
                },
                None => {
                    tracing::warn!(parent_id = id, "undercut parent not found, inheriting no fees");
                    Inheritance {
                        fees: 0.0,
                        missing_reference: true,
                    }
                }
            },
        }
    }

    pub fn describe_lineage(&self, trade: &Trade) -> Lineage {
        match trade.parent_trade_id {
            None => Lineage::Primary,
            Some(parent_id) => match self.get(parent_id) {
                Some(parent) => Lineage::UndercutOf {
                    parent_id,
                    parent_item: parent.item.clone(),
                },
                None => Lineage::UndercutMissing { parent_id },
            },
        }
    }

    /// Direct children of `id`, in id order.
    pub fn children_of(&self, id: TradeId) -> &[TradeId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Walks parent links upward from `id`.
    pub fn ancestry(&self, id: TradeId) -> Ancestry {
        let mut result = Ancestry::default();
        let mut seen = HashSet::from([id]);
        let mut current = self.get(id).and_then(|t| t.parent_trade_id);

        while let Some(parent_id) = current {
            if result.ancestors.len() >= MAX_CHAIN_DEPTH || !seen.insert(parent_id) {
                tracing::warn!(trade_id = id, parent_id, "undercut chain loops back on itself");
                result.cycle = true;
                break;
            }
            match self.get(parent_id) {
                Some(parent) => {
                    result.ancestors.push(parent_id);
                    current = parent.parent_trade_id;
                }
                None => {
                    result.dangling = Some(parent_id);
                    break;
                }
            }
        }
        result
    }

    /// True when making `parent_id` the parent of `trade_id` would close a loop.
    pub fn would_create_cycle(&self, trade_id: TradeId, parent_id: TradeId) -> bool {
        if trade_id == parent_id {
            return true;
        }
        let walk = self.ancestry(parent_id);
        walk.cycle || walk.ancestors.contains(&trade_id)
    }

    /// Every descendant of `id`, breadth first, so each parent precedes its children.
    pub fn descendants(&self, id: TradeId) -> Vec<TradeId> {
        let mut order = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            for &child in self.children_of(current) {
                if seen.insert(child) {
                    order.push(child);
                    queue.push_back(child);
                }
            }
        }
        order
    }

    /// Trades `id` may pick as its undercut parent: everything except itself
    /// and its descendants. `None` lists every trade, as for a new listing.
    pub fn undercut_candidates(&self, id: Option<TradeId>) -> Vec<&'a Trade> {
        let excluded: HashSet<TradeId> = match id {
            Some(id) => {
                let mut ids: HashSet<_> = self.descendants(id).into_iter().collect();
                ids.insert(id);
                ids
            }
            None => HashSet::new(),
        };
        let mut candidates: Vec<&Trade> = self
            .by_id
            .values()
            .filter(|t| !excluded.contains(&t.id))
            .copied()
            .collect();
        candidates.sort_by_key(|t| std::cmp::Reverse(t.id));
        candidates
    }
}
