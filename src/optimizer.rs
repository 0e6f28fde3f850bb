use crate::config::OptimizerConfig;
use crate::error::{OptimizeError, Result};
use crate::format::format_sixteenths;
use crate::packer::pack;
use crate::stock::StockLengthTable;
use crate::types::{CutSheet, CutSheetRow, DemandRecord, GroupKey, SkippedGroup};
use std::collections::BTreeMap;

/// Sums quantities of records sharing a length, shortest length first.
fn consolidate(records: &[&DemandRecord]) -> Vec<(f64, u64)> {
    let mut by_length: Vec<(f64, u64)> = records
        .iter()
        .map(|r| (r.length, r.quantity as u64))
        .collect();
    by_length.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut merged: Vec<(f64, u64)> = Vec::with_capacity(by_length.len());
    for (length, qty) in by_length {
        match merged.last_mut() {
            Some(last) if last.0 == length => last.1 += qty,
            _ => merged.push((length, qty)),
        }
    }
    merged
}

fn expand(demand: &[(f64, u64)]) -> Vec<f64> {
    demand
        .iter()
        .flat_map(|&(length, qty)| std::iter::repeat_n(length, qty as usize))
        .collect()
}

/// Packs one (tab, material, diameter) group and formats a row per stick.
///
/// Stick ids are `{material}-{diameter}-{stick_length}-{seq}` with `seq`
/// counting from 0001 within the group.
pub fn optimize_group(
    stock: &StockLengthTable,
    records: &[&DemandRecord],
    material: &str,
    diameter: f64,
    group_tab: &str,
    kerf: f64,
) -> Result<Vec<CutSheetRow>> {
    let stick_length = stock
        .get(material, diameter)
        .ok_or_else(|| OptimizeError::UnknownStockLength {
            material: material.to_string(),
            diameter,
        })?;

    let cuts = expand(&consolidate(records));
    let patterns = pack(&cuts, stick_length, kerf)?;

    let rows = patterns
        .into_iter()
        .enumerate()
        .map(|(i, p)| CutSheetRow {
            stick_id: format!("{material}-{diameter}-{stick_length}-{:04}", i + 1),
            material: material.to_string(),
            diameter,
            stock_length: stick_length,
            pattern: p.cuts.iter().map(|&c| format_sixteenths(c)).collect(),
            piece_count: p.cuts.len(),
            cuts: p.cuts,
            drop: p.drop,
            group_tab: group_tab.to_string(),
        })
        .collect();
    Ok(rows)
}

/// Runs every demand group against one stock catalog and kerf.
pub struct Optimizer<'a> {
    stock: &'a StockLengthTable,
    config: OptimizerConfig,
}

impl<'a> Optimizer<'a> {
    pub fn new(stock: &'a StockLengthTable, config: OptimizerConfig) -> Self {
        Self { stock, config }
    }

    /// Optimizes all groups. Groups that fail are skipped with a warning;
    /// the run fails only when no group produced rows.
    pub fn optimize_all(&self, demand: &[DemandRecord]) -> Result<CutSheet> {
        let mut groups: BTreeMap<GroupKey, Vec<&DemandRecord>> = BTreeMap::new();
        for record in demand {
            groups.entry(record.group_key()).or_default().push(record);
        }

        let mut sheet = CutSheet::default();
        let mut optimized = 0usize;
        for (key, records) in &groups {
            tracing::info!(group = %key, kerf = self.config.kerf, "optimizing group");
            match optimize_group(
                self.stock,
                records,
                &key.material,
                key.diameter,
                &key.group_tab,
                self.config.kerf,
            ) {
                Ok(rows) => {
                    tracing::debug!(group = %key, sticks = rows.len(), "group optimized");
                    sheet.rows.extend(rows);
                    optimized += 1;
                }
                Err(e) => {
                    tracing::warn!(group = %key, error = %e, "skipping group");
                    sheet.skipped.push(SkippedGroup {
                        group_tab: key.group_tab.clone(),
                        material: key.material.clone(),
                        diameter: key.diameter,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if optimized == 0 {
            return Err(OptimizeError::NoGroupsOptimized);
        }

        sheet.rows.sort_by(|a, b| a.group_key().cmp(&b.group_key()));
        Ok(sheet)
    }
}
