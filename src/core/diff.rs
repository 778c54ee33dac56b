//! 对账：目标地图 vs 当前地图的集合差
//!
//! 纯函数，不访问网络；两张网格由调用方提供。两边先各自归一化为 [`Entity`] 集合，
//! 任何无法识别的单元格都会作为错误返回。

use std::collections::BTreeSet;

use crate::astral::{classify, Entity, Grid};
use crate::core::report::{ReconciliationReport, ReportEntry};
use crate::core::NormalizationError;

/// 归一化网格中全部非空单元格；当前地图比目标小或大都完整扫描其自身边界
fn entity_set(grid: &Grid) -> Result<BTreeSet<Entity>, NormalizationError> {
    let mut set = BTreeSet::new();
    for (position, cell) in grid.cells() {
        if let Some(entity) = classify(cell, position)? {
            set.insert(entity);
        }
    }
    Ok(set)
}

/// missing = 目标 − 当前，extra = 当前 − 目标；均按行优先排序
pub fn reconcile(goal: &Grid, observed: &Grid) -> Result<ReconciliationReport, NormalizationError> {
    let goal_set = entity_set(goal)?;
    let observed_set = entity_set(observed)?;

    let missing: Vec<ReportEntry> = goal_set
        .difference(&observed_set)
        .map(ReportEntry::from)
        .collect();
    let extra: Vec<ReportEntry> = observed_set
        .difference(&goal_set)
        .map(ReportEntry::from)
        .collect();

    tracing::debug!(
        goal = goal_set.len(),
        observed = observed_set.len(),
        missing = missing.len(),
        extra = extra.len(),
        "reconciled"
    );

    Ok(ReconciliationReport {
        is_valid: missing.is_empty() && extra.is_empty(),
        missing,
        extra,
        goal_count: goal_set.len(),
        observed_count: observed_set.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astral::{Position, RawCell};

    fn entry(kind: &str, row: usize, column: usize) -> ReportEntry {
        ReportEntry {
            kind: kind.to_string(),
            row,
            column,
        }
    }

    fn goal() -> Grid {
        Grid::from_tokens(vec![
            vec!["SPACE", "POLYANET", "SPACE"],
            vec!["SPACE", "RED_SOLOON", "SPACE"],
        ])
    }

    #[test]
    fn test_detects_missing() {
        let observed = Grid::from_rows(vec![
            vec![None, Some(RawCell::record(0, None)), None],
            vec![None, None, None],
        ]);
        let report = reconcile(&goal(), &observed).unwrap();
        assert!(!report.is_valid);
        assert_eq!(report.missing, vec![entry("RED_SOLOON", 1, 1)]);
        assert!(report.extra.is_empty());
        assert_eq!(report.goal_count, 2);
        assert_eq!(report.observed_count, 1);
    }

    #[test]
    fn test_detects_extra() {
        let goal = Grid::from_tokens(vec![vec!["SPACE", "POLYANET"], vec!["SPACE", "SPACE"]]);
        let observed = Grid::from_rows(vec![
            vec![None, Some(RawCell::record(0, None))],
            vec![None, Some(RawCell::record(1, Some("red")))],
        ]);
        let report = reconcile(&goal, &observed).unwrap();
        assert!(!report.is_valid);
        assert!(report.missing.is_empty());
        assert_eq!(report.extra, vec![entry("RED_SOLOON", 1, 1)]);
    }

    #[test]
    fn test_equal_across_encodings() {
        let observed = Grid::from_rows(vec![
            vec![None, Some(RawCell::record(0, None)), None],
            vec![None, Some(RawCell::record(1, Some("RED"))), None],
        ]);
        let report = reconcile(&goal(), &observed).unwrap();
        assert!(report.is_valid);
        assert!(report.missing.is_empty() && report.extra.is_empty());

        // 同一种编码也应一致
        assert!(reconcile(&goal(), &goal()).unwrap().is_valid);
    }

    #[test]
    fn test_attribute_mismatch_is_both_missing_and_extra() {
        let observed = Grid::from_tokens(vec![
            vec!["SPACE", "POLYANET", "SPACE"],
            vec!["SPACE", "BLUE_SOLOON", "SPACE"],
        ]);
        let report = reconcile(&goal(), &observed).unwrap();
        assert_eq!(report.missing, vec![entry("RED_SOLOON", 1, 1)]);
        assert_eq!(report.extra, vec![entry("BLUE_SOLOON", 1, 1)]);
    }

    #[test]
    fn test_differently_sized_grids() {
        // 当前地图更小：不会误报 extra
        let small = Grid::from_tokens(vec![vec!["SPACE", "POLYANET"]]);
        let report = reconcile(&goal(), &small).unwrap();
        assert_eq!(report.missing, vec![entry("RED_SOLOON", 1, 1)]);
        assert!(report.extra.is_empty());

        // 当前地图更大：越界部分也要扫描
        let large = Grid::from_tokens(vec![
            vec!["SPACE", "POLYANET", "SPACE", "SPACE"],
            vec!["SPACE", "RED_SOLOON", "SPACE", "SPACE"],
            vec!["SPACE", "SPACE", "SPACE", "SPACE"],
            vec!["SPACE", "SPACE", "SPACE", "DOWN_COMETH"],
        ]);
        let report = reconcile(&goal(), &large).unwrap();
        assert!(report.missing.is_empty());
        assert_eq!(report.extra, vec![entry("DOWN_COMETH", 3, 3)]);
    }

    #[test]
    fn test_unrecognized_cell_is_an_error() {
        let observed = Grid::from_tokens(vec![vec!["SPACE", "WORMHOLE"]]);
        let err = reconcile(&goal(), &observed).unwrap_err();
        assert_eq!(err.position, Position::new(0, 1));
        assert_eq!(err.token, "WORMHOLE");
    }
}
