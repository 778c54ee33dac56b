//! 运行结果与对账报告
//!
//! [`OperationLog`] 在一次运行内只追加，由编排器独占；[`ReconciliationReport`] 每次校验重新计算，不持久化。

use std::fmt;

use serde::Serialize;

use crate::astral::{Entity, KindTag, Position};
use crate::core::NormalizationError;

/// 远端变更动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Create => f.write_str("Create"),
            Action::Delete => f.write_str("Delete"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// dry-run：只记录意图
    Planned,
    Succeeded,
    Failed,
}

/// 单个实体的处理记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRecord {
    pub kind: KindTag,
    pub position: Position,
    /// 颜色或方向（小写），POLYanet 为 None
    pub attribute: Option<&'static str>,
    pub action: Action,
    pub outcome: Outcome,
}

impl OperationRecord {
    pub fn for_entity(entity: &Entity, action: Action, outcome: Outcome) -> Self {
        use crate::astral::Kind;
        let attribute = match entity.kind() {
            Kind::Polyanet => None,
            Kind::Soloon(color) => Some(color.as_str()),
            Kind::Cometh(direction) => Some(direction.as_str()),
        };
        Self {
            kind: entity.kind().tag(),
            position: entity.position(),
            attribute,
            action,
            outcome,
        }
    }
}

impl fmt::Display for OperationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} at {}", self.action, self.kind, self.position)?;
        if let Some(attr) = self.attribute {
            write!(f, " ({attr})")?;
        }
        Ok(())
    }
}

pub type OperationLog = Vec<OperationRecord>;

/// 一次运行（pattern / goal / reset / clear）的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResult {
    pub success: bool,
    pub dry_run: bool,
    pub operations: OperationLog,
    pub errors: Vec<NormalizationError>,
}

impl RunResult {
    pub fn count(&self, outcome: Outcome) -> usize {
        self.operations
            .iter()
            .filter(|op| op.outcome == outcome)
            .count()
    }

    pub fn planned(&self) -> usize {
        self.count(Outcome::Planned)
    }

    pub fn completed(&self) -> usize {
        self.count(Outcome::Succeeded)
    }
}

/// 对账报告中的单项
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub row: usize,
    pub column: usize,
}

impl From<&Entity> for ReportEntry {
    fn from(entity: &Entity) -> Self {
        let Position { row, column } = entity.position();
        Self {
            kind: entity.kind().token(),
            row,
            column,
        }
    }
}

impl fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at ({}, {})", self.kind, self.row, self.column)
    }
}

/// 目标 vs 当前的差异
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub is_valid: bool,
    pub missing: Vec<ReportEntry>,
    pub extra: Vec<ReportEntry>,
    pub goal_count: usize,
    pub observed_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astral::Color;

    #[test]
    fn test_record_carries_attribute() {
        let rec = OperationRecord::for_entity(
            &Entity::soloon(1, 2, Color::Purple),
            Action::Create,
            Outcome::Planned,
        );
        assert_eq!(rec.kind, KindTag::Soloon);
        assert_eq!(rec.attribute, Some("purple"));
        assert_eq!(rec.to_string(), "Create SOLoon at (1, 2) (purple)");
    }

    #[test]
    fn test_report_serializes_type_field() {
        let report = ReconciliationReport {
            is_valid: false,
            missing: vec![ReportEntry::from(&Entity::soloon(1, 1, Color::Red))],
            extra: vec![],
            goal_count: 2,
            observed_count: 1,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["isValid"], false);
        assert_eq!(json["missing"][0]["type"], "RED_SOLOON");
        assert_eq!(json["missing"][0]["column"], 1);
        assert_eq!(json["observedCount"], 1);
    }

    #[test]
    fn test_counts() {
        let e = Entity::polyanet(2, 2);
        let result = RunResult {
            success: true,
            dry_run: false,
            operations: vec![
                OperationRecord::for_entity(&e, Action::Create, Outcome::Succeeded),
                OperationRecord::for_entity(&e, Action::Create, Outcome::Failed),
            ],
            errors: vec![],
        };
        assert_eq!(result.completed(), 1);
        assert_eq!(result.planned(), 0);
    }
}
