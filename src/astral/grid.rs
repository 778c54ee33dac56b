//! 地图网格与单元格归一化
//!
//! 目标地图与当前地图的单元格编码不同：
//! - 目标格式：字符串 token（`SPACE`、`POLYANET`、`RED_SOLOON`、`UP_COMETH` …）
//! - 当前格式：记录 `{ "type": 0|1|2, "color"?, "direction"? }`
//!
//! 两者分别经 [`classify_token`] / [`classify_record`] 归一化为同一个 [`Entity`]，之后才允许比较。

use serde::Deserialize;

use crate::astral::{Color, Direction, Entity, Kind, Position};
use crate::core::NormalizationError;

/// 当前地图中的单元格记录
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObservedRecord {
    #[serde(rename = "type", default)]
    pub type_tag: Option<i64>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
}

/// 非空单元格的原始内容；`Other` 兜住既非 token 也非记录的值，留给归一化报错
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawCell {
    Token(String),
    Record(ObservedRecord),
    Other(serde_json::Value),
}

impl RawCell {
    pub fn token(s: impl Into<String>) -> Self {
        RawCell::Token(s.into())
    }

    pub fn record(type_tag: i64, attribute: Option<&str>) -> Self {
        let attribute = attribute.map(String::from);
        let (color, direction) = match type_tag {
            1 => (attribute, None),
            2 => (None, attribute),
            _ => (None, None),
        };
        RawCell::Record(ObservedRecord {
            type_tag: Some(type_tag),
            color,
            direction,
        })
    }

    /// 错误信息中展示的原始内容
    pub fn describe(&self) -> String {
        match self {
            RawCell::Token(t) => t.clone(),
            RawCell::Record(r) => format!(
                "{{type: {}, color: {}, direction: {}}}",
                r.type_tag.map_or("-".to_string(), |t| t.to_string()),
                r.color.as_deref().unwrap_or("-"),
                r.direction.as_deref().unwrap_or("-"),
            ),
            RawCell::Other(v) => v.to_string(),
        }
    }
}

/// 方形网格；边长取外层维度，行可以参差（缺失的列视为空）
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Grid {
    rows: Vec<Vec<Option<RawCell>>>,
}

impl Grid {
    pub fn from_rows(rows: Vec<Vec<Option<RawCell>>>) -> Self {
        Self { rows }
    }

    /// 由目标格式 token 构造（`SPACE` 与空串保留为 token，归一化时忽略）
    pub fn from_tokens<R, T>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(|t| Some(RawCell::Token(t.into()))).collect())
            .collect();
        Self { rows }
    }

    pub fn size(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&RawCell> {
        self.rows.get(row)?.get(column)?.as_ref()
    }

    /// 行优先遍历所有非 null 单元格
    pub fn cells(&self) -> impl Iterator<Item = (Position, &RawCell)> {
        self.rows.iter().enumerate().flat_map(|(row, cells)| {
            cells.iter().enumerate().filter_map(move |(column, cell)| {
                cell.as_ref().map(|c| (Position::new(row, column), c))
            })
        })
    }
}

/// 对单元格分类：空 / `SPACE` 返回 `Ok(None)`，无法识别则返回归一化错误（从不静默丢弃）
pub fn classify(cell: &RawCell, position: Position) -> Result<Option<Entity>, NormalizationError> {
    match cell {
        RawCell::Token(token) => classify_token(token, position),
        RawCell::Record(record) => classify_record(record, position).map(Some),
        RawCell::Other(_) => Err(NormalizationError::new(cell.describe(), position)),
    }
}

/// 目标格式：`POLYANET` 或 `<ATTR>_<SOLOON|COMETH>`
pub fn classify_token(token: &str, position: Position) -> Result<Option<Entity>, NormalizationError> {
    let normalized = token.trim().to_ascii_uppercase();
    if normalized.is_empty() || normalized == "SPACE" {
        return Ok(None);
    }
    if normalized == "POLYANET" {
        return Ok(Some(Entity::new(position, Kind::Polyanet)));
    }

    let invalid = || NormalizationError::new(token, position);
    let (attr, suffix) = normalized.rsplit_once('_').ok_or_else(invalid)?;
    let kind = match suffix {
        "SOLOON" => Kind::Soloon(attr.parse::<Color>().map_err(|_| invalid())?),
        "COMETH" => Kind::Cometh(attr.parse::<Direction>().map_err(|_| invalid())?),
        _ => return Err(invalid()),
    };
    Ok(Some(Entity::new(position, kind)))
}

/// 当前格式：type 0 = POLYanet，1 = SOLoon（需 color），2 = ComETH（需 direction）
pub fn classify_record(record: &ObservedRecord, position: Position) -> Result<Entity, NormalizationError> {
    let invalid = || NormalizationError::new(RawCell::Record(record.clone()).describe(), position);
    let kind = match record.type_tag {
        Some(0) => Kind::Polyanet,
        Some(1) => {
            let color = record.color.as_deref().ok_or_else(invalid)?;
            Kind::Soloon(color.parse().map_err(|_| invalid())?)
        }
        Some(2) => {
            let direction = record.direction.as_deref().ok_or_else(invalid)?;
            Kind::Cometh(direction.parse().map_err(|_| invalid())?)
        }
        _ => return Err(invalid()),
    };
    Ok(Entity::new(position, kind))
}

/// 行优先归一化整张网格，收集而不中断
pub fn normalize_grid(grid: &Grid) -> (Vec<Entity>, Vec<NormalizationError>) {
    let mut entities = Vec::new();
    let mut errors = Vec::new();
    for (position, cell) in grid.cells() {
        match classify(cell, position) {
            Ok(Some(entity)) => entities.push(entity),
            Ok(None) => {}
            Err(e) => errors.push(e),
        }
    }
    (entities, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_tokens() {
        let p = Position::new(1, 2);
        assert_eq!(classify_token("SPACE", p).unwrap(), None);
        assert_eq!(classify_token("", p).unwrap(), None);
        assert_eq!(classify_token("POLYANET", p).unwrap(), Some(Entity::polyanet(1, 2)));
        assert_eq!(
            classify_token("BLUE_SOLOON", p).unwrap(),
            Some(Entity::soloon(1, 2, Color::Blue))
        );
        assert_eq!(
            classify_token("left_cometh", p).unwrap(),
            Some(Entity::cometh(1, 2, Direction::Left))
        );
    }

    #[test]
    fn test_classify_invalid_token_keeps_token_and_position() {
        let err = classify_token("INVALID_OBJECT", Position::new(3, 4)).unwrap_err();
        assert_eq!(err.token, "INVALID_OBJECT");
        assert_eq!(err.position, Position::new(3, 4));
        assert!(err.to_string().contains("Invalid object type"));

        assert!(classify_token("GREEN_SOLOON", Position::new(0, 0)).is_err());
        assert!(classify_token("DIAGONAL_COMETH", Position::new(0, 0)).is_err());
        assert!(classify_token("STAR", Position::new(0, 0)).is_err());
    }

    #[test]
    fn test_classify_records() {
        let p = Position::new(0, 1);
        assert_eq!(classify(&RawCell::record(0, None), p).unwrap(), Some(Entity::polyanet(0, 1)));
        assert_eq!(
            classify(&RawCell::record(1, Some("red")), p).unwrap(),
            Some(Entity::soloon(0, 1, Color::Red))
        );
        assert_eq!(
            classify(&RawCell::record(2, Some("down")), p).unwrap(),
            Some(Entity::cometh(0, 1, Direction::Down))
        );
        assert!(classify(&RawCell::record(1, None), p).is_err());
        assert!(classify(&RawCell::record(7, None), p).is_err());
    }

    #[test]
    fn test_deserialize_mixed_cells() {
        let json = r#"[
            [null, "POLYANET", {"type": 1, "row": 0, "column": 2, "color": "white"}],
            ["SPACE", 42]
        ]"#;
        let grid: Grid = serde_json::from_str(json).unwrap();
        assert_eq!(grid.size(), 2);
        assert_eq!(grid.cell(0, 0), None);
        assert_eq!(grid.cell(0, 1), Some(&RawCell::token("POLYANET")));
        assert_eq!(grid.cell(0, 2), Some(&RawCell::record(1, Some("white"))));
        assert!(matches!(grid.cell(1, 1), Some(RawCell::Other(_))));
        assert_eq!(grid.cell(5, 5), None);
    }

    #[test]
    fn test_normalize_grid_collects_errors() {
        let grid = Grid::from_tokens(vec![
            vec!["SPACE", "POLYANET", "BOGUS"],
            vec!["RED_SOLOON", "SPACE", "UP_COMETH"],
        ]);
        let (entities, errors) = normalize_grid(&grid);
        assert_eq!(
            entities,
            vec![
                Entity::polyanet(0, 1),
                Entity::soloon(1, 0, Color::Red),
                Entity::cometh(1, 2, Direction::Up),
            ]
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].position, Position::new(0, 2));
    }
}
