//! X 形图案生成（第一阶段的合成目标）

use crate::astral::Entity;
use crate::core::PatternError;

/// X 形至少需要两条完整对角线加一行内部，外侧两圈留空
pub const MIN_X_SIZE: usize = 5;

/// 在 `[2, size-3]` 的内部方阵中，沿主对角线与副对角线放置 POLYanet，行优先升序
pub fn generate_x(size: usize) -> Result<Vec<Entity>, PatternError> {
    if size < MIN_X_SIZE {
        return Err(PatternError::SizeTooSmall {
            size,
            min: MIN_X_SIZE,
        });
    }

    let start = 2;
    let end = size - 3;
    let mut entities = Vec::new();
    for row in start..=end {
        for column in start..=end {
            let on_primary = row == column;
            let on_secondary = row + column == size - 1;
            if on_primary || on_secondary {
                entities.push(Entity::polyanet(row, column));
            }
        }
    }
    Ok(entities)
}
