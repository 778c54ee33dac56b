//! 天体模型：实体、网格归一化、X 形图案

pub mod entity;
pub mod grid;
pub mod pattern;

pub use entity::{Color, Direction, Entity, Kind, KindTag, Position};
pub use grid::{classify, classify_record, classify_token, normalize_grid, Grid, ObservedRecord, RawCell};
pub use pattern::{generate_x, MIN_X_SIZE};
