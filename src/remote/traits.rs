//! Megaverse 远端能力抽象
//!
//! 所有后端（HTTP / Mock）实现 MegaverseApi：六个变更操作 + 两个地图读取。
//! 传输、认证与超时由实现自行处理，核心只看到 [`RemoteError`]。

use async_trait::async_trait;

use crate::astral::{Color, Direction, Grid};
use crate::core::RemoteError;

/// 远端 Megaverse 服务
#[async_trait]
pub trait MegaverseApi: Send + Sync {
    async fn create_polyanet(&self, row: usize, column: usize) -> Result<(), RemoteError>;

    async fn delete_polyanet(&self, row: usize, column: usize) -> Result<(), RemoteError>;

    async fn create_soloon(&self, row: usize, column: usize, color: Color) -> Result<(), RemoteError>;

    async fn delete_soloon(&self, row: usize, column: usize) -> Result<(), RemoteError>;

    async fn create_cometh(
        &self,
        row: usize,
        column: usize,
        direction: Direction,
    ) -> Result<(), RemoteError>;

    async fn delete_cometh(&self, row: usize, column: usize) -> Result<(), RemoteError>;

    /// 目标地图（token 格式）
    async fn fetch_goal_grid(&self) -> Result<Grid, RemoteError>;

    /// 当前地图（记录格式）
    async fn fetch_observed_grid(&self) -> Result<Grid, RemoteError>;
}
