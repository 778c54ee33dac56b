//! Megaverse - 声明式网格对账器
//!
//! 模块划分：
//! - **astral**: 天体实体、网格编码归一化、X 形图案生成
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类、指数退避重试、差异对账、运行报告、编排器
//! - **observability**: 日志初始化
//! - **remote**: Megaverse 服务抽象与实现（HTTP / Mock）

pub mod astral;
pub mod config;
pub mod core;
pub mod observability;
pub mod remote;

pub use crate::core::{Orchestrator, RunError};
