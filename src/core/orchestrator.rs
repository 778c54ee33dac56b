//! 编排器：把实体列表逐个落到远端
//!
//! 入口：
//! - `run_pattern`：X 形图案（第一阶段）
//! - `run_goal` / `run_goal_grid`：按目标地图构建（第二阶段）
//! - `reset_pattern`：删除 X 形图案
//! - `clear_all` / `clear_grid`：按当前地图尽力清空
//! - `validate`：只读对账
//!
//! 所有变更严格串行：每次调用经重试处理器，之后固定等待 pacing 再处理下一个。
//! 实盘遇到失败立即停止（状态可能已部分变更，继续写只会放大不一致）；dry-run 不发请求、
//! 不等待，一次性收集全部归一化错误。两个运行不应同时针对同一目标启动（不加锁，由调用方保证）。

use std::sync::Arc;
use std::time::Duration;

use crate::astral::{classify, generate_x, normalize_grid, Entity, Grid, Kind, KindTag, Position};
use crate::config::AppConfig;
use crate::core::diff::reconcile;
use crate::core::report::{
    Action, OperationLog, OperationRecord, Outcome, ReconciliationReport, RunResult,
};
use crate::core::{RetryError, RetryHandler, RetryPolicy, RunError};
use crate::remote::{HttpMegaverseApi, MegaverseApi, MockMegaverseApi};

/// 单次远端变更
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mutation {
    Create(Kind),
    Delete(KindTag),
}

impl Mutation {
    fn action(&self) -> Action {
        match self {
            Mutation::Create(_) => Action::Create,
            Mutation::Delete(_) => Action::Delete,
        }
    }

    fn tag(&self) -> KindTag {
        match self {
            Mutation::Create(kind) => kind.tag(),
            Mutation::Delete(tag) => *tag,
        }
    }
}

/// 根据配置选择后端：有 candidate id 走 HTTP，否则退回内存 Mock
pub fn create_api_from_config(cfg: &AppConfig) -> Arc<dyn MegaverseApi> {
    if cfg.api.candidate_id.trim().is_empty() {
        tracing::warn!("No candidate id configured, using in-memory mock Megaverse");
        return Arc::new(MockMegaverseApi::new(cfg.pattern.default_size));
    }
    tracing::info!(base_url = %cfg.api.base_url, "Using Megaverse HTTP API");
    Arc::new(HttpMegaverseApi::new(
        &cfg.api.base_url,
        &cfg.api.candidate_id,
        cfg.api.timeout(),
    ))
}

/// 对账编排器；一次只服务一个运行，OperationLog 由运行独占
pub struct Orchestrator {
    api: Arc<dyn MegaverseApi>,
    retry: RetryHandler,
    pacing: Duration,
}

impl Orchestrator {
    pub fn new(api: Arc<dyn MegaverseApi>, retry: RetryHandler, pacing: Duration) -> Self {
        Self { api, retry, pacing }
    }

    pub fn from_config(api: Arc<dyn MegaverseApi>, cfg: &AppConfig) -> Self {
        Self::new(
            api,
            RetryHandler::new(RetryPolicy::from(&cfg.retry)),
            cfg.pacing.operation_delay(),
        )
    }

    /// 第一阶段：在 size×size 网格上创建 X 形 POLYanet
    pub async fn run_pattern(&self, size: usize, dry_run: bool) -> Result<RunResult, RunError> {
        let entities = generate_x(size)?;
        tracing::info!(size, count = entities.len(), dry_run, "Starting Phase 1: POLYanet X-shape");
        self.apply(&entities, Action::Create, dry_run).await
    }

    /// 删除 X 形图案
    pub async fn reset_pattern(&self, size: usize, dry_run: bool) -> Result<RunResult, RunError> {
        let entities = generate_x(size)?;
        tracing::info!(size, count = entities.len(), dry_run, "Resetting X-shape");
        self.apply(&entities, Action::Delete, dry_run).await
    }

    /// 第二阶段：拉取目标地图并逐个创建
    pub async fn run_goal(&self, dry_run: bool) -> Result<RunResult, RunError> {
        let goal = self.fetch_goal().await?;
        self.run_goal_grid(&goal, dry_run).await
    }

    /// 按给定目标地图创建；无法识别的单元格记为错误并跳过，不中断扫描
    pub async fn run_goal_grid(&self, goal: &Grid, dry_run: bool) -> Result<RunResult, RunError> {
        tracing::info!(size = goal.size(), dry_run, "Starting Phase 2: building from goal map");
        let (entities, errors) = normalize_grid(goal);
        for err in &errors {
            tracing::warn!(error = %err, "skipping unrecognized goal cell");
        }
        tracing::info!(count = entities.len(), invalid = errors.len(), "parsed goal map");

        let mut result = match self.apply(&entities, Action::Create, dry_run).await {
            Ok(result) => result,
            Err(RunError::Halted {
                entity,
                action,
                succeeded,
                log,
                source,
                ..
            }) => {
                return Err(RunError::Halted {
                    entity,
                    action,
                    succeeded,
                    log,
                    invalid: errors,
                    source,
                })
            }
            Err(e) => return Err(e),
        };
        result.success = result.success && errors.is_empty();
        result.errors = errors;
        Ok(result)
    }

    /// 共享执行器：按顺序对每个实体执行 `action`
    pub async fn apply(
        &self,
        entities: &[Entity],
        action: Action,
        dry_run: bool,
    ) -> Result<RunResult, RunError> {
        let mut log = OperationLog::with_capacity(entities.len());
        let mut succeeded = 0usize;

        for entity in entities {
            if dry_run {
                tracing::debug!(key = %entity.key(), %action, "planned");
                log.push(OperationRecord::for_entity(entity, action, Outcome::Planned));
                continue;
            }

            let mutation = match action {
                Action::Create => Mutation::Create(entity.kind()),
                Action::Delete => Mutation::Delete(entity.kind().tag()),
            };
            match self.paced(entity.position(), mutation).await {
                Ok(()) => {
                    succeeded += 1;
                    tracing::info!(%action, entity = %entity, "done");
                    log.push(OperationRecord::for_entity(entity, action, Outcome::Succeeded));
                }
                Err(source) => {
                    tracing::error!(%action, entity = %entity, succeeded, error = %source, "halting run");
                    log.push(OperationRecord::for_entity(entity, action, Outcome::Failed));
                    return Err(RunError::Halted {
                        entity: *entity,
                        action,
                        succeeded,
                        log,
                        invalid: Vec::new(),
                        source,
                    });
                }
            }
        }

        if !dry_run {
            tracing::info!(count = succeeded, %action, "all operations completed");
        }
        Ok(RunResult {
            success: true,
            dry_run,
            operations: log,
            errors: Vec::new(),
        })
    }

    /// 拉取当前地图并尽力清空
    pub async fn clear_all(&self) -> Result<RunResult, RunError> {
        let observed = self.fetch_observed().await?;
        Ok(self.clear_grid(&observed).await)
    }

    /// 对每个非空单元格依次尝试删除 POLYanet → SOLoon → ComETH，首个成功即止。
    ///
    /// 只有明确的 4xx 拒绝才视为「不是这个种类」继续尝试下一种；瞬时错误重试耗尽或其它失败
    /// 会终止该单元格的尝试并记为失败（不会把网络抖动误判为种类不符）。单元格失败后继续下一个。
    pub async fn clear_grid(&self, observed: &Grid) -> RunResult {
        let targets: Vec<(Position, Option<Kind>)> = observed
            .cells()
            .filter_map(|(position, cell)| match classify(cell, position) {
                Ok(None) => None,
                Ok(Some(entity)) => Some((position, Some(entity.kind()))),
                Err(e) => {
                    tracing::warn!(error = %e, "unrecognized observed cell, trying every delete endpoint");
                    Some((position, None))
                }
            })
            .collect();

        if targets.is_empty() {
            tracing::info!("Map is already empty");
            return RunResult {
                success: true,
                ..RunResult::default()
            };
        }
        tracing::info!(count = targets.len(), "Starting map reset: clearing all astral objects");

        let mut log = OperationLog::with_capacity(targets.len());
        for (position, observed_kind) in targets {
            let (tag, outcome) = match self.delete_any(position).await {
                Some(tag) => (tag, Outcome::Succeeded),
                None => (
                    observed_kind.map_or(KindTag::Polyanet, |k| k.tag()),
                    Outcome::Failed,
                ),
            };
            if let (Outcome::Succeeded, Some(kind)) = (outcome, observed_kind) {
                if kind.tag() != tag {
                    tracing::warn!(%position, observed = %kind.tag(), deleted = %tag, "deleted kind differs from observed record");
                }
            }
            let attribute = match observed_kind {
                Some(Kind::Soloon(c)) if tag == KindTag::Soloon => Some(c.as_str()),
                Some(Kind::Cometh(d)) if tag == KindTag::Cometh => Some(d.as_str()),
                _ => None,
            };
            log.push(OperationRecord {
                kind: tag,
                position,
                attribute,
                action: Action::Delete,
                outcome,
            });
        }

        let failed = log.iter().filter(|r| r.outcome == Outcome::Failed).count();
        tracing::info!(cleared = log.len() - failed, failed, "map reset finished");
        RunResult {
            success: failed == 0,
            dry_run: false,
            operations: log,
            errors: Vec::new(),
        }
    }

    /// 按候选顺序删除一个单元格；返回成功的种类
    async fn delete_any(&self, position: Position) -> Option<KindTag> {
        let mut rejections = Vec::new();
        for tag in KindTag::DELETE_ORDER {
            match self.paced(position, Mutation::Delete(tag)).await {
                Ok(()) => {
                    tracing::info!(%position, kind = %tag, "deleted");
                    return Some(tag);
                }
                Err(RetryError::Permanent(e)) if e.is_rejection() => {
                    tracing::debug!(%position, kind = %tag, error = %e, "rejected, trying next kind");
                    rejections.push(format!("{tag}: {e}"));
                }
                Err(e) => {
                    tracing::warn!(%position, kind = %tag, error = %e, "delete failed, skipping cell");
                    return None;
                }
            }
        }
        tracing::warn!(%position, attempts = %rejections.join("; "), "no delete endpoint accepted cell");
        None
    }

    /// 拉取两张地图并对账（只读）
    pub async fn validate(&self) -> Result<ReconciliationReport, RunError> {
        let goal = self.fetch_goal().await?;
        let observed = self.fetch_observed().await?;
        let report = reconcile(&goal, &observed)?;
        tracing::info!(
            valid = report.is_valid,
            missing = report.missing.len(),
            extra = report.extra.len(),
            "validation finished"
        );
        Ok(report)
    }

    async fn fetch_goal(&self) -> Result<Grid, RunError> {
        let api = &self.api;
        self.retry
            .execute("Get goal map", move || api.fetch_goal_grid())
            .await
            .map_err(|source| RunError::Fetch {
                what: "goal map",
                source,
            })
    }

    async fn fetch_observed(&self) -> Result<Grid, RunError> {
        let api = &self.api;
        self.retry
            .execute("Get current map", move || api.fetch_observed_grid())
            .await
            .map_err(|source| RunError::Fetch {
                what: "current map",
                source,
            })
    }

    /// 执行一次变更，然后无论结果如何都等待 pacing
    async fn paced(&self, position: Position, mutation: Mutation) -> Result<(), RetryError> {
        let result = self.mutate(position, mutation).await;
        tokio::time::sleep(self.pacing).await;
        result
    }

    /// 唯一的按种类分发点
    async fn mutate(&self, position: Position, mutation: Mutation) -> Result<(), RetryError> {
        let Position { row, column } = position;
        let label = format!("{} {} at {}", mutation.action(), mutation.tag(), position);
        let api = &self.api;
        match mutation {
            Mutation::Create(Kind::Polyanet) => {
                self.retry.execute(&label, move || api.create_polyanet(row, column)).await
            }
            Mutation::Create(Kind::Soloon(color)) => {
                self.retry
                    .execute(&label, move || api.create_soloon(row, column, color))
                    .await
            }
            Mutation::Create(Kind::Cometh(direction)) => {
                self.retry
                    .execute(&label, move || api.create_cometh(row, column, direction))
                    .await
            }
            Mutation::Delete(KindTag::Polyanet) => {
                self.retry.execute(&label, move || api.delete_polyanet(row, column)).await
            }
            Mutation::Delete(KindTag::Soloon) => {
                self.retry.execute(&label, move || api.delete_soloon(row, column)).await
            }
            Mutation::Delete(KindTag::Cometh) => {
                self.retry.execute(&label, move || api.delete_cometh(row, column)).await
            }
        }
    }
}
