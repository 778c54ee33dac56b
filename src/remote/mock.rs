//! Mock 后端（用于测试与离线运行，无需网络）
//!
//! 在内存中维护当前地图：create 放置实体，delete 仅当该位置确为对应种类时移除（否则 404）。
//! 每次调用都会被记录；可按调用预置失败（一次性队列或持续失败），用于验证重试与停止语义。

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::astral::{Color, Direction, Entity, Grid, Kind, KindTag, Position, RawCell};
use crate::core::RemoteError;
use crate::remote::MegaverseApi;

/// 一次远端调用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiCall {
    CreatePolyanet(Position),
    DeletePolyanet(Position),
    CreateSoloon(Position, Color),
    DeleteSoloon(Position),
    CreateCometh(Position, Direction),
    DeleteCometh(Position),
    FetchGoal,
    FetchObserved,
}

impl ApiCall {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, ApiCall::FetchGoal | ApiCall::FetchObserved)
    }
}

impl fmt::Display for ApiCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiCall::CreatePolyanet(p) => write!(f, "create polyanet {p}"),
            ApiCall::DeletePolyanet(p) => write!(f, "delete polyanet {p}"),
            ApiCall::CreateSoloon(p, c) => write!(f, "create soloon {p} {}", c.as_str()),
            ApiCall::DeleteSoloon(p) => write!(f, "delete soloon {p}"),
            ApiCall::CreateCometh(p, d) => write!(f, "create cometh {p} {}", d.as_str()),
            ApiCall::DeleteCometh(p) => write!(f, "delete cometh {p}"),
            ApiCall::FetchGoal => f.write_str("fetch goal"),
            ApiCall::FetchObserved => f.write_str("fetch observed"),
        }
    }
}

#[derive(Debug, Default)]
struct FailurePlan {
    queued: VecDeque<RemoteError>,
    always: Option<RemoteError>,
}

#[derive(Debug, Default)]
struct MockState {
    goal: Grid,
    placed: BTreeMap<Position, Kind>,
    calls: Vec<ApiCall>,
    failures: HashMap<ApiCall, FailurePlan>,
}

/// 内存中的 Megaverse
#[derive(Debug)]
pub struct MockMegaverseApi {
    size: usize,
    state: Mutex<MockState>,
}

impl MockMegaverseApi {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn with_goal(self, goal: Grid) -> Self {
        self.lock().goal = goal;
        self
    }

    /// 预置当前地图中的实体；越界位置被忽略
    pub fn with_placed(self, entities: impl IntoIterator<Item = Entity>) -> Self {
        {
            let mut state = self.lock();
            for e in entities {
                let p = e.position();
                if !self.in_bounds(p) {
                    tracing::warn!(position = %p, size = self.size, "ignoring out-of-bounds entity");
                    continue;
                }
                state.placed.insert(p, e.kind());
            }
        }
        self
    }

    fn in_bounds(&self, p: Position) -> bool {
        p.row < self.size && p.column < self.size
    }

    /// 下一次匹配的调用依次返回这些错误（每次调用消耗一个）
    pub fn fail_next(&self, call: ApiCall, errors: impl IntoIterator<Item = RemoteError>) {
        self.lock()
            .failures
            .entry(call)
            .or_default()
            .queued
            .extend(errors);
    }

    /// 匹配的调用在队列耗尽后始终返回该错误
    pub fn fail_always(&self, call: ApiCall, error: RemoteError) {
        self.lock().failures.entry(call).or_default().always = Some(error);
    }

    /// 至今为止的全部调用（按发生顺序）
    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    pub fn mutation_calls(&self) -> Vec<ApiCall> {
        self.calls().into_iter().filter(ApiCall::is_mutation).collect()
    }

    /// 当前放置的实体（行优先）
    pub fn placed(&self) -> Vec<Entity> {
        self.lock()
            .placed
            .iter()
            .map(|(p, k)| Entity::new(*p, *k))
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // 测试中 panic 不应让后续断言因锁中毒而失败
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 记录调用并返回预置失败（若有）
    fn record(&self, call: ApiCall) -> Result<MutexGuard<'_, MockState>, RemoteError> {
        let mut state = self.lock();
        state.calls.push(call);
        if let Some(plan) = state.failures.get_mut(&call) {
            if let Some(err) = plan.queued.pop_front() {
                return Err(err);
            }
            if let Some(err) = &plan.always {
                return Err(err.clone());
            }
        }
        Ok(state)
    }

    fn create(&self, call: ApiCall, position: Position, kind: Kind) -> Result<(), RemoteError> {
        let mut state = self.record(call)?;
        if !self.in_bounds(position) {
            return Err(RemoteError::status(400, format!("{position} is out of bounds")));
        }
        state.placed.insert(position, kind);
        Ok(())
    }

    fn delete(&self, call: ApiCall, position: Position, tag: KindTag) -> Result<(), RemoteError> {
        let mut state = self.record(call)?;
        let present = state.placed.get(&position).is_some_and(|k| k.tag() == tag);
        if !present {
            return Err(RemoteError::status(404, format!("no {tag} at {position}")));
        }
        state.placed.remove(&position);
        Ok(())
    }
}

#[async_trait]
impl MegaverseApi for MockMegaverseApi {
    async fn create_polyanet(&self, row: usize, column: usize) -> Result<(), RemoteError> {
        let p = Position::new(row, column);
        self.create(ApiCall::CreatePolyanet(p), p, Kind::Polyanet)
    }

    async fn delete_polyanet(&self, row: usize, column: usize) -> Result<(), RemoteError> {
        let p = Position::new(row, column);
        self.delete(ApiCall::DeletePolyanet(p), p, KindTag::Polyanet)
    }

    async fn create_soloon(&self, row: usize, column: usize, color: Color) -> Result<(), RemoteError> {
        let p = Position::new(row, column);
        self.create(ApiCall::CreateSoloon(p, color), p, Kind::Soloon(color))
    }

    async fn delete_soloon(&self, row: usize, column: usize) -> Result<(), RemoteError> {
        let p = Position::new(row, column);
        self.delete(ApiCall::DeleteSoloon(p), p, KindTag::Soloon)
    }

    async fn create_cometh(
        &self,
        row: usize,
        column: usize,
        direction: Direction,
    ) -> Result<(), RemoteError> {
        let p = Position::new(row, column);
        self.create(ApiCall::CreateCometh(p, direction), p, Kind::Cometh(direction))
    }

    async fn delete_cometh(&self, row: usize, column: usize) -> Result<(), RemoteError> {
        let p = Position::new(row, column);
        self.delete(ApiCall::DeleteCometh(p), p, KindTag::Cometh)
    }

    async fn fetch_goal_grid(&self) -> Result<Grid, RemoteError> {
        let state = self.record(ApiCall::FetchGoal)?;
        Ok(state.goal.clone())
    }

    /// 以记录格式渲染当前地图
    async fn fetch_observed_grid(&self) -> Result<Grid, RemoteError> {
        let state = self.record(ApiCall::FetchObserved)?;
        let mut rows = vec![vec![None; self.size]; self.size];
        for (p, kind) in &state.placed {
            let cell = match kind {
                Kind::Polyanet => RawCell::record(0, None),
                Kind::Soloon(c) => RawCell::record(1, Some(c.as_str())),
                Kind::Cometh(d) => RawCell::record(2, Some(d.as_str())),
            };
            if let Some(slot) = rows.get_mut(p.row).and_then(|r| r.get_mut(p.column)) {
                *slot = Some(cell);
            }
        }
        Ok(Grid::from_rows(rows))
    }
}
