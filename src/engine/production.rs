// ==========================================
// 制造运营平台 - 生产任务状态机
// ==========================================
// 合法迁移:
//   PENDING     -- start    --> IN_PROGRESS
//   PENDING     -- complete --> COMPLETED   (允许跳过开工)
//   IN_PROGRESS -- complete --> COMPLETED
//   PENDING     -- cancel   --> CANCELLED
//   IN_PROGRESS -- cancel   --> CANCELLED
// 其余一律 InvalidTransition。终态不可离开。
// 红线: 完工 = 状态落库 + 库存贷记，单事务（仓储保证）
// 红线: 取消不触碰库存
// ==========================================

use crate::domain::production::ProductionTask;
use crate::domain::types::{TaskAction, TaskStatus};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::events::{ProductionCompletedEvent, ProductionCompletionListener};
use crate::repository::production_task_repo::ProductionTaskRepository;
use chrono::Utc;
use std::sync::Arc;

/// 状态迁移表
///
/// # 返回
/// - Some(next): 迁移合法，返回目标状态
/// - None: 迁移非法
pub fn transition(from: TaskStatus, action: TaskAction) -> Option<TaskStatus> {
    match (from, action) {
        (TaskStatus::Pending, TaskAction::Start) => Some(TaskStatus::InProgress),
        (TaskStatus::Pending, TaskAction::Complete) => Some(TaskStatus::Completed),
        (TaskStatus::InProgress, TaskAction::Complete) => Some(TaskStatus::Completed),
        (TaskStatus::Pending, TaskAction::Cancel) => Some(TaskStatus::Cancelled),
        (TaskStatus::InProgress, TaskAction::Cancel) => Some(TaskStatus::Cancelled),
        _ => None,
    }
}

const ALL_STATUSES: [TaskStatus; 4] = [
    TaskStatus::Pending,
    TaskStatus::InProgress,
    TaskStatus::Completed,
    TaskStatus::Cancelled,
];

/// 某操作的合法来源状态，由迁移表推导
///
/// 仓储层守卫式 UPDATE 的 status IN (...) 清单来自这里，
/// 迁移表是唯一事实来源
pub fn legal_sources(action: TaskAction) -> Vec<TaskStatus> {
    ALL_STATUSES
        .iter()
        .copied()
        .filter(|from| transition(*from, action).is_some())
        .collect()
}

pub struct ProductionTaskStateMachine {
    task_repo: Arc<ProductionTaskRepository>,
    completion_listener: Option<Arc<dyn ProductionCompletionListener>>,
}

impl ProductionTaskStateMachine {
    pub fn new(task_repo: Arc<ProductionTaskRepository>) -> Self {
        Self {
            task_repo,
            completion_listener: None,
        }
    }

    /// 挂接完工监听者（履约协调器）
    pub fn with_completion_listener(
        mut self,
        listener: Arc<dyn ProductionCompletionListener>,
    ) -> Self {
        self.completion_listener = Some(listener);
        self
    }

    /// 开工: PENDING -> IN_PROGRESS
    pub fn start(&self, task_id: i64) -> EngineResult<ProductionTask> {
        let updated =
            self.task_repo
                .start(task_id, Utc::now(), &legal_sources(TaskAction::Start))?;
        if !updated {
            return Err(self.diagnose_failure(task_id, TaskAction::Start)?);
        }

        let task = self.fetch(task_id)?;
        tracing::info!(task_id = task_id, "生产任务开工");
        Ok(task)
    }

    /// 完工入库: PENDING / IN_PROGRESS -> COMPLETED
    ///
    /// 状态落库与库存贷记在仓储单事务内提交；
    /// 完工监听者在事务提交后调用，通知失败只记日志
    pub async fn complete(&self, task_id: i64) -> EngineResult<ProductionTask> {
        let task = match self.task_repo.complete_and_credit(
            task_id,
            Utc::now(),
            &legal_sources(TaskAction::Complete),
        )? {
            Some(task) => task,
            None => return Err(self.diagnose_failure(task_id, TaskAction::Complete)?),
        };

        tracing::info!(
            task_id = task_id,
            material_id = %task.material_id,
            qty_produced = task.qty_to_produce,
            "生产任务完工入库"
        );

        if let Some(listener) = &self.completion_listener {
            let event = ProductionCompletedEvent {
                task_id: task.task_id,
                order_id: task.order_id.clone(),
                order_item_id: task.order_item_id.clone(),
                material_id: task.material_id.clone(),
                qty_produced: task.qty_to_produce,
            };
            if let Err(e) = listener.on_production_completed(event).await {
                tracing::error!(
                    task_id = task_id,
                    error = %e,
                    "完工联动失败（完工入库已提交，不回滚）"
                );
            }
        }

        Ok(task)
    }

    /// 取消: PENDING / IN_PROGRESS -> CANCELLED，不触碰库存
    pub fn cancel(&self, task_id: i64) -> EngineResult<ProductionTask> {
        let updated =
            self.task_repo
                .cancel(task_id, Utc::now(), &legal_sources(TaskAction::Cancel))?;
        if !updated {
            return Err(self.diagnose_failure(task_id, TaskAction::Cancel)?);
        }

        let task = self.fetch(task_id)?;
        tracing::info!(task_id = task_id, "生产任务已取消");
        Ok(task)
    }

    /// 守卫未命中后的定性: 重查任务区分 NotFound 与 InvalidTransition
    fn diagnose_failure(&self, task_id: i64, action: TaskAction) -> EngineResult<EngineError> {
        match self.task_repo.find_by_id(task_id)? {
            None => Ok(EngineError::NotFound {
                entity: "生产任务".to_string(),
                id: task_id.to_string(),
            }),
            Some(task) => Ok(EngineError::InvalidTransition {
                from: task.status,
                action,
            }),
        }
    }

    fn fetch(&self, task_id: i64) -> EngineResult<ProductionTask> {
        self.task_repo
            .find_by_id(task_id)?
            .ok_or_else(|| EngineError::NotFound {
                entity: "生产任务".to_string(),
                id: task_id.to_string(),
            })
    }
}
