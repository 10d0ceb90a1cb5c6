// ==========================================
// 制造运营平台 - 生产任务 API
// ==========================================
// 职责: 任务查询、状态操作（start / complete / cancel）
// 红线合规: 未知操作在边界拒绝、所有写入记 ActionLog
// ==========================================

use std::sync::Arc;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::production::ProductionTask;
use crate::domain::types::{TaskAction, TaskStatus};
use crate::engine::production::ProductionTaskStateMachine;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::production_task_repo::ProductionTaskRepository;

pub struct TaskApi {
    state_machine: Arc<ProductionTaskStateMachine>,
    task_repo: Arc<ProductionTaskRepository>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl TaskApi {
    pub fn new(
        state_machine: Arc<ProductionTaskStateMachine>,
        task_repo: Arc<ProductionTaskRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            state_machine,
            task_repo,
            action_log_repo,
        }
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 任务列表（可按状态字符串过滤，未知状态拒绝）
    pub fn list_tasks(&self, status: Option<&str>) -> ApiResult<Vec<ProductionTask>> {
        let filter = match status {
            Some(s) => Some(TaskStatus::from_db_str(s).ok_or_else(|| {
                ApiError::InvalidInput(format!("未知的任务状态: {}", s))
            })?),
            None => None,
        };
        Ok(self.task_repo.list(filter)?)
    }

    /// 按任务号查询
    pub fn get_task(&self, task_id: i64) -> ApiResult<ProductionTask> {
        self.task_repo
            .find_by_id(task_id)?
            .ok_or_else(|| ApiError::NotFound(format!("生产任务(id={})不存在", task_id)))
    }

    // ==========================================
    // 写接口
    // ==========================================

    /// 对任务执行操作（"start" / "complete" / "cancel"）
    ///
    /// # 说明
    /// - 未知操作字符串在边界拒绝，不进状态机
    /// - complete 会触发完工入库与等待行重解析
    pub async fn patch_task(
        &self,
        task_id: i64,
        action_str: &str,
        operator: &str,
    ) -> ApiResult<ProductionTask> {
        let action = TaskAction::parse(action_str)
            .ok_or_else(|| ApiError::InvalidInput(format!("未知的任务操作: {}", action_str)))?;

        let task = match action {
            TaskAction::Start => self.state_machine.start(task_id)?,
            TaskAction::Complete => self.state_machine.complete(task_id).await?,
            TaskAction::Cancel => self.state_machine.cancel(task_id)?,
        };

        let (action_type, msg_key) = match action {
            TaskAction::Start => (ActionType::StartTask, "task.started"),
            TaskAction::Complete => (ActionType::CompleteTask, "task.completed"),
            TaskAction::Cancel => (ActionType::CancelTask, "task.cancelled"),
        };
        info!(
            "{}",
            crate::i18n::t_with_args(msg_key, &[("task_id", &task.task_id.to_string())])
        );
        self.write_action_log(action_type, operator, &task);

        Ok(task)
    }

    fn write_action_log(&self, action_type: ActionType, actor: &str, task: &ProductionTask) {
        let log = ActionLog {
            action_id: Uuid::new_v4().to_string(),
            action_type: action_type.to_db_str().to_string(),
            action_ts: chrono::Utc::now().naive_utc(),
            actor: actor.to_string(),
            payload_json: Some(json!({ "task_id": task.task_id })),
            impact_summary_json: Some(json!({
                "status": task.status.to_db_str(),
                "material_id": task.material_id,
                "qty_to_produce": task.qty_to_produce,
            })),
            order_id: Some(task.order_id.clone()),
            material_id: Some(task.material_id.clone()),
            detail: None,
        };
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(error = %e, action_type = log.action_type, "ActionLog 写入失败");
        }
    }
}
