// ==========================================
// 制造运营平台 - 订单 API
// ==========================================
// 职责: 订单提交、取消、查询
// 红线合规: 可解释性（错误带显式原因）、所有写入记 ActionLog
// ==========================================

use std::sync::Arc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::config::fulfillment_config_trait::FulfillmentConfigReader;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::order::{CustomerOrder, OrderDraft, OrderItem, OrderLineDraft};
use crate::domain::production::ProductionTask;
use crate::domain::types::ShortageAction;
use crate::engine::fulfillment::{CancelOutcome, FulfillmentCoordinator, SubmitOutcome};
use crate::i18n;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::order_repo::{OrderItemRepository, OrderRepository};
use crate::repository::production_task_repo::ProductionTaskRepository;

// ==========================================
// 请求/响应 DTO
// ==========================================

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitOrderRequest {
    pub source: Option<String>,
    pub customer_name: Option<String>,
    pub user_id: String,
    pub items: Vec<SubmitOrderItemRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitOrderItemRequest {
    pub material_id: String,
    pub quantity: i64,
    pub unit_price: Option<f64>,
    /// 缺口处理策略（当前仅支持 "PRODUCE"）
    pub shortage_action: String,
    pub item_description: Option<String>,
    pub color: Option<String>,
}

/// 订单详情（订单头 + 行 + 关联任务）
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    pub order: CustomerOrder,
    pub items: Vec<OrderItem>,
    pub tasks: Vec<ProductionTask>,
}

// ==========================================
// OrderApi - 订单 API
// ==========================================
pub struct OrderApi<C: FulfillmentConfigReader> {
    coordinator: Arc<FulfillmentCoordinator<C>>,
    order_repo: Arc<OrderRepository>,
    item_repo: Arc<OrderItemRepository>,
    task_repo: Arc<ProductionTaskRepository>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl<C: FulfillmentConfigReader> OrderApi<C> {
    pub fn new(
        coordinator: Arc<FulfillmentCoordinator<C>>,
        order_repo: Arc<OrderRepository>,
        item_repo: Arc<OrderItemRepository>,
        task_repo: Arc<ProductionTaskRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            coordinator,
            order_repo,
            item_repo,
            task_repo,
            action_log_repo,
        }
    }

    // ==========================================
    // 写接口
    // ==========================================

    /// 提交订单
    ///
    /// # 校验
    /// - 行非空、数量 > 0
    /// - shortage_action 必须是已知策略（未知字符串在边界拒绝）
    ///
    /// # 说明
    /// 单行库存缺口不会导致提交失败（按行策略转生产任务）
    pub async fn submit_order(&self, request: SubmitOrderRequest) -> ApiResult<SubmitOutcome> {
        if request.user_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("提交人不能为空".to_string()));
        }
        if request.items.is_empty() {
            return Err(ApiError::InvalidInput("订单不含任何行".to_string()));
        }

        let mut lines = Vec::with_capacity(request.items.len());
        for item in &request.items {
            let action = ShortageAction::from_db_str(&item.shortage_action).ok_or_else(|| {
                ApiError::InvalidInput(format!("未知的缺口处理策略: {}", item.shortage_action))
            })?;
            lines.push(OrderLineDraft {
                material_id: item.material_id.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                shortage_action: action,
                item_description: item.item_description.clone(),
                color: item.color.clone(),
            });
        }

        let draft = OrderDraft {
            source: request.source.clone(),
            customer_name: request.customer_name.clone(),
            user_id: request.user_id.clone(),
            lines,
        };

        let outcome = self.coordinator.submit_order(&draft).await?;

        info!(
            "{}",
            i18n::t_with_args("order.submitted", &[("order_id", &outcome.order.order_id)])
        );

        self.write_action_log(
            ActionType::SubmitOrder,
            &request.user_id,
            Some(json!({
                "source": request.source,
                "lines": request.items.len(),
            })),
            Some(json!({
                "order_status": outcome.order.status.to_db_str(),
                "resolutions": outcome.resolutions,
            })),
            Some(outcome.order.order_id.clone()),
            None,
        );

        Ok(outcome)
    }

    /// 取消订单（幂等）
    pub fn cancel_order(&self, order_id: &str, operator: &str) -> ApiResult<CancelOutcome> {
        if order_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("订单号不能为空".to_string()));
        }

        let outcome = self.coordinator.cancel_order(order_id)?;

        info!(
            "{}",
            i18n::t_with_args("order.cancelled", &[("order_id", order_id)])
        );

        self.write_action_log(
            ActionType::CancelOrder,
            operator,
            None,
            Some(json!({
                "released_reservations": outcome.released_reservations,
                "cancelled_tasks": outcome.cancelled_tasks,
            })),
            Some(order_id.to_string()),
            None,
        );

        Ok(outcome)
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 订单详情（订单头 + 行 + 关联任务）
    pub fn get_order_detail(&self, order_id: &str) -> ApiResult<OrderDetail> {
        let order = self
            .order_repo
            .find_by_id(order_id)?
            .ok_or_else(|| ApiError::NotFound(format!("订单(id={})不存在", order_id)))?;

        let items = self.item_repo.list_by_order(order_id)?;
        let tasks = self.task_repo.list_by_order(order_id)?;

        Ok(OrderDetail { order, items, tasks })
    }

    /// 订单列表（创建时间倒序）
    pub fn list_orders(&self) -> ApiResult<Vec<CustomerOrder>> {
        Ok(self.order_repo.list_all()?)
    }

    // ==========================================
    // ActionLog 记录（失败只告警，不阻断主流程）
    // ==========================================
    fn write_action_log(
        &self,
        action_type: ActionType,
        actor: &str,
        payload: Option<serde_json::Value>,
        impact: Option<serde_json::Value>,
        order_id: Option<String>,
        material_id: Option<String>,
    ) {
        let log = ActionLog {
            action_id: Uuid::new_v4().to_string(),
            action_type: action_type.to_db_str().to_string(),
            action_ts: chrono::Utc::now().naive_utc(),
            actor: actor.to_string(),
            payload_json: payload,
            impact_summary_json: impact,
            order_id,
            material_id,
            detail: None,
        };
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(error = %e, action_type = log.action_type, "ActionLog 写入失败");
        }
    }
}
