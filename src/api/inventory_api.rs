// ==========================================
// 制造运营平台 - 库存 API
// ==========================================
// 职责: 库存快照、预留查询、外部收货
// 说明: 快照前先清扫过期预留，保证口径与惰性过期一致
// ==========================================

use std::sync::Arc;
use tracing::warn;
use serde_json::json;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::material::InventorySnapshotRow;
use crate::domain::reservation::ReservationListRow;
use crate::engine::ledger::StockLedger;
use crate::engine::reservation::ReservationManager;
use crate::repository::action_log_repo::ActionLogRepository;

pub struct InventoryApi {
    ledger: Arc<StockLedger>,
    reservation_manager: Arc<ReservationManager>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl InventoryApi {
    pub fn new(
        ledger: Arc<StockLedger>,
        reservation_manager: Arc<ReservationManager>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            ledger,
            reservation_manager,
            action_log_repo,
        }
    }

    /// 全量库存快照（在库/活跃预留/可用）
    pub fn snapshot(&self) -> ApiResult<Vec<InventorySnapshotRow>> {
        self.reservation_manager.sweep_expired()?;
        Ok(self.ledger.snapshot()?)
    }

    /// 单个材料的可用量
    pub fn get_available(&self, material_id: &str) -> ApiResult<i64> {
        if material_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("材料号不能为空".to_string()));
        }
        Ok(self.ledger.available(material_id)?)
    }

    /// 活跃预留列表（先清扫过期预留）
    pub fn list_reservations(&self) -> ApiResult<Vec<ReservationListRow>> {
        self.reservation_manager.sweep_expired()?;
        Ok(self.reservation_manager.list_active()?)
    }

    /// 外部收货入库（不触发等待行重解析，完工入库才触发）
    pub fn receive_stock(&self, material_id: &str, qty: i64, operator: &str) -> ApiResult<i64> {
        if material_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("材料号不能为空".to_string()));
        }

        let new_on_hand = self.ledger.credit(material_id, qty)?;

        tracing::info!(
            "{}",
            crate::i18n::t_with_args(
                "inventory.received",
                &[("material_id", material_id), ("qty", &qty.to_string())],
            )
        );

        let log = ActionLog {
            action_id: Uuid::new_v4().to_string(),
            action_type: ActionType::ReceiveStock.to_db_str().to_string(),
            action_ts: chrono::Utc::now().naive_utc(),
            actor: operator.to_string(),
            payload_json: Some(json!({ "material_id": material_id, "qty": qty })),
            impact_summary_json: Some(json!({ "new_on_hand": new_on_hand })),
            order_id: None,
            material_id: Some(material_id.to_string()),
            detail: None,
        };
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(error = %e, "ActionLog 写入失败");
        }

        Ok(new_on_hand)
    }

    /// 手动清扫过期预留，返回清扫数量
    pub fn sweep_expired(&self) -> ApiResult<usize> {
        Ok(self.reservation_manager.sweep_expired()?)
    }
}
