// ==========================================
// 制造运营平台 - 缺口解析器
// ==========================================
// 职责: 订单行的净额解析——先吃库存（预留），剩余缺口按行策略
//       转为生产任务
// 幂等: 重复解析同一行不重复预留、不重复建任务；
//       未清量 = quantity - 已预留 - Σ(未完结任务) - Σ(已完工任务)，
//       <= 0 时本次解析为只读
// 红线: Shortage 在此就地恢复，永不使提交流程失败
// ==========================================

use crate::config::fulfillment_config_trait::FulfillmentConfigReader;
use crate::domain::order::OrderItem;
use crate::domain::production::NewProductionTask;
use crate::domain::types::ShortageAction;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::reservation::ReservationManager;
use crate::repository::order_repo::OrderItemRepository;
use crate::repository::production_task_repo::ProductionTaskRepository;
use chrono::Utc;
use std::sync::Arc;

// ==========================================
// Resolution - 解析结果
// ==========================================
// 口径为累计值: reserved_qty 是该行由预留覆盖的总量（含历史），
// shortfall_qty = quantity - reserved_qty。重复解析返回同一对数字。
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Resolution {
    pub order_item_id: String,
    pub reserved_qty: i64,
    pub shortfall_qty: i64,
    /// 本次解析新建的任务（未建任务时为 None）
    pub created_task_id: Option<i64>,
}

pub struct ShortageResolver<C: FulfillmentConfigReader> {
    item_repo: Arc<OrderItemRepository>,
    task_repo: Arc<ProductionTaskRepository>,
    reservation_manager: Arc<ReservationManager>,
    config: Arc<C>,
}

impl<C: FulfillmentConfigReader> ShortageResolver<C> {
    pub fn new(
        item_repo: Arc<OrderItemRepository>,
        task_repo: Arc<ProductionTaskRepository>,
        reservation_manager: Arc<ReservationManager>,
        config: Arc<C>,
    ) -> Self {
        Self {
            item_repo,
            task_repo,
            reservation_manager,
            config,
        }
    }

    /// 按行 ID 解析
    pub async fn resolve_by_id(&self, order_item_id: &str, user_id: &str) -> EngineResult<Resolution> {
        let item = self
            .item_repo
            .find_by_id(order_item_id)?
            .ok_or_else(|| EngineError::NotFound {
                entity: "订单行".to_string(),
                id: order_item_id.to_string(),
            })?;
        self.resolve(&item, user_id).await
    }

    /// 解析订单行
    ///
    /// # 流程
    /// 1. 续期该行既有活跃预留
    /// 2. 落账占用量与活跃预留对账（过期持有视同不存在）
    /// 3. 计算未清量 = quantity - 已预留 - 未完结任务 - 已完工任务
    /// 4. 未清量 > 0 时尽量预留（可用不足则部分预留）
    /// 5. 仍有剩余且策略为 PRODUCE，创建生产任务
    pub async fn resolve(&self, item: &OrderItem, user_id: &str) -> EngineResult<Resolution> {
        if item.quantity <= 0 {
            return Err(EngineError::InvalidQuantity(item.quantity));
        }

        let ttl_secs = self
            .config
            .get_reservation_ttl_secs()
            .await
            .map_err(|e| EngineError::Config(e.to_string()))?;

        self.reservation_manager
            .refresh_for_item(&item.order_item_id, ttl_secs)?;

        // 对账: 过期预留视同不存在，落账占用量只认活跃预留合计。
        // 持有失效后该行缺口重新打开，由下方流程重新预留/转产
        let active_reserved: i64 = self
            .reservation_manager
            .list_active_by_item(&item.order_item_id)?
            .iter()
            .map(|r| r.qty)
            .sum();
        let reserved = if active_reserved != item.qty_reserved_from_stock {
            tracing::info!(
                order_item_id = %item.order_item_id,
                stored = item.qty_reserved_from_stock,
                active = active_reserved,
                "预留失效对账，回写实际占用量"
            );
            self.item_repo
                .update_reserved_qty(&item.order_item_id, active_reserved, Utc::now())?;
            active_reserved
        } else {
            item.qty_reserved_from_stock
        };

        let open_qty = self.task_repo.open_qty_for_item(&item.order_item_id)?;
        let completed_qty = self.task_repo.completed_qty_for_item(&item.order_item_id)?;
        let outstanding = item.quantity - reserved - open_qty - completed_qty;

        if outstanding <= 0 {
            tracing::debug!(
                order_item_id = %item.order_item_id,
                "订单行无未清量，解析为只读"
            );
            return Ok(Resolution {
                order_item_id: item.order_item_id.clone(),
                reserved_qty: reserved,
                shortfall_qty: item.quantity - reserved,
                created_task_id: None,
            });
        }

        let reserved_add = self.reserve_up_to(item, user_id, outstanding, ttl_secs)?;
        let new_reserved = reserved + reserved_add;
        if reserved_add > 0 {
            self.item_repo
                .update_reserved_qty(&item.order_item_id, new_reserved, Utc::now())?;
        }

        let remainder = outstanding - reserved_add;
        let created_task_id = if remainder > 0 {
            match item.shortage_action {
                ShortageAction::Produce => {
                    let task_id = self.task_repo.insert(
                        &NewProductionTask {
                            order_id: item.order_id.clone(),
                            order_item_id: item.order_item_id.clone(),
                            material_id: item.material_id.clone(),
                            qty_to_produce: remainder,
                        },
                        Utc::now(),
                    )?;
                    tracing::info!(
                        order_item_id = %item.order_item_id,
                        material_id = %item.material_id,
                        task_id = task_id,
                        qty_to_produce = remainder,
                        "缺口转生产任务"
                    );
                    Some(task_id)
                }
            }
        } else {
            None
        };

        tracing::info!(
            order_item_id = %item.order_item_id,
            material_id = %item.material_id,
            reserved_qty = new_reserved,
            shortfall_qty = item.quantity - new_reserved,
            "订单行解析完成"
        );

        Ok(Resolution {
            order_item_id: item.order_item_id.clone(),
            reserved_qty: new_reserved,
            shortfall_qty: item.quantity - new_reserved,
            created_task_id,
        })
    }

    /// 尽量预留（最多 want），返回实际预留量
    ///
    /// 缺口错误在此吸收: 先按全量尝试，不足则按当时可用量
    /// 收缩重试，want 严格递减保证终止
    fn reserve_up_to(
        &self,
        item: &OrderItem,
        user_id: &str,
        mut want: i64,
        ttl_secs: i64,
    ) -> EngineResult<i64> {
        let mut reserved_add = 0i64;
        while want > 0 {
            match self.reservation_manager.reserve(
                &item.material_id,
                &item.order_id,
                &item.order_item_id,
                user_id,
                want,
                ttl_secs,
            ) {
                Ok(_) => {
                    reserved_add += want;
                    want = 0;
                }
                Err(EngineError::Shortage { available, .. }) => {
                    let retry = available.min(want - 1);
                    if retry <= 0 {
                        break;
                    }
                    want = retry;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(reserved_add)
    }
}
