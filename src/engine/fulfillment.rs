// ==========================================
// 制造运营平台 - 履约协调器
// ==========================================
// 职责: 订单提交 / 取消 / 完工联动重解析的编排
// 派生口径: 订单有未完结任务 => IN_PRODUCTION，否则 CONFIRMED；
//           CANCELLED 为终态，不被派生覆盖
// 红线: 单行缺口不扣留整单——Shortage 由解析器就地恢复
// ==========================================

use crate::config::fulfillment_config_trait::FulfillmentConfigReader;
use crate::domain::order::{CustomerOrder, OrderDraft, OrderItem};
use crate::domain::types::{OrderStatus, TaskAction};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::events::{ProductionCompletedEvent, ProductionCompletionListener};
use crate::engine::production::legal_sources;
use crate::engine::reservation::ReservationManager;
use crate::engine::shortage::{Resolution, ShortageResolver};
use crate::repository::material_repo::MaterialRepository;
use crate::repository::order_repo::{OrderItemRepository, OrderRepository};
use crate::repository::production_task_repo::ProductionTaskRepository;
use async_trait::async_trait;
use chrono::Utc;
use std::error::Error;
use std::sync::Arc;
use uuid::Uuid;

/// 完工联动重解析时预留的归属人
pub const SYSTEM_ACTOR: &str = "system";

// ==========================================
// SubmitOutcome - 提交结果
// ==========================================
#[derive(Debug, Clone, serde::Serialize)]
pub struct SubmitOutcome {
    pub order: CustomerOrder,
    pub resolutions: Vec<Resolution>,
}

// ==========================================
// CancelOutcome - 取消结果
// ==========================================
#[derive(Debug, Clone, serde::Serialize)]
pub struct CancelOutcome {
    pub order: CustomerOrder,
    pub released_reservations: usize,
    pub cancelled_tasks: usize,
}

pub struct FulfillmentCoordinator<C: FulfillmentConfigReader> {
    material_repo: Arc<MaterialRepository>,
    order_repo: Arc<OrderRepository>,
    item_repo: Arc<OrderItemRepository>,
    task_repo: Arc<ProductionTaskRepository>,
    reservation_manager: Arc<ReservationManager>,
    resolver: Arc<ShortageResolver<C>>,
}

impl<C: FulfillmentConfigReader> FulfillmentCoordinator<C> {
    pub fn new(
        material_repo: Arc<MaterialRepository>,
        order_repo: Arc<OrderRepository>,
        item_repo: Arc<OrderItemRepository>,
        task_repo: Arc<ProductionTaskRepository>,
        reservation_manager: Arc<ReservationManager>,
        resolver: Arc<ShortageResolver<C>>,
    ) -> Self {
        Self {
            material_repo,
            order_repo,
            item_repo,
            task_repo,
            reservation_manager,
            resolver,
        }
    }

    /// 提交订单
    ///
    /// # 流程
    /// 1. 校验草稿（行非空、数量 > 0、材料已知）
    /// 2. 订单头 + 全部行单事务落库
    /// 3. 逐行净额解析（预留 + 缺口转任务）
    /// 4. 派生并落库订单状态
    ///
    /// # 说明
    /// 校验全部通过后才落库，单行缺口不会使提交失败
    pub async fn submit_order(&self, draft: &OrderDraft) -> EngineResult<SubmitOutcome> {
        if draft.lines.is_empty() {
            return Err(EngineError::InvalidInput("订单不含任何行".to_string()));
        }
        for line in &draft.lines {
            if line.quantity <= 0 {
                return Err(EngineError::InvalidQuantity(line.quantity));
            }
            if !self.material_repo.exists(&line.material_id)? {
                return Err(EngineError::NotFound {
                    entity: "材料".to_string(),
                    id: line.material_id.clone(),
                });
            }
        }

        let now = Utc::now();
        let order = CustomerOrder {
            order_id: Uuid::new_v4().to_string(),
            status: OrderStatus::Received,
            source: draft.source.clone(),
            customer_name: draft.customer_name.clone(),
            created_at: now,
            updated_at: now,
        };

        let items: Vec<OrderItem> = draft
            .lines
            .iter()
            .map(|line| OrderItem {
                order_item_id: Uuid::new_v4().to_string(),
                order_id: order.order_id.clone(),
                material_id: line.material_id.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                shortage_action: line.shortage_action,
                qty_reserved_from_stock: 0,
                item_description: line.item_description.clone(),
                color: line.color.clone(),
                created_at: now,
                updated_at: now,
            })
            .collect();

        self.order_repo.insert_with_items(&order, &items)?;
        tracing::info!(
            order_id = %order.order_id,
            lines = items.len(),
            "订单落库，开始逐行解析"
        );

        let mut resolutions = Vec::with_capacity(items.len());
        for item in &items {
            resolutions.push(self.resolver.resolve(item, &draft.user_id).await?);
        }

        let status = self.derive_and_store_status(&order.order_id)?;

        Ok(SubmitOutcome {
            order: CustomerOrder { status, ..order },
            resolutions,
        })
    }

    /// 取消订单
    ///
    /// # 流程
    /// 1. 释放订单名下全部预留
    /// 2. 取消全部未完结任务（不触碰库存）
    /// 3. 状态落 CANCELLED
    ///
    /// # 幂等
    /// 已取消的订单重复取消为无操作
    pub fn cancel_order(&self, order_id: &str) -> EngineResult<CancelOutcome> {
        let order = self
            .order_repo
            .find_by_id(order_id)?
            .ok_or_else(|| EngineError::NotFound {
                entity: "订单".to_string(),
                id: order_id.to_string(),
            })?;

        if order.status == OrderStatus::Cancelled {
            return Ok(CancelOutcome {
                order,
                released_reservations: 0,
                cancelled_tasks: 0,
            });
        }

        let released = self.reservation_manager.release_for_order(order_id)?;

        let open_tasks = self.task_repo.list_open_by_order(order_id)?;
        let mut cancelled = 0usize;
        let now = Utc::now();
        for task in &open_tasks {
            // 与人工取消竞争时输掉也无妨，守卫未命中即跳过
            if self
                .task_repo
                .cancel(task.task_id, now, &legal_sources(TaskAction::Cancel))?
            {
                cancelled += 1;
            }
        }

        self.order_repo
            .update_status(order_id, OrderStatus::Cancelled, now)?;
        tracing::info!(
            order_id = %order_id,
            released = released,
            cancelled_tasks = cancelled,
            "订单已取消"
        );

        Ok(CancelOutcome {
            order: CustomerOrder {
                status: OrderStatus::Cancelled,
                updated_at: now,
                ..order
            },
            released_reservations: released,
            cancelled_tasks: cancelled,
        })
    }

    /// 完工联动: 先重解析完工任务所属行，再按任务号升序
    /// 重解析等待该材料的其他开放行（先创建先受益）
    pub async fn resolve_waiting_items(&self, event: &ProductionCompletedEvent) -> EngineResult<()> {
        let mut touched_orders: Vec<String> = Vec::new();
        let mut resolved_items = 0usize;

        if let Some(origin) = self.item_repo.find_by_id(&event.order_item_id)? {
            if self.order_is_active(&origin.order_id)? {
                self.resolver.resolve(&origin, SYSTEM_ACTOR).await?;
                touched_orders.push(origin.order_id.clone());
                resolved_items += 1;
            }
        }

        let waiting = self
            .item_repo
            .list_waiting_by_material(&event.material_id, Utc::now())?;
        for item in &waiting {
            if item.order_item_id == event.order_item_id {
                continue;
            }
            self.resolver.resolve(item, SYSTEM_ACTOR).await?;
            resolved_items += 1;
            if !touched_orders.contains(&item.order_id) {
                touched_orders.push(item.order_id.clone());
            }
        }

        for order_id in &touched_orders {
            self.derive_and_store_status(order_id)?;
        }

        tracing::info!(
            material_id = %event.material_id,
            task_id = event.task_id,
            resolved_items = resolved_items,
            touched_orders = touched_orders.len(),
            "完工联动重解析完成"
        );
        Ok(())
    }

    /// 派生并落库订单状态（CANCELLED 不被覆盖）
    fn derive_and_store_status(&self, order_id: &str) -> EngineResult<OrderStatus> {
        let order = self
            .order_repo
            .find_by_id(order_id)?
            .ok_or_else(|| EngineError::NotFound {
                entity: "订单".to_string(),
                id: order_id.to_string(),
            })?;

        if order.status == OrderStatus::Cancelled {
            return Ok(OrderStatus::Cancelled);
        }

        let status = if self.task_repo.has_open_tasks(order_id)? {
            OrderStatus::InProduction
        } else {
            OrderStatus::Confirmed
        };

        if status != order.status {
            self.order_repo.update_status(order_id, status, Utc::now())?;
        }
        Ok(status)
    }

    fn order_is_active(&self, order_id: &str) -> EngineResult<bool> {
        Ok(self
            .order_repo
            .find_by_id(order_id)?
            .map(|o| o.status != OrderStatus::Cancelled)
            .unwrap_or(false))
    }
}

// ==========================================
// 完工监听实现
// ==========================================
// 状态机在完工事务提交后调用，失败只记日志不回滚
#[async_trait]
impl<C: FulfillmentConfigReader + 'static> ProductionCompletionListener
    for FulfillmentCoordinator<C>
{
    async fn on_production_completed(
        &self,
        event: ProductionCompletedEvent,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.resolve_waiting_items(&event)
            .await
            .map_err(|e| Box::new(e) as Box<dyn Error + Send + Sync>)
    }
}
