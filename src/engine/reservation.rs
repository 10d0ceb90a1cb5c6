// ==========================================
// 制造运营平台 - 预留管理器
// ==========================================
// 职责: TTL 预留的创建、释放、续期、惰性清扫
// 红线: 创建走仓储的单事务判定，遇忙碌错误做有界内部重试
// 红线: 释放幂等——目标不存在视为成功
// ==========================================

use crate::domain::reservation::{Reservation, ReservationListRow};
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::material_repo::StockBalanceRepository;
use crate::repository::reservation_repo::ReservationRepository;
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// 并发冲突内部重试的默认上限
pub const DEFAULT_MAX_RETRIES: u32 = 3;

pub struct ReservationManager {
    reservation_repo: Arc<ReservationRepository>,
    balance_repo: Arc<StockBalanceRepository>,
    max_retries: u32,
}

impl ReservationManager {
    pub fn new(
        reservation_repo: Arc<ReservationRepository>,
        balance_repo: Arc<StockBalanceRepository>,
    ) -> Self {
        Self {
            reservation_repo,
            balance_repo,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// 覆写重试上限（来源: config_kv 的 conflict_max_retries）
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// 创建预留
    ///
    /// # 返回
    /// - Ok(reservation): 预留成功
    /// - Err(InvalidQuantity): qty <= 0
    /// - Err(Shortage): 可用量不足（携带当时的可用量）
    /// - Err(Conflict): 忙碌重试耗尽
    ///
    /// # 说明
    /// - 判定与插入在仓储单事务内完成，本层只解释结果
    /// - 仅对可重试的仓储错误（数据库忙碌）做内部重试
    pub fn reserve(
        &self,
        material_id: &str,
        order_id: &str,
        order_item_id: &str,
        user_id: &str,
        qty: i64,
        ttl_secs: i64,
    ) -> EngineResult<Reservation> {
        if qty <= 0 {
            return Err(EngineError::InvalidQuantity(qty));
        }

        let mut attempt: u32 = 0;
        loop {
            let now = Utc::now();
            let reservation = Reservation {
                reservation_id: Uuid::new_v4().to_string(),
                material_id: material_id.to_string(),
                order_id: order_id.to_string(),
                order_item_id: order_item_id.to_string(),
                user_id: user_id.to_string(),
                qty,
                created_at: now,
                updated_at: now,
                expires_at: now + Duration::seconds(ttl_secs),
            };

            match self.reservation_repo.try_reserve(&reservation) {
                Ok(true) => {
                    tracing::debug!(
                        reservation_id = %reservation.reservation_id,
                        material_id = %material_id,
                        qty = qty,
                        ttl_secs = ttl_secs,
                        "预留创建成功"
                    );
                    return Ok(reservation);
                }
                Ok(false) => {
                    let available = self
                        .balance_repo
                        .availability(material_id, Utc::now())?
                        .map(|(on_hand, reserved)| (on_hand - reserved).max(0))
                        .unwrap_or(0);
                    return Err(EngineError::Shortage {
                        material_id: material_id.to_string(),
                        requested: qty,
                        available,
                    });
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        material_id = %material_id,
                        attempt = attempt,
                        max_retries = self.max_retries,
                        "预留写入遇忙碌，重试"
                    );
                }
                Err(e) if e.is_retryable() => {
                    return Err(EngineError::Conflict {
                        retries: self.max_retries,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// 释放预留（幂等: 不存在视为已释放）
    pub fn release(&self, reservation_id: &str) -> EngineResult<()> {
        let deleted = self.reservation_repo.delete(reservation_id)?;
        if deleted {
            tracing::debug!(reservation_id = %reservation_id, "预留已释放");
        } else {
            tracing::debug!(reservation_id = %reservation_id, "预留不存在，按已释放处理");
        }
        Ok(())
    }

    /// 释放订单名下的全部预留，返回释放数量
    pub fn release_for_order(&self, order_id: &str) -> EngineResult<usize> {
        let released = self.reservation_repo.delete_by_order(order_id)?;
        if released > 0 {
            tracing::info!(order_id = %order_id, released = released, "订单预留已批量释放");
        }
        Ok(released)
    }

    /// 续期行项目名下的活跃预留，返回续期数量
    pub fn refresh_for_item(&self, order_item_id: &str, ttl_secs: i64) -> EngineResult<usize> {
        let now = Utc::now();
        let refreshed = self.reservation_repo.refresh_for_item(
            order_item_id,
            now + Duration::seconds(ttl_secs),
            now,
        )?;
        Ok(refreshed)
    }

    /// 行项目名下的活跃预留
    pub fn list_active_by_item(&self, order_item_id: &str) -> EngineResult<Vec<Reservation>> {
        Ok(self
            .reservation_repo
            .list_active_by_item(order_item_id, Utc::now())?)
    }

    /// 材料的活跃预留合计
    pub fn active_total(&self, material_id: &str) -> EngineResult<i64> {
        Ok(self.reservation_repo.active_total(material_id, Utc::now())?)
    }

    /// 清扫全表过期预留，返回清扫数量
    pub fn sweep_expired(&self) -> EngineResult<usize> {
        let swept = self.reservation_repo.sweep_expired(Utc::now())?;
        if swept > 0 {
            tracing::info!(swept = swept, "过期预留清扫完成");
        }
        Ok(swept)
    }

    /// 活跃预留列表（带材料名）
    pub fn list_active(&self) -> EngineResult<Vec<ReservationListRow>> {
        Ok(self.reservation_repo.list_active(Utc::now())?)
    }
}
