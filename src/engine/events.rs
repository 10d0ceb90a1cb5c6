// ==========================================
// 制造运营平台 - 引擎层完工事件
// ==========================================
// 职责: 定义完工通知 trait，实现依赖倒置
// 说明: 状态机定义 trait，履约协调器实现监听器
// 优势: 状态机不依赖协调器，避免环形引用
// ==========================================

use async_trait::async_trait;
use std::error::Error;

/// 完工事件
///
/// 任务完工入库后发出，携带重解析所需的最小上下文
#[derive(Debug, Clone)]
pub struct ProductionCompletedEvent {
    pub task_id: i64,
    pub order_id: String,
    pub order_item_id: String,
    pub material_id: String,
    pub qty_produced: i64,
}

// ==========================================
// 完工监听 Trait
// ==========================================

/// 完工事件监听者
///
/// 状态机在完工入库的事务提交后调用，监听者负责
/// 等待该材料的订单行重解析。通知失败只记日志，
/// 不回滚已提交的完工。
#[async_trait]
pub trait ProductionCompletionListener: Send + Sync {
    async fn on_production_completed(
        &self,
        event: ProductionCompletedEvent,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 空操作监听者
///
/// 用于不需要完工联动的场景（如单元测试）
#[derive(Debug, Clone, Default)]
pub struct NoOpCompletionListener;

#[async_trait]
impl ProductionCompletionListener for NoOpCompletionListener {
    async fn on_production_completed(
        &self,
        event: ProductionCompletedEvent,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            task_id = event.task_id,
            material_id = %event.material_id,
            "NoOpCompletionListener: 跳过完工联动"
        );
        Ok(())
    }
}
