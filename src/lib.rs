// ==========================================
// 制造运营平台 - 库存预留与生产履约引擎 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 制造运营平台的履约核心（库存预留 / 缺口转产 / 完工联动）
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// 应用层 - 装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{OrderStatus, ShortageAction, TaskAction, TaskStatus};

// 领域实体
pub use domain::{
    ActionLog, ActionType, CustomerOrder, Material, OrderDraft, OrderItem, OrderLineDraft,
    ProductionTask, Reservation, StockBalance,
};

// 引擎
pub use engine::{
    FulfillmentCoordinator, ProductionTaskStateMachine, ReservationManager, Resolution,
    ShortageResolver, StockLedger,
};

// API
pub use api::{InventoryApi, OrderApi, TaskApi};

// ==========================================
// 常量
// ==========================================

/// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 系统名称
pub const APP_NAME: &str = "制造运营平台 - 库存预留与生产履约引擎";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
        assert!(!APP_NAME.is_empty());
    }
}
