// ==========================================
// 制造运营平台 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{InventoryApi, OrderApi, TaskApi};
use crate::config::config_manager::ConfigManager;
use crate::engine::fulfillment::FulfillmentCoordinator;
use crate::engine::ledger::StockLedger;
use crate::engine::production::ProductionTaskStateMachine;
use crate::engine::reservation::ReservationManager;
use crate::engine::shortage::ShortageResolver;
use crate::repository::{
    action_log_repo::ActionLogRepository,
    material_repo::{MaterialRepository, StockBalanceRepository},
    order_repo::{OrderItemRepository, OrderRepository},
    production_task_repo::ProductionTaskRepository,
    reservation_repo::ReservationRepository,
};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 订单API
    pub order_api: Arc<OrderApi<ConfigManager>>,

    /// 生产任务API
    pub task_api: Arc<TaskApi>,

    /// 库存API
    pub inventory_api: Arc<InventoryApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 初始化所有Repository（共享一条连接）
    /// 2. 初始化引擎（账本、预留、解析器、状态机、协调器）
    /// 3. 挂接完工监听（状态机 -> 协调器）
    /// 4. 创建所有API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        // 创建数据库连接（共享连接）
        let conn = crate::db::open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // Repository 层
        // ==========================================
        let material_repo = Arc::new(MaterialRepository::new(Arc::clone(&conn)));
        let balance_repo = Arc::new(StockBalanceRepository::new(Arc::clone(&conn)));
        let reservation_repo = Arc::new(ReservationRepository::new(Arc::clone(&conn)));
        let task_repo = Arc::new(ProductionTaskRepository::new(Arc::clone(&conn)));
        let order_repo = Arc::new(OrderRepository::new(Arc::clone(&conn)));
        let item_repo = Arc::new(OrderItemRepository::new(Arc::clone(&conn)));
        let action_log_repo = Arc::new(ActionLogRepository::new(Arc::clone(&conn)));

        // ==========================================
        // 配置层
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(Arc::clone(&conn))
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let max_retries = config_manager
            .conflict_max_retries()
            .map_err(|e| format!("无法读取冲突重试配置: {}", e))?;

        // ==========================================
        // 引擎层
        // ==========================================
        let ledger = Arc::new(StockLedger::new(Arc::clone(&balance_repo)));
        let reservation_manager = Arc::new(
            ReservationManager::new(Arc::clone(&reservation_repo), Arc::clone(&balance_repo))
                .with_max_retries(max_retries),
        );
        let resolver = Arc::new(ShortageResolver::new(
            Arc::clone(&item_repo),
            Arc::clone(&task_repo),
            Arc::clone(&reservation_manager),
            Arc::clone(&config_manager),
        ));
        let coordinator = Arc::new(FulfillmentCoordinator::new(
            Arc::clone(&material_repo),
            Arc::clone(&order_repo),
            Arc::clone(&item_repo),
            Arc::clone(&task_repo),
            Arc::clone(&reservation_manager),
            Arc::clone(&resolver),
        ));

        // 完工联动: 状态机 -> 协调器（依赖倒置，状态机只认监听 trait）
        let state_machine = Arc::new(
            ProductionTaskStateMachine::new(Arc::clone(&task_repo))
                .with_completion_listener(Arc::clone(&coordinator) as _),
        );

        // ==========================================
        // API 层
        // ==========================================
        let order_api = Arc::new(OrderApi::new(
            Arc::clone(&coordinator),
            Arc::clone(&order_repo),
            Arc::clone(&item_repo),
            Arc::clone(&task_repo),
            Arc::clone(&action_log_repo),
        ));
        let task_api = Arc::new(TaskApi::new(
            Arc::clone(&state_machine),
            Arc::clone(&task_repo),
            Arc::clone(&action_log_repo),
        ));
        let inventory_api = Arc::new(InventoryApi::new(
            Arc::clone(&ledger),
            Arc::clone(&reservation_manager),
            Arc::clone(&action_log_repo),
        ));

        tracing::info!("AppState 初始化完成");

        Ok(Self {
            db_path,
            order_api,
            task_api,
            inventory_api,
            config_manager,
            action_log_repo,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 FACTORY_OPS_DB_PATH > 用户数据目录 > 当前目录回退
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var("FACTORY_OPS_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./factory_ops.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("factory-ops-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("factory-ops");
        }

        // 确保目录存在
        std::fs::create_dir_all(&path).ok();
        path = path.join("factory_ops.db");
    }

    path.to_string_lossy().to_string()
}
