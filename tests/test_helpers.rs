// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、环境装配、测试数据生成
// ==========================================

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use factory_ops::config::FulfillmentConfigReader;
use factory_ops::db::{init_schema, open_sqlite_connection};
use factory_ops::domain::types::{OrderStatus, ShortageAction};
use factory_ops::engine::{
    FulfillmentCoordinator, ProductionTaskStateMachine, ReservationManager, ShortageResolver,
    StockLedger,
};
use factory_ops::repository::{
    ActionLogRepository, MaterialRepository, OrderItemRepository, OrderRepository,
    ProductionTaskRepository, ReservationRepository, StockBalanceRepository,
};
use rusqlite::Connection;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// Mock 配置结构（固定值，测试可控）
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub reservation_ttl_secs: i64,
    pub conflict_max_retries: u32,
}

impl MockConfig {
    pub fn default() -> Self {
        Self {
            reservation_ttl_secs: 1800,
            conflict_max_retries: 3,
        }
    }

    /// 极短 TTL，用于过期语义测试
    pub fn with_ttl_secs(ttl_secs: i64) -> Self {
        let mut config = Self::default();
        config.reservation_ttl_secs = ttl_secs;
        config
    }
}

#[async_trait]
impl FulfillmentConfigReader for MockConfig {
    async fn get_reservation_ttl_secs(&self) -> Result<i64, Box<dyn Error>> {
        Ok(self.reservation_ttl_secs)
    }

    async fn get_conflict_max_retries(&self) -> Result<u32, Box<dyn Error>> {
        Ok(self.conflict_max_retries)
    }
}

/// 测试环境: 共享连接 + 全套仓储与引擎
pub struct TestEnv {
    pub conn: Arc<Mutex<Connection>>,
    pub material_repo: Arc<MaterialRepository>,
    pub balance_repo: Arc<StockBalanceRepository>,
    pub reservation_repo: Arc<ReservationRepository>,
    pub task_repo: Arc<ProductionTaskRepository>,
    pub order_repo: Arc<OrderRepository>,
    pub item_repo: Arc<OrderItemRepository>,
    pub action_log_repo: Arc<ActionLogRepository>,
    pub ledger: Arc<StockLedger>,
    pub reservation_manager: Arc<ReservationManager>,
    pub resolver: Arc<ShortageResolver<MockConfig>>,
    pub coordinator: Arc<FulfillmentCoordinator<MockConfig>>,
    pub state_machine: Arc<ProductionTaskStateMachine>,
}

impl TestEnv {
    /// 在指定数据库上装配全套引擎（完工联动已挂接）
    ///
    /// 连接走统一初始化入口，外键与 busy_timeout 和生产路径一致
    pub fn build(db_path: &str, config: MockConfig) -> Self {
        let conn = Arc::new(Mutex::new(open_sqlite_connection(db_path).unwrap()));

        let material_repo = Arc::new(MaterialRepository::new(conn.clone()));
        let balance_repo = Arc::new(StockBalanceRepository::new(conn.clone()));
        let reservation_repo = Arc::new(ReservationRepository::new(conn.clone()));
        let task_repo = Arc::new(ProductionTaskRepository::new(conn.clone()));
        let order_repo = Arc::new(OrderRepository::new(conn.clone()));
        let item_repo = Arc::new(OrderItemRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));

        let ledger = Arc::new(StockLedger::new(balance_repo.clone()));
        let reservation_manager = Arc::new(ReservationManager::new(
            reservation_repo.clone(),
            balance_repo.clone(),
        ));
        let config = Arc::new(config);
        let resolver = Arc::new(ShortageResolver::new(
            item_repo.clone(),
            task_repo.clone(),
            reservation_manager.clone(),
            config,
        ));
        let coordinator = Arc::new(FulfillmentCoordinator::new(
            material_repo.clone(),
            order_repo.clone(),
            item_repo.clone(),
            task_repo.clone(),
            reservation_manager.clone(),
            resolver.clone(),
        ));
        let state_machine = Arc::new(
            ProductionTaskStateMachine::new(task_repo.clone())
                .with_completion_listener(coordinator.clone() as _),
        );

        Self {
            conn,
            material_repo,
            balance_repo,
            reservation_repo,
            task_repo,
            order_repo,
            item_repo,
            action_log_repo,
            ledger,
            reservation_manager,
            resolver,
            coordinator,
            state_machine,
        }
    }

    /// 写入材料主数据 + 库存余额
    pub fn seed_material(&self, material_id: &str, on_hand: i64) {
        let now = Utc::now();
        self.material_repo
            .upsert(&factory_ops::Material {
                material_id: material_id.to_string(),
                name: format!("测试材料 {}", material_id),
                unit: "PCS".to_string(),
                created_at: now,
                updated_at: now,
            })
            .unwrap();
        self.balance_repo.upsert(material_id, on_hand, now).unwrap();
    }

    /// 写入订单头 + 行（外键开启后，预留/任务需要真实父行）
    ///
    /// 订单头用 INSERT OR IGNORE，同一订单可多次追加行
    pub fn seed_order_item(
        &self,
        order_id: &str,
        order_item_id: &str,
        material_id: &str,
        quantity: i64,
    ) {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO customer_order
                 (order_id, status, source, created_at, updated_at)
             VALUES (?1, ?2, 'TEST', ?3, ?3)",
            rusqlite::params![order_id, OrderStatus::Received.to_db_str(), now],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO order_item
                 (order_item_id, order_id, material_id, quantity, shortage_action,
                  qty_reserved_from_stock, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)",
            rusqlite::params![
                order_item_id,
                order_id,
                material_id,
                quantity,
                ShortageAction::Produce.to_db_str(),
                now
            ],
        )
        .unwrap();
    }
}
