// ==========================================
// 制造运营平台 - 仓储层
// ==========================================
// 职责: SQL 与领域模型之间的映射，事务边界
// 红线: 不含业务判定（缺口定性、状态机合法性均在 engine 层）
// ==========================================

pub mod action_log_repo;
pub mod error;
pub mod material_repo;
pub mod order_repo;
pub mod production_task_repo;
pub mod reservation_repo;

pub use action_log_repo::ActionLogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use material_repo::{MaterialRepository, StockBalanceRepository};
pub use order_repo::{OrderItemRepository, OrderRepository};
pub use production_task_repo::ProductionTaskRepository;
pub use reservation_repo::ReservationRepository;
