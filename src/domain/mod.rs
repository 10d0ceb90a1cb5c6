// ==========================================
// 制造运营平台 - 领域层
// ==========================================
// 职责: 实体与类型定义，不含数据访问与业务编排
// ==========================================

pub mod action_log;
pub mod material;
pub mod order;
pub mod production;
pub mod reservation;
pub mod types;

// 重导出核心实体
pub use action_log::{ActionLog, ActionType};
pub use material::{InventorySnapshotRow, Material, StockBalance};
pub use order::{CustomerOrder, OrderDraft, OrderItem, OrderLineDraft};
pub use production::{NewProductionTask, ProductionTask};
pub use reservation::{Reservation, ReservationListRow};
pub use types::{OrderStatus, ShortageAction, TaskAction, TaskStatus};
