// ==========================================
// 制造运营平台 - API 层
// ==========================================
// 职责: 边界校验、DTO 组装、ActionLog 记录
// 红线: 不含业务判定（缺口、状态机合法性在 engine 层）
// ==========================================

pub mod error;
pub mod inventory_api;
pub mod order_api;
pub mod task_api;

pub use error::{ApiError, ApiResult};
pub use inventory_api::InventoryApi;
pub use order_api::{OrderApi, OrderDetail, SubmitOrderItemRequest, SubmitOrderRequest};
pub use task_api::TaskApi;
