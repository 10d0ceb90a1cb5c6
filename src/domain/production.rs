// ==========================================
// 制造运营平台 - 生产任务领域模型
// ==========================================
// 生产任务是把原料转化为目标材料的承诺工作单元：
// 完工时为目标材料入库（credit），并触发等待该材料的订单行重解析。
// 注意: 完工只贷记产出材料，不扣减组件/原料——与源系统观测行为一致，
// 组件耗用核算是显式的扩展点，不在此建模。
// ==========================================

use crate::domain::types::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// ProductionTask - 生产任务
// ==========================================
// 对齐: production_task 表
// task_id 为自增整数: 先创建先编号，是完工重解析的确定性排序依据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionTask {
    pub task_id: i64,                         // 任务 ID（自增）
    pub order_id: String,                     // 关联订单
    pub order_item_id: String,                // 关联订单行（被引用，不被拥有）
    pub material_id: String,                  // 目标材料
    pub qty_to_produce: i64,                  // 待产数量（> 0）
    pub status: TaskStatus,                   // 任务状态
    pub created_at: DateTime<Utc>,            // 创建时间
    pub started_at: Option<DateTime<Utc>>,    // 开工时间
    pub completed_at: Option<DateTime<Utc>>,  // 完工时间
    pub cancelled_at: Option<DateTime<Utc>>,  // 取消时间
    pub updated_at: DateTime<Utc>,            // 最后更新时间
}

// ==========================================
// NewProductionTask - 任务创建参数
// ==========================================
// 用途: 缺口解析器创建任务时的输入（task_id 由数据库分配）
#[derive(Debug, Clone)]
pub struct NewProductionTask {
    pub order_id: String,
    pub order_item_id: String,
    pub material_id: String,
    pub qty_to_produce: i64,
}
