// ==========================================
// 制造运营平台 - 材料领域模型
// ==========================================
// 红线: material_master 为只读参考数据，核心逻辑不得修改
// 红线: stock_balance 唯一事实层，仅账本（Stock Ledger）可写
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Material - 材料主数据
// ==========================================
// 用途: 种子/外部系统写入，核心只读
// 对齐: material_master 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub material_id: String,          // 材料唯一标识（材料号）
    pub name: String,                 // 材料名称
    pub unit: String,                 // 计量单位（默认 PCS）
    pub created_at: DateTime<Utc>,    // 记录创建时间
    pub updated_at: DateTime<Utc>,    // 记录更新时间
}

// ==========================================
// StockBalance - 库存余额
// ==========================================
// 红线: on_hand >= 0 恒成立
// 写入路径: 完工入库（credit）/ 外部收货（receive）
// 对齐: stock_balance 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockBalance {
    pub material_id: String,          // 关联 material_master（FK）
    pub on_hand: i64,                 // 实物在库数量
    pub updated_at: DateTime<Utc>,    // 最后更新时间
}

// ==========================================
// InventorySnapshotRow - 库存快照行
// ==========================================
// 用途: 前端库存视图的只读投影（在库/活跃预留/可用）
// 说明: available = max(0, on_hand - reserved)，对外不暴露负数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventorySnapshotRow {
    pub material_id: String,
    pub material_name: String,
    pub unit: String,
    pub on_hand: i64,                 // 实物在库
    pub reserved: i64,                // 活跃预留合计（expires_at > now）
    pub available: i64,               // 可用 = max(0, on_hand - reserved)
}
