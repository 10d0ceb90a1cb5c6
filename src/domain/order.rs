// ==========================================
// 制造运营平台 - 订单领域模型
// ==========================================
// 订单头拥有有序的订单行；订单状态由行项与其关联
// 预留/生产任务的聚合状态派生，不独立维护。
// ==========================================

use crate::domain::types::{OrderStatus, ShortageAction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// CustomerOrder - 订单头
// ==========================================
// 对齐: customer_order 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerOrder {
    pub order_id: String,                 // 订单 ID（UUID）
    pub status: OrderStatus,              // 派生状态
    pub source: Option<String>,           // 订单来源（渠道标识）
    pub customer_name: Option<String>,    // 客户名称
    pub created_at: DateTime<Utc>,        // 创建时间
    pub updated_at: DateTime<Utc>,        // 最后更新时间
}

// ==========================================
// OrderItem - 订单行
// ==========================================
// 守恒不变式（完全解析后）:
//   qty_reserved_from_stock
//   + Σ(未完结任务 qty_to_produce)
//   + Σ(已完工任务 qty_to_produce)
//   == quantity
// 未满足该等式的行为“开放行”（open），等待重解析
// 对齐: order_item 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_item_id: String,            // 行 ID（UUID）
    pub order_id: String,                 // 关联订单
    pub material_id: String,              // 需求材料
    pub quantity: i64,                    // 需求数量（> 0）
    pub unit_price: Option<f64>,          // 单价（展示属性，核心不做金额汇总）
    pub shortage_action: ShortageAction,  // 缺口处理策略（观测值: PRODUCE）
    pub qty_reserved_from_stock: i64,     // 已由预留覆盖的数量
    pub item_description: Option<String>, // 行描述（展示属性）
    pub color: Option<String>,            // 颜色（展示属性）
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==========================================
// OrderDraft / OrderLineDraft - 提交输入
// ==========================================
// 用途: 履约协调器 submit_order 的输入（ID 与时间戳由协调器分配）
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub source: Option<String>,
    pub customer_name: Option<String>,
    pub user_id: String, // 提交人（预留的归属人）
    pub lines: Vec<OrderLineDraft>,
}

#[derive(Debug, Clone)]
pub struct OrderLineDraft {
    pub material_id: String,
    pub quantity: i64,
    pub unit_price: Option<f64>,
    pub shortage_action: ShortageAction,
    pub item_description: Option<String>,
    pub color: Option<String>,
}
