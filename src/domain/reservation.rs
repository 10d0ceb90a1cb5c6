// ==========================================
// 制造运营平台 - 预留领域模型
// ==========================================
// 预留是对库存的限时占用（TTL 持有），不是永久分配：
// 停滞的订单不得永久饿死其他需求。
// 过期判定是惰性的（读路径清扫），没有后台定时器。
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Reservation - 库存预留
// ==========================================
// 活跃判定: expires_at > now；过期行即使尚未删除也视同不存在
// 对齐: reservation 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_id: String,       // 预留 ID（UUID）
    pub material_id: String,          // 关联材料
    pub order_id: String,             // 关联订单
    pub order_item_id: String,        // 关联订单行（便于幂等重解析）
    pub user_id: String,              // 创建人
    pub qty: i64,                     // 预留数量（> 0）
    pub created_at: DateTime<Utc>,    // 创建时间
    pub updated_at: DateTime<Utc>,    // 最后刷新时间
    pub expires_at: DateTime<Utc>,    // 过期时间（now + ttl）
}

impl Reservation {
    /// 活跃判定（expires_at 严格大于 now）
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

// ==========================================
// ReservationListRow - 预留列表行
// ==========================================
// 用途: 前端预留列表的只读投影（带材料名等人类可读标识）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationListRow {
    pub reservation_id: String,
    pub material_id: String,
    pub material_name: String,
    pub order_id: String,
    pub user_id: String,
    pub qty: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
