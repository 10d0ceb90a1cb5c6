// ==========================================
// 制造运营平台 - 操作日志领域模型
// ==========================================
// 红线: 所有写入必须记录
// 用途: 审计追踪，影响分析
// 对齐: action_log 表
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    // ===== 主键 =====
    pub action_id: String,         // 日志 ID（UUID）
    pub action_type: String,       // 操作类型（存储为字符串）
    pub action_ts: NaiveDateTime,  // 操作时间戳
    pub actor: String,             // 操作人

    // ===== 操作负载 =====
    pub payload_json: Option<JsonValue>, // 操作参数（JSON）

    // ===== 影响摘要 =====
    pub impact_summary_json: Option<JsonValue>, // 影响摘要（JSON）

    // ===== 扩展字段（业务用）=====
    pub order_id: Option<String>,    // 关联订单
    pub material_id: Option<String>, // 关联材料
    pub detail: Option<String>,      // 详细描述
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    SubmitOrder,   // 订单提交
    CancelOrder,   // 订单取消
    StartTask,     // 任务开工
    CompleteTask,  // 任务完工入库
    CancelTask,    // 任务取消
    ReceiveStock,  // 外部收货入库
}

impl ActionType {
    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ActionType::SubmitOrder => "SUBMIT_ORDER",
            ActionType::CancelOrder => "CANCEL_ORDER",
            ActionType::StartTask => "START_TASK",
            ActionType::CompleteTask => "COMPLETE_TASK",
            ActionType::CancelTask => "CANCEL_TASK",
            ActionType::ReceiveStock => "RECEIVE_STOCK",
        }
    }
}
