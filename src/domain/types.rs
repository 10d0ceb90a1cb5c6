// ==========================================
// 制造运营平台 - 领域类型定义
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 生产任务状态 (Task Status)
// ==========================================
// 状态机: PENDING -> IN_PROGRESS -> COMPLETED
//         PENDING/IN_PROGRESS -> CANCELLED
// COMPLETED / CANCELLED 为终态，任何再转换都会被拒绝
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,    // 待开工
    InProgress, // 生产中
    Completed,  // 已完工（已入库）
    Cancelled,  // 已取消
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl TaskStatus {
    /// 从数据库字符串解析状态
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(TaskStatus::Pending),
            "IN_PROGRESS" => Some(TaskStatus::InProgress),
            "COMPLETED" => Some(TaskStatus::Completed),
            "CANCELLED" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Cancelled => "CANCELLED",
        }
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }

    /// 是否为“未完结”状态（仍计入订单行的待产数量）
    pub fn is_open(&self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::InProgress)
    }
}

// ==========================================
// 生产任务动作 (Task Action)
// ==========================================
// 外部接口以字符串动作（"start"/"complete"/"cancel"）请求状态转换，
// 在边界处解析为封闭枚举，未知动作直接拒绝
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskAction {
    Start,    // 开工
    Complete, // 完工（入库）
    Cancel,   // 取消
}

impl fmt::Display for TaskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskAction::Start => write!(f, "start"),
            TaskAction::Complete => write!(f, "complete"),
            TaskAction::Cancel => write!(f, "cancel"),
        }
    }
}

impl TaskAction {
    /// 从接口字符串解析动作（大小写不敏感）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "start" => Some(TaskAction::Start),
            "complete" => Some(TaskAction::Complete),
            "cancel" => Some(TaskAction::Cancel),
            _ => None,
        }
    }
}

// ==========================================
// 订单状态 (Order Status)
// ==========================================
// 订单状态由行项的聚合状态派生:
// - 任一关联任务 PENDING/IN_PROGRESS -> IN_PRODUCTION
// - 全部行项已由预留/完工覆盖 -> CONFIRMED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Received,     // 已受理（提交事务内的初始状态）
    Confirmed,    // 已确认（库存/完工覆盖全部需求）
    InProduction, // 生产中（存在未完结生产任务）
    Cancelled,    // 已取消
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl OrderStatus {
    /// 从数据库字符串解析状态
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "RECEIVED" => Some(OrderStatus::Received),
            "CONFIRMED" => Some(OrderStatus::Confirmed),
            "IN_PRODUCTION" => Some(OrderStatus::InProduction),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            OrderStatus::Received => "RECEIVED",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::InProduction => "IN_PRODUCTION",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

// ==========================================
// 缺口处理策略 (Shortage Action)
// ==========================================
// 目前观测到的唯一策略是 PRODUCE（缺口转生产任务）。
// 保持封闭枚举，出现其他策略证据后再扩展。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShortageAction {
    Produce, // 缺口创建生产任务
}

impl fmt::Display for ShortageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl ShortageAction {
    /// 从接口/数据库字符串解析策略（未知策略返回 None，由调用方拒绝）
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PRODUCE" => Some(ShortageAction::Produce),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ShortageAction::Produce => "PRODUCE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_action_parse() {
        assert_eq!(TaskAction::parse("start"), Some(TaskAction::Start));
        assert_eq!(TaskAction::parse(" COMPLETE "), Some(TaskAction::Complete));
        assert_eq!(TaskAction::parse("cancel"), Some(TaskAction::Cancel));
        assert_eq!(TaskAction::parse("restart"), None);
        assert_eq!(TaskAction::parse(""), None);
    }

    #[test]
    fn test_task_status_roundtrip() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Completed,
            TaskStatus::Cancelled,
        ] {
            assert_eq!(TaskStatus::from_db_str(status.to_db_str()), Some(status));
        }
        assert_eq!(TaskStatus::from_db_str("UNKNOWN"), None);
    }

    #[test]
    fn test_shortage_action_is_closed() {
        assert_eq!(ShortageAction::from_db_str("PRODUCE"), Some(ShortageAction::Produce));
        assert_eq!(ShortageAction::from_db_str("BACKORDER"), None);
        assert_eq!(ShortageAction::from_db_str("REJECT"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(TaskStatus::Pending.is_open());
        assert!(!TaskStatus::Completed.is_open());
    }
}
