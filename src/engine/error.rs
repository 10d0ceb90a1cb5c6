// ==========================================
// 制造运营平台 - 引擎层错误
// ==========================================
// 错误分类:
// - InvalidQuantity: 数量非法（<= 0），提交前拒绝
// - Shortage: 可用量不足，按行策略就地恢复，不向上冒泡出提交流程
// - InvalidTransition: 状态机非法迁移
// - NotFound: 实体不存在
// - Conflict: 并发冲突重试耗尽
// ==========================================

use crate::domain::types::{TaskAction, TaskStatus};
use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("数量非法: {0}（必须 > 0）")]
    InvalidQuantity(i64),

    #[error("库存缺口: 材料 {material_id} 需求 {requested}，可用 {available}")]
    Shortage {
        material_id: String,
        requested: i64,
        available: i64,
    },

    #[error("非法状态迁移: {from} 不允许执行 {action}")]
    InvalidTransition { from: TaskStatus, action: TaskAction },

    #[error("{entity}不存在: {id}")]
    NotFound { entity: String, id: String },

    #[error("并发冲突: 重试 {retries} 次后仍未成功")]
    Conflict { retries: u32 },

    #[error("输入非法: {0}")]
    InvalidInput(String),

    #[error("仓储错误: {0}")]
    Repository(#[from] RepositoryError),

    #[error("配置读取失败: {0}")]
    Config(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
