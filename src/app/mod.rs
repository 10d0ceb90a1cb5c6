// ==========================================
// 制造运营平台 - 应用层
// ==========================================
// 职责: 装配共享状态与各层实例
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
