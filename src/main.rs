// ==========================================
// 制造运营平台 - 库存预留与生产履约引擎 - 主入口
// ==========================================
// 技术栈: Rust + SQLite
// 说明: 以库模式嵌入上层应用；本入口负责建库建表与装配自检
// ==========================================

use factory_ops::app::{get_default_db_path, AppState};
use factory_ops::db;

fn main() {
    // 初始化日志系统
    factory_ops::logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", factory_ops::APP_NAME);
    tracing::info!("系统版本: {}", factory_ops::VERSION);
    tracing::info!("==================================================");

    // 获取数据库路径
    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    // 建库建表（幂等）
    let conn = match db::open_sqlite_connection(&db_path) {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!("无法打开数据库: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = db::init_schema(&conn) {
        tracing::error!("无法初始化数据库结构: {}", e);
        std::process::exit(1);
    }
    match db::read_schema_version(&conn) {
        Ok(Some(version)) if version == db::CURRENT_SCHEMA_VERSION => {
            tracing::info!("数据库结构版本: {}", version);
        }
        Ok(Some(version)) => {
            tracing::warn!(
                "数据库结构版本不一致: 期望 {}，实际 {}",
                db::CURRENT_SCHEMA_VERSION,
                version
            );
        }
        Ok(None) => tracing::warn!("数据库结构版本缺失"),
        Err(e) => tracing::warn!("数据库结构版本读取失败: {}", e),
    }
    drop(conn);

    // 创建AppState（装配自检）
    tracing::info!("正在初始化AppState...");
    let app_state = match AppState::new(db_path) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("无法初始化AppState: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("AppState初始化成功，数据库: {}", app_state.db_path);
    tracing::info!("引擎以库模式提供服务，集成方通过 api 层接入");
}
