// ==========================================
// 制造运营平台 - SQLite 连接初始化与建库
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免“部分模块外键开启/部分不开启”
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 提供幂等建库入口（CREATE TABLE IF NOT EXISTS），迁移脚本不在本核心范围内
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
///
/// 说明：
/// - 版本号仅用于**提示/告警**（不做自动迁移），避免静默在旧库上运行导致隐性错误。
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 幂等建库（核心表全集）
///
/// 说明：
/// - 所有表使用 CREATE TABLE IF NOT EXISTS，可安全重复调用
/// - production_task 使用 INTEGER 自增主键：task_id 的先后顺序是
///   完工重解析时唯一的确定性排序依据
/// - reservation 的 expires_at 永远用“谓词过滤”参与可用量计算，
///   过期行即使尚未被清扫也不得计入活跃预留
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_scope (
            scope_id TEXT PRIMARY KEY,
            scope_type TEXT NOT NULL,
            scope_key TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(scope_type, scope_key)
        );

        INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
        VALUES ('global', 'GLOBAL', 'global');

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS material_master (
            material_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            unit TEXT NOT NULL DEFAULT 'PCS',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS stock_balance (
            material_id TEXT PRIMARY KEY REFERENCES material_master(material_id),
            on_hand INTEGER NOT NULL DEFAULT 0 CHECK (on_hand >= 0),
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS customer_order (
            order_id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            source TEXT,
            customer_name TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS order_item (
            order_item_id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL REFERENCES customer_order(order_id),
            material_id TEXT NOT NULL REFERENCES material_master(material_id),
            quantity INTEGER NOT NULL CHECK (quantity > 0),
            unit_price REAL,
            shortage_action TEXT NOT NULL DEFAULT 'PRODUCE',
            qty_reserved_from_stock INTEGER NOT NULL DEFAULT 0,
            item_description TEXT,
            color TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_order_item_material
            ON order_item(material_id);

        CREATE TABLE IF NOT EXISTS reservation (
            reservation_id TEXT PRIMARY KEY,
            material_id TEXT NOT NULL REFERENCES material_master(material_id),
            order_id TEXT NOT NULL REFERENCES customer_order(order_id),
            order_item_id TEXT NOT NULL REFERENCES order_item(order_item_id),
            user_id TEXT NOT NULL,
            qty INTEGER NOT NULL CHECK (qty > 0),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_reservation_material_expiry
            ON reservation(material_id, expires_at);

        CREATE TABLE IF NOT EXISTS production_task (
            task_id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_id TEXT NOT NULL REFERENCES customer_order(order_id),
            order_item_id TEXT NOT NULL REFERENCES order_item(order_item_id),
            material_id TEXT NOT NULL REFERENCES material_master(material_id),
            qty_to_produce INTEGER NOT NULL CHECK (qty_to_produce > 0),
            status TEXT NOT NULL DEFAULT 'PENDING',
            created_at TEXT NOT NULL,
            started_at TEXT,
            completed_at TEXT,
            cancelled_at TEXT,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_production_task_material_status
            ON production_task(material_id, status);

        CREATE TABLE IF NOT EXISTS action_log (
            action_id TEXT PRIMARY KEY,
            action_type TEXT NOT NULL,
            action_ts TEXT NOT NULL,
            actor TEXT NOT NULL,
            payload_json TEXT,
            impact_summary_json TEXT,
            order_id TEXT,
            material_id TEXT,
            detail TEXT
        );

        INSERT OR IGNORE INTO schema_version (version) VALUES (1);
        "#,
    )?;

    Ok(())
}
