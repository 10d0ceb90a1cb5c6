// ==========================================
// 制造运营平台 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::fulfillment_config_trait::FulfillmentConfigReader;
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    // ===== 同步读取（AppState 装配期使用）=====

    /// 预留 TTL（秒），同步读取
    pub fn reservation_ttl_secs(&self) -> Result<i64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::RESERVATION_TTL_SECS, "1800")?;
        Ok(value.parse::<i64>().unwrap_or(1800))
    }

    /// 并发冲突重试上限，同步读取
    pub fn conflict_max_retries(&self) -> Result<u32, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::CONFLICT_MAX_RETRIES, "3")?;
        Ok(value.parse::<u32>().unwrap_or(3))
    }
}

// ==========================================
// FulfillmentConfigReader Trait 实现
// ==========================================
#[async_trait]
impl FulfillmentConfigReader for ConfigManager {
    async fn get_reservation_ttl_secs(&self) -> Result<i64, Box<dyn Error>> {
        self.reservation_ttl_secs()
    }

    async fn get_conflict_max_retries(&self) -> Result<u32, Box<dyn Error>> {
        self.conflict_max_retries()
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 预留
    pub const RESERVATION_TTL_SECS: &str = "reservation_ttl_secs";

    // 并发控制
    pub const CONFLICT_MAX_RETRIES: &str = "conflict_max_retries";
}
