// ==========================================
// 制造运营平台 - 材料/库存仓储
// ==========================================
// 红线: Repository 不做业务逻辑，只做数据映射
// 红线: stock_balance 唯一事实层，写入必须走事务
// ==========================================

use crate::domain::material::{InventorySnapshotRow, Material, StockBalance};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result as SqliteResult};
use std::sync::{Arc, Mutex};

// ==========================================
// MaterialRepository - 材料主数据仓储
// ==========================================
// 用途: 种子/外部系统写入，核心只读
pub struct MaterialRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MaterialRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入材料主数据（upsert 语义，供种子与测试使用）
    pub fn upsert(&self, material: &Material) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO material_master (material_id, name, unit, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(material_id) DO UPDATE SET
                name = excluded.name,
                unit = excluded.unit,
                updated_at = excluded.updated_at
            "#,
            params![
                material.material_id,
                material.name,
                material.unit,
                material.created_at.to_rfc3339(),
                material.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// 按 material_id 查询材料
    pub fn find_by_id(&self, material_id: &str) -> RepositoryResult<Option<Material>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT material_id, name, unit, created_at, updated_at
             FROM material_master WHERE material_id = ?1",
        )?;

        let result = stmt.query_row(params![material_id], Self::map_row);

        match result {
            Ok(material) => Ok(Some(material)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 材料是否存在
    pub fn exists(&self, material_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM material_master WHERE material_id = ?1",
            params![material_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// 查询全部材料（按 material_id 排序）
    pub fn list_all(&self) -> RepositoryResult<Vec<Material>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT material_id, name, unit, created_at, updated_at
             FROM material_master ORDER BY material_id",
        )?;
        let rows = stmt.query_map([], Self::map_row)?;
        Ok(rows.collect::<SqliteResult<Vec<_>>>()?)
    }

    fn map_row(row: &rusqlite::Row) -> SqliteResult<Material> {
        Ok(Material {
            material_id: row.get(0)?,
            name: row.get(1)?,
            unit: row.get(2)?,
            created_at: parse_ts(&row.get::<_, String>(3)?),
            updated_at: parse_ts(&row.get::<_, String>(4)?),
        })
    }
}

// ==========================================
// StockBalanceRepository - 库存余额仓储
// ==========================================
// 所有写入都在事务内完成读-改-写，防止并发贷记下的丢失更新
pub struct StockBalanceRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StockBalanceRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入/覆盖库存余额（供种子与测试使用）
    pub fn upsert(&self, material_id: &str, on_hand: i64, now: DateTime<Utc>) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO stock_balance (material_id, on_hand, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(material_id) DO UPDATE SET
                on_hand = excluded.on_hand,
                updated_at = excluded.updated_at
            "#,
            params![material_id, on_hand, now.to_rfc3339()],
        )?;
        Ok(())
    }

    /// 查询在库数量
    pub fn get_on_hand(&self, material_id: &str) -> RepositoryResult<Option<i64>> {
        let conn = self.get_conn()?;
        let result = conn.query_row(
            "SELECT on_hand FROM stock_balance WHERE material_id = ?1",
            params![material_id],
            |row| row.get::<_, i64>(0),
        );

        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 贷记库存（完工入库/外部收货）
    ///
    /// # 返回
    /// - Ok(new_on_hand): 贷记后的在库数量
    /// - Err(NotFound): 余额行不存在
    ///
    /// # 说明
    /// - 数量合法性（qty > 0）由账本（engine/ledger.rs）校验
    /// - UPDATE + SELECT 在同一事务内，杜绝并发贷记的丢失更新
    pub fn credit(&self, material_id: &str, qty: i64, now: DateTime<Utc>) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let rows = tx.execute(
            "UPDATE stock_balance SET on_hand = on_hand + ?2, updated_at = ?3
             WHERE material_id = ?1",
            params![material_id, qty, now.to_rfc3339()],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "StockBalance".to_string(),
                id: material_id.to_string(),
            });
        }

        let new_on_hand: i64 = tx.query_row(
            "SELECT on_hand FROM stock_balance WHERE material_id = ?1",
            params![material_id],
            |row| row.get(0),
        )?;

        tx.commit()?;
        Ok(new_on_hand)
    }

    /// 查询在库与活跃预留合计（单条 SELECT，读一致）
    ///
    /// # 返回
    /// - Ok(Some((on_hand, reserved))): 余额行存在
    /// - Ok(None): 材料没有余额行
    ///
    /// # 说明
    /// - 活跃预留用谓词 expires_at > now 过滤，
    ///   过期行即使尚未被清扫也不计入（过期即不存在）
    pub fn availability(
        &self,
        material_id: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<(i64, i64)>> {
        let conn = self.get_conn()?;
        let result = conn.query_row(
            r#"
            SELECT
                sb.on_hand,
                COALESCE((
                    SELECT SUM(r.qty) FROM reservation r
                    WHERE r.material_id = sb.material_id
                      AND r.expires_at > ?2
                ), 0) AS reserved
            FROM stock_balance sb
            WHERE sb.material_id = ?1
            "#,
            params![material_id, now.to_rfc3339()],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        );

        match result {
            Ok(pair) => Ok(Some(pair)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询单个材料的余额
    pub fn find_by_id(&self, material_id: &str) -> RepositoryResult<Option<StockBalance>> {
        let conn = self.get_conn()?;
        let result = conn.query_row(
            "SELECT material_id, on_hand, updated_at FROM stock_balance WHERE material_id = ?1",
            params![material_id],
            |row| {
                Ok(StockBalance {
                    material_id: row.get(0)?,
                    on_hand: row.get(1)?,
                    updated_at: parse_ts(&row.get::<_, String>(2)?),
                })
            },
        );

        match result {
            Ok(balance) => Ok(Some(balance)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 全量库存快照（在库/活跃预留/可用），按材料号排序
    ///
    /// 说明: available 在 SQL 中夹到 >= 0，对外不暴露负数
    pub fn snapshot_all(&self, now: DateTime<Utc>) -> RepositoryResult<Vec<InventorySnapshotRow>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT
                mm.material_id,
                mm.name,
                mm.unit,
                COALESCE(sb.on_hand, 0) AS on_hand,
                COALESCE((
                    SELECT SUM(r.qty) FROM reservation r
                    WHERE r.material_id = mm.material_id
                      AND r.expires_at > ?1
                ), 0) AS reserved,
                MAX(0, COALESCE(sb.on_hand, 0) - COALESCE((
                    SELECT SUM(r.qty) FROM reservation r
                    WHERE r.material_id = mm.material_id
                      AND r.expires_at > ?1
                ), 0)) AS available
            FROM material_master mm
            LEFT JOIN stock_balance sb ON sb.material_id = mm.material_id
            ORDER BY mm.material_id
            "#,
        )?;

        let rows = stmt.query_map(params![now.to_rfc3339()], |row| {
            Ok(InventorySnapshotRow {
                material_id: row.get(0)?,
                material_name: row.get(1)?,
                unit: row.get(2)?,
                on_hand: row.get(3)?,
                reserved: row.get(4)?,
                available: row.get(5)?,
            })
        })?;

        Ok(rows.collect::<SqliteResult<Vec<_>>>()?)
    }
}

/// 辅助方法: RFC3339 时间戳解析（解析失败回退当前时间）
pub(crate) fn parse_ts(s: &str) -> DateTime<Utc> {
    s.parse::<DateTime<Utc>>().unwrap_or_else(|_| Utc::now())
}

/// 辅助方法: 可空时间戳解析
pub(crate) fn parse_ts_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|v| v.parse::<DateTime<Utc>>().ok())
}
