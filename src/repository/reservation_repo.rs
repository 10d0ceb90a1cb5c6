// ==========================================
// 制造运营平台 - 预留仓储
// ==========================================
// 红线: 预留扣减可用量的判定必须与插入在同一事务内，
//       否则并发下会出现超卖
// 红线: 过期预留（expires_at <= now）在任何读取中都视为不存在
// ==========================================

use crate::domain::reservation::{Reservation, ReservationListRow};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::material_repo::parse_ts;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result as SqliteResult};
use std::sync::{Arc, Mutex};

pub struct ReservationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ReservationRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 尝试创建预留（检查可用量 + 插入，单事务）
    ///
    /// # 返回
    /// - Ok(true): 可用量充足，预留已写入
    /// - Ok(false): 可用量不足，未写入任何行
    /// - Err(NotFound): 材料没有余额行
    ///
    /// # 说明
    /// - 事务内先删除该材料的过期预留（惰性清扫），
    ///   再用 on_hand - SUM(活跃预留) 判定可用量
    /// - 充足与否的业务解释（Shortage 错误）由 engine 层负责
    pub fn try_reserve(&self, reservation: &Reservation) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let now_str = reservation.created_at.to_rfc3339();

        tx.execute(
            "DELETE FROM reservation WHERE material_id = ?1 AND expires_at <= ?2",
            params![reservation.material_id, now_str],
        )?;

        let availability = tx.query_row(
            r#"
            SELECT
                sb.on_hand,
                COALESCE((
                    SELECT SUM(r.qty) FROM reservation r
                    WHERE r.material_id = sb.material_id
                ), 0) AS reserved
            FROM stock_balance sb
            WHERE sb.material_id = ?1
            "#,
            params![reservation.material_id],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        );

        let (on_hand, reserved) = match availability {
            Ok(pair) => pair,
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                return Err(RepositoryError::NotFound {
                    entity: "StockBalance".to_string(),
                    id: reservation.material_id.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let available = (on_hand - reserved).max(0);
        if available < reservation.qty {
            // 不回滚也无妨: 过期清扫照样提交
            tx.commit()?;
            return Ok(false);
        }

        tx.execute(
            r#"
            INSERT INTO reservation
                (reservation_id, material_id, order_id, order_item_id, user_id,
                 qty, created_at, updated_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                reservation.reservation_id,
                reservation.material_id,
                reservation.order_id,
                reservation.order_item_id,
                reservation.user_id,
                reservation.qty,
                reservation.created_at.to_rfc3339(),
                reservation.updated_at.to_rfc3339(),
                reservation.expires_at.to_rfc3339(),
            ],
        )?;

        tx.commit()?;
        Ok(true)
    }

    /// 按预留号删除
    ///
    /// # 返回
    /// - Ok(true): 删除了一行
    /// - Ok(false): 该预留不存在（幂等释放依赖此语义）
    pub fn delete(&self, reservation_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM reservation WHERE reservation_id = ?1",
            params![reservation_id],
        )?;
        Ok(rows > 0)
    }

    /// 删除订单名下的全部预留（订单取消时调用），返回删除行数
    pub fn delete_by_order(&self, order_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM reservation WHERE order_id = ?1",
            params![order_id],
        )?;
        Ok(rows)
    }

    /// 查询行项目名下的活跃预留
    pub fn list_active_by_item(
        &self,
        order_item_id: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Reservation>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT reservation_id, material_id, order_id, order_item_id, user_id,
                    qty, created_at, updated_at, expires_at
             FROM reservation
             WHERE order_item_id = ?1 AND expires_at > ?2
             ORDER BY created_at",
        )?;
        let rows = stmt.query_map(params![order_item_id, now.to_rfc3339()], Self::map_row)?;
        Ok(rows.collect::<SqliteResult<Vec<_>>>()?)
    }

    /// 续期行项目名下的活跃预留，返回续期行数
    pub fn refresh_for_item(
        &self,
        order_item_id: &str,
        new_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE reservation SET expires_at = ?2, updated_at = ?3
             WHERE order_item_id = ?1 AND expires_at > ?3",
            params![
                order_item_id,
                new_expires_at.to_rfc3339(),
                now.to_rfc3339()
            ],
        )?;
        Ok(rows)
    }

    /// 材料的活跃预留合计
    pub fn active_total(&self, material_id: &str, now: DateTime<Utc>) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let total: i64 = conn.query_row(
            "SELECT COALESCE(SUM(qty), 0) FROM reservation
             WHERE material_id = ?1 AND expires_at > ?2",
            params![material_id, now.to_rfc3339()],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// 清扫全表过期预留，返回删除行数
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM reservation WHERE expires_at <= ?1",
            params![now.to_rfc3339()],
        )?;
        Ok(rows)
    }

    /// 活跃预留列表（带材料名，供查询接口使用）
    pub fn list_active(&self, now: DateTime<Utc>) -> RepositoryResult<Vec<ReservationListRow>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT r.reservation_id, r.material_id, mm.name, r.order_id,
                   r.user_id, r.qty, r.created_at, r.expires_at
            FROM reservation r
            LEFT JOIN material_master mm ON mm.material_id = r.material_id
            WHERE r.expires_at > ?1
            ORDER BY r.material_id, r.created_at
            "#,
        )?;
        let rows = stmt.query_map(params![now.to_rfc3339()], |row| {
            Ok(ReservationListRow {
                reservation_id: row.get(0)?,
                material_id: row.get(1)?,
                material_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                order_id: row.get(3)?,
                user_id: row.get(4)?,
                qty: row.get(5)?,
                created_at: parse_ts(&row.get::<_, String>(6)?),
                expires_at: parse_ts(&row.get::<_, String>(7)?),
            })
        })?;
        Ok(rows.collect::<SqliteResult<Vec<_>>>()?)
    }

    fn map_row(row: &rusqlite::Row) -> SqliteResult<Reservation> {
        Ok(Reservation {
            reservation_id: row.get(0)?,
            material_id: row.get(1)?,
            order_id: row.get(2)?,
            order_item_id: row.get(3)?,
            user_id: row.get(4)?,
            qty: row.get(5)?,
            created_at: parse_ts(&row.get::<_, String>(6)?),
            updated_at: parse_ts(&row.get::<_, String>(7)?),
            expires_at: parse_ts(&row.get::<_, String>(8)?),
        })
    }
}
