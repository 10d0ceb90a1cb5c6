// ==========================================
// 制造运营平台 - 订单/订单行仓储
// ==========================================
// 红线: 订单头与订单行必须在同一事务写入，绝不落半个订单
// 红线: qty_reserved_from_stock 只由解析流程改写
// ==========================================

use crate::domain::order::{CustomerOrder, OrderItem};
use crate::domain::types::{OrderStatus, ShortageAction};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::material_repo::parse_ts;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result as SqliteResult};
use std::sync::{Arc, Mutex};

// ==========================================
// OrderRepository - 订单头仓储
// ==========================================
pub struct OrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OrderRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 订单头 + 全部订单行，单事务写入
    pub fn insert_with_items(
        &self,
        order: &CustomerOrder,
        items: &[OrderItem],
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            r#"
            INSERT INTO customer_order (order_id, status, source, customer_name, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                order.order_id,
                order.status.to_db_str(),
                order.source,
                order.customer_name,
                order.created_at.to_rfc3339(),
                order.updated_at.to_rfc3339(),
            ],
        )?;

        for item in items {
            tx.execute(
                r#"
                INSERT INTO order_item
                    (order_item_id, order_id, material_id, quantity, unit_price,
                     shortage_action, qty_reserved_from_stock, item_description, color,
                     created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
                params![
                    item.order_item_id,
                    item.order_id,
                    item.material_id,
                    item.quantity,
                    item.unit_price,
                    item.shortage_action.to_db_str(),
                    item.qty_reserved_from_stock,
                    item.item_description,
                    item.color,
                    item.created_at.to_rfc3339(),
                    item.updated_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// 按订单号查询
    pub fn find_by_id(&self, order_id: &str) -> RepositoryResult<Option<CustomerOrder>> {
        let conn = self.get_conn()?;
        let result = conn.query_row(
            "SELECT order_id, status, source, customer_name, created_at, updated_at
             FROM customer_order WHERE order_id = ?1",
            params![order_id],
            Self::map_row,
        );

        match result {
            Ok(order) => Ok(Some(order)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 更新订单状态
    ///
    /// # 返回
    /// - Ok(true): 更新了一行
    /// - Ok(false): 订单不存在
    pub fn update_status(
        &self,
        order_id: &str,
        status: OrderStatus,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE customer_order SET status = ?2, updated_at = ?3 WHERE order_id = ?1",
            params![order_id, status.to_db_str(), now.to_rfc3339()],
        )?;
        Ok(rows > 0)
    }

    /// 订单列表，按创建时间倒序
    pub fn list_all(&self) -> RepositoryResult<Vec<CustomerOrder>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT order_id, status, source, customer_name, created_at, updated_at
             FROM customer_order ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], Self::map_row)?;
        Ok(rows.collect::<SqliteResult<Vec<_>>>()?)
    }

    fn map_row(row: &rusqlite::Row) -> SqliteResult<CustomerOrder> {
        let status_str: String = row.get(1)?;
        Ok(CustomerOrder {
            order_id: row.get(0)?,
            status: OrderStatus::from_db_str(&status_str).unwrap_or(OrderStatus::Received),
            source: row.get(2)?,
            customer_name: row.get(3)?,
            created_at: parse_ts(&row.get::<_, String>(4)?),
            updated_at: parse_ts(&row.get::<_, String>(5)?),
        })
    }
}

// ==========================================
// OrderItemRepository - 订单行仓储
// ==========================================
pub struct OrderItemRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OrderItemRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 按行 ID 查询
    pub fn find_by_id(&self, order_item_id: &str) -> RepositoryResult<Option<OrderItem>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM order_item WHERE order_item_id = ?1",
            SELECT_COLUMNS
        ))?;

        let result = stmt.query_row(params![order_item_id], Self::map_row);

        match result {
            Ok(item) => Ok(Some(item)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 订单名下全部订单行，按创建顺序
    pub fn list_by_order(&self, order_id: &str) -> RepositoryResult<Vec<OrderItem>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM order_item WHERE order_id = ?1 ORDER BY created_at, order_item_id",
            SELECT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![order_id], Self::map_row)?;
        Ok(rows.collect::<SqliteResult<Vec<_>>>()?)
    }

    /// 改写已预留数量（解析落账）
    pub fn update_reserved_qty(
        &self,
        order_item_id: &str,
        qty_reserved_from_stock: i64,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE order_item SET qty_reserved_from_stock = ?2, updated_at = ?3
             WHERE order_item_id = ?1",
            params![order_item_id, qty_reserved_from_stock, now.to_rfc3339()],
        )?;
        Ok(rows > 0)
    }

    /// 某材料下未覆盖满的订单行（quantity > 活跃预留 + 未完结/已完工任务合计）
    ///
    /// 覆盖量只认活跃预留（expires_at > now），落账列可能滞后于过期，
    /// 失效持有的行在此重新暴露为等待行
    ///
    /// 排序规则: 按行关联的最小 task_id 升序（先创建先受益，含已取消
    /// 任务，保证排序确定），无任务的行排最后；已取消订单的行不参与
    pub fn list_waiting_by_material(
        &self,
        material_id: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<OrderItem>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {},
                COALESCE(SUM(CASE WHEN pt.status IN ('PENDING', 'IN_PROGRESS', 'COMPLETED')
                                  THEN pt.qty_to_produce ELSE 0 END), 0) AS covered_by_tasks,
                MIN(pt.task_id) AS first_task_id,
                COALESCE((SELECT SUM(r.qty) FROM reservation r
                          WHERE r.order_item_id = oi.order_item_id
                            AND r.expires_at > ?2), 0) AS active_reserved
            FROM order_item oi
            JOIN customer_order co ON co.order_id = oi.order_id
                AND co.status != 'CANCELLED'
            LEFT JOIN production_task pt ON pt.order_item_id = oi.order_item_id
            WHERE oi.material_id = ?1
            GROUP BY oi.order_item_id
            HAVING oi.quantity > active_reserved + covered_by_tasks
            ORDER BY COALESCE(first_task_id, 9223372036854775807), oi.created_at, oi.order_item_id
            "#,
            SELECT_COLUMNS_QUALIFIED
        ))?;
        let rows = stmt.query_map(params![material_id, now.to_rfc3339()], Self::map_row)?;
        Ok(rows.collect::<SqliteResult<Vec<_>>>()?)
    }

    fn map_row(row: &rusqlite::Row) -> SqliteResult<OrderItem> {
        let action_str: String = row.get(5)?;
        Ok(OrderItem {
            order_item_id: row.get(0)?,
            order_id: row.get(1)?,
            material_id: row.get(2)?,
            quantity: row.get(3)?,
            unit_price: row.get(4)?,
            shortage_action: ShortageAction::from_db_str(&action_str)
                .unwrap_or(ShortageAction::Produce),
            qty_reserved_from_stock: row.get(6)?,
            item_description: row.get(7)?,
            color: row.get(8)?,
            created_at: parse_ts(&row.get::<_, String>(9)?),
            updated_at: parse_ts(&row.get::<_, String>(10)?),
        })
    }
}

const SELECT_COLUMNS: &str = "order_item_id, order_id, material_id, quantity, unit_price, \
                              shortage_action, qty_reserved_from_stock, item_description, color, \
                              created_at, updated_at";

const SELECT_COLUMNS_QUALIFIED: &str =
    "oi.order_item_id, oi.order_id, oi.material_id, oi.quantity, oi.unit_price, \
     oi.shortage_action, oi.qty_reserved_from_stock, oi.item_description, oi.color, \
     oi.created_at, oi.updated_at";
