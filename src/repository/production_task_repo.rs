// ==========================================
// 制造运营平台 - 生产任务仓储
// ==========================================
// 红线: 状态迁移一律走带守卫条件的 UPDATE（WHERE status IN ...），
//       0 行命中即输掉了并发竞争，由调用方重查后定性
// 红线: 守卫的合法来源状态由引擎层状态机迁移表给出，本层不自定
// 红线: 完工贷记与状态落库必须在同一事务，杜绝部分完工
// ==========================================

use crate::domain::production::{NewProductionTask, ProductionTask};
use crate::domain::types::TaskStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::material_repo::{parse_ts, parse_ts_opt};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result as SqliteResult};
use std::sync::{Arc, Mutex};

pub struct ProductionTaskRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductionTaskRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建生产任务（状态 PENDING），返回数据库分配的 task_id
    pub fn insert(&self, task: &NewProductionTask, now: DateTime<Utc>) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO production_task
                (order_id, order_item_id, material_id, qty_to_produce,
                 status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
            params![
                task.order_id,
                task.order_item_id,
                task.material_id,
                task.qty_to_produce,
                TaskStatus::Pending.to_db_str(),
                now.to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 按任务 ID 查询
    pub fn find_by_id(&self, task_id: i64) -> RepositoryResult<Option<ProductionTask>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM production_task WHERE task_id = ?1",
            SELECT_COLUMNS
        ))?;

        let result = stmt.query_row(params![task_id], Self::map_row);

        match result {
            Ok(task) => Ok(Some(task)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 任务列表（可按状态过滤），按 task_id 升序
    pub fn list(&self, status: Option<TaskStatus>) -> RepositoryResult<Vec<ProductionTask>> {
        let conn = self.get_conn()?;
        match status {
            Some(s) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM production_task WHERE status = ?1 ORDER BY task_id",
                    SELECT_COLUMNS
                ))?;
                let rows = stmt.query_map(params![s.to_db_str()], Self::map_row)?;
                Ok(rows.collect::<SqliteResult<Vec<_>>>()?)
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM production_task ORDER BY task_id",
                    SELECT_COLUMNS
                ))?;
                let rows = stmt.query_map([], Self::map_row)?;
                Ok(rows.collect::<SqliteResult<Vec<_>>>()?)
            }
        }
    }

    /// 订单名下的全部任务，按 task_id 升序
    pub fn list_by_order(&self, order_id: &str) -> RepositoryResult<Vec<ProductionTask>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM production_task WHERE order_id = ?1 ORDER BY task_id",
            SELECT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![order_id], Self::map_row)?;
        Ok(rows.collect::<SqliteResult<Vec<_>>>()?)
    }

    /// 订单名下的未完结任务（PENDING / IN_PROGRESS），按 task_id 升序
    pub fn list_open_by_order(&self, order_id: &str) -> RepositoryResult<Vec<ProductionTask>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM production_task
             WHERE order_id = ?1 AND status IN ('PENDING', 'IN_PROGRESS')
             ORDER BY task_id",
            SELECT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![order_id], Self::map_row)?;
        Ok(rows.collect::<SqliteResult<Vec<_>>>()?)
    }

    /// 订单是否还有未完结任务（状态派生用）
    pub fn has_open_tasks(&self, order_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM production_task
             WHERE order_id = ?1 AND status IN ('PENDING', 'IN_PROGRESS')",
            params![order_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// 行项目名下未完结任务的待产合计（幂等重解析的台账之一）
    pub fn open_qty_for_item(&self, order_item_id: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let total: i64 = conn.query_row(
            "SELECT COALESCE(SUM(qty_to_produce), 0) FROM production_task
             WHERE order_item_id = ?1 AND status IN ('PENDING', 'IN_PROGRESS')",
            params![order_item_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// 行项目名下已完工任务的产量合计
    pub fn completed_qty_for_item(&self, order_item_id: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let total: i64 = conn.query_row(
            "SELECT COALESCE(SUM(qty_to_produce), 0) FROM production_task
             WHERE order_item_id = ?1 AND status = 'COMPLETED'",
            params![order_item_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// 守卫式开工: PENDING -> IN_PROGRESS
    ///
    /// # 返回
    /// - Ok(true): 迁移成功
    /// - Ok(false): 守卫未命中（任务不存在或状态不是 PENDING）
    pub fn start(
        &self,
        task_id: i64,
        now: DateTime<Utc>,
        allowed_from: &[TaskStatus],
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            &format!(
                "UPDATE production_task
                 SET status = 'IN_PROGRESS', started_at = ?2, updated_at = ?2
                 WHERE task_id = ?1 AND status IN ({})",
                status_in_clause(allowed_from)
            ),
            params![task_id, now.to_rfc3339()],
        )?;
        Ok(rows > 0)
    }

    /// 守卫式完工 + 库存贷记（单事务）
    ///
    /// # 返回
    /// - Ok(Some(task)): 迁移成功，库存已贷记，返回完工后的任务
    /// - Ok(None): 守卫未命中（任务不存在或状态已终结），库存未动
    ///
    /// # 说明
    /// - 允许 PENDING 直接完工（跳过开工登记的短流程）
    /// - 状态 UPDATE 与 stock_balance 贷记在同一事务内提交
    pub fn complete_and_credit(
        &self,
        task_id: i64,
        now: DateTime<Utc>,
        allowed_from: &[TaskStatus],
    ) -> RepositoryResult<Option<ProductionTask>> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let now_str = now.to_rfc3339();

        let rows = tx.execute(
            &format!(
                "UPDATE production_task
                 SET status = 'COMPLETED', completed_at = ?2, updated_at = ?2
                 WHERE task_id = ?1 AND status IN ({})",
                status_in_clause(allowed_from)
            ),
            params![task_id, now_str],
        )?;

        if rows == 0 {
            return Ok(None);
        }

        let task = tx.query_row(
            &format!(
                "SELECT {} FROM production_task WHERE task_id = ?1",
                SELECT_COLUMNS
            ),
            params![task_id],
            Self::map_row,
        )?;

        let credited = tx.execute(
            "UPDATE stock_balance SET on_hand = on_hand + ?2, updated_at = ?3
             WHERE material_id = ?1",
            params![task.material_id, task.qty_to_produce, now_str],
        )?;
        if credited == 0 {
            return Err(RepositoryError::NotFound {
                entity: "StockBalance".to_string(),
                id: task.material_id.clone(),
            });
        }

        tx.commit()?;
        Ok(Some(task))
    }

    /// 守卫式取消: PENDING / IN_PROGRESS -> CANCELLED，不触碰库存
    ///
    /// # 返回
    /// - Ok(true): 迁移成功
    /// - Ok(false): 守卫未命中
    pub fn cancel(
        &self,
        task_id: i64,
        now: DateTime<Utc>,
        allowed_from: &[TaskStatus],
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            &format!(
                "UPDATE production_task
                 SET status = 'CANCELLED', cancelled_at = ?2, updated_at = ?2
                 WHERE task_id = ?1 AND status IN ({})",
                status_in_clause(allowed_from)
            ),
            params![task_id, now.to_rfc3339()],
        )?;
        Ok(rows > 0)
    }

    fn map_row(row: &rusqlite::Row) -> SqliteResult<ProductionTask> {
        let status_str: String = row.get(5)?;
        Ok(ProductionTask {
            task_id: row.get(0)?,
            order_id: row.get(1)?,
            order_item_id: row.get(2)?,
            material_id: row.get(3)?,
            qty_to_produce: row.get(4)?,
            status: TaskStatus::from_db_str(&status_str).unwrap_or(TaskStatus::Pending),
            created_at: parse_ts(&row.get::<_, String>(6)?),
            started_at: parse_ts_opt(row.get(7)?),
            completed_at: parse_ts_opt(row.get(8)?),
            cancelled_at: parse_ts_opt(row.get(9)?),
            updated_at: parse_ts(&row.get::<_, String>(10)?),
        })
    }
}

const SELECT_COLUMNS: &str = "task_id, order_id, order_item_id, material_id, qty_to_produce, \
                              status, created_at, started_at, completed_at, cancelled_at, updated_at";

// 守卫来源是闭合枚举的 to_db_str，拼接安全
fn status_in_clause(statuses: &[TaskStatus]) -> String {
    statuses
        .iter()
        .map(|s| format!("'{}'", s.to_db_str()))
        .collect::<Vec<_>>()
        .join(", ")
}
