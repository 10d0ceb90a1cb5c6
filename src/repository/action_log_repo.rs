// ==========================================
// 制造运营平台 - 操作日志仓储
// ==========================================
// 追加写审计流水，记录失败只告警不阻断主流程

use crate::domain::action_log::ActionLog;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Result as SqliteResult};
use std::sync::{Arc, Mutex};

pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 追加一条操作流水
    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO action_log
                (action_id, action_type, action_ts, actor, payload_json,
                 impact_summary_json, order_id, material_id, detail)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                log.action_id,
                log.action_type,
                log.action_ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                log.actor,
                log.payload_json.as_ref().map(|v| v.to_string()),
                log.impact_summary_json.as_ref().map(|v| v.to_string()),
                log.order_id,
                log.material_id,
                log.detail,
            ],
        )?;
        Ok(())
    }

    /// 最近 N 条流水（时间倒序）
    pub fn list_recent(&self, limit: i64) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT action_id, action_type, action_ts, actor, payload_json,
                    impact_summary_json, order_id, material_id, detail
             FROM action_log
             ORDER BY action_ts DESC, action_id DESC
             LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit], |row| {
            let ts_str: String = row.get(2)?;
            let payload: Option<String> = row.get(4)?;
            let impact: Option<String> = row.get(5)?;
            Ok(ActionLog {
                action_id: row.get(0)?,
                action_type: row.get(1)?,
                action_ts: chrono::NaiveDateTime::parse_from_str(&ts_str, "%Y-%m-%d %H:%M:%S")
                    .unwrap_or_else(|_| chrono::Utc::now().naive_utc()),
                actor: row.get(3)?,
                payload_json: payload.and_then(|s| serde_json::from_str(&s).ok()),
                impact_summary_json: impact.and_then(|s| serde_json::from_str(&s).ok()),
                order_id: row.get(6)?,
                material_id: row.get(7)?,
                detail: row.get(8)?,
            })
        })?;

        Ok(rows.collect::<SqliteResult<Vec<_>>>()?)
    }
}
