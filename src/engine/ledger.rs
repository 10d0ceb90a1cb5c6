// ==========================================
// 制造运营平台 - 库存账本
// ==========================================
// 职责: 在库/可用量口径的唯一出口
// 口径: available = max(0, on_hand - Σ(活跃预留))
// 红线: 材料未知与数量非法在此定性，仓储只报数
// ==========================================

use crate::domain::material::InventorySnapshotRow;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::material_repo::StockBalanceRepository;
use chrono::Utc;
use std::sync::Arc;

pub struct StockLedger {
    balance_repo: Arc<StockBalanceRepository>,
}

impl StockLedger {
    pub fn new(balance_repo: Arc<StockBalanceRepository>) -> Self {
        Self { balance_repo }
    }

    /// 在库数量
    pub fn on_hand(&self, material_id: &str) -> EngineResult<i64> {
        self.balance_repo
            .get_on_hand(material_id)?
            .ok_or_else(|| EngineError::NotFound {
                entity: "材料库存".to_string(),
                id: material_id.to_string(),
            })
    }

    /// 可用数量（夹到 >= 0，不向调用方暴露负敞口）
    pub fn available(&self, material_id: &str) -> EngineResult<i64> {
        let now = Utc::now();
        let (on_hand, reserved) = self
            .balance_repo
            .availability(material_id, now)?
            .ok_or_else(|| EngineError::NotFound {
                entity: "材料库存".to_string(),
                id: material_id.to_string(),
            })?;
        Ok((on_hand - reserved).max(0))
    }

    /// 贷记库存（完工入库走状态机的原子路径，此处供外部收货使用）
    ///
    /// # 返回
    /// - Ok(new_on_hand): 贷记后的在库数量
    pub fn credit(&self, material_id: &str, qty: i64) -> EngineResult<i64> {
        if qty <= 0 {
            return Err(EngineError::InvalidQuantity(qty));
        }

        let new_on_hand = self.balance_repo.credit(material_id, qty, Utc::now())?;
        tracing::info!(
            material_id = %material_id,
            qty = qty,
            new_on_hand = new_on_hand,
            "库存贷记完成"
        );
        Ok(new_on_hand)
    }

    /// 全量库存快照（在库/预留/可用）
    pub fn snapshot(&self) -> EngineResult<Vec<InventorySnapshotRow>> {
        Ok(self.balance_repo.snapshot_all(Utc::now())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use rusqlite::Connection;
    use std::sync::Mutex;

    fn ledger_with_stock(material_id: &str, on_hand: i64) -> StockLedger {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO material_master (material_id, name, unit, created_at, updated_at)
             VALUES (?1, ?1, 'PCS', '2026-01-01T00:00:00+00:00', '2026-01-01T00:00:00+00:00')",
            rusqlite::params![material_id],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO stock_balance (material_id, on_hand, updated_at)
             VALUES (?1, ?2, '2026-01-01T00:00:00+00:00')",
            rusqlite::params![material_id, on_hand],
        )
        .unwrap();
        let conn = Arc::new(Mutex::new(conn));
        StockLedger::new(Arc::new(StockBalanceRepository::new(conn)))
    }

    #[test]
    fn test_available_equals_on_hand_without_reservations() {
        let ledger = ledger_with_stock("MAT-001", 10);
        assert_eq!(ledger.on_hand("MAT-001").unwrap(), 10);
        assert_eq!(ledger.available("MAT-001").unwrap(), 10);
    }

    #[test]
    fn test_credit_rejects_non_positive_qty() {
        let ledger = ledger_with_stock("MAT-001", 10);
        assert!(matches!(
            ledger.credit("MAT-001", 0),
            Err(EngineError::InvalidQuantity(0))
        ));
        assert!(matches!(
            ledger.credit("MAT-001", -5),
            Err(EngineError::InvalidQuantity(-5))
        ));
    }

    #[test]
    fn test_credit_increases_on_hand() {
        let ledger = ledger_with_stock("MAT-001", 10);
        assert_eq!(ledger.credit("MAT-001", 7).unwrap(), 17);
        assert_eq!(ledger.on_hand("MAT-001").unwrap(), 17);
    }

    #[test]
    fn test_unknown_material_is_not_found() {
        let ledger = ledger_with_stock("MAT-001", 10);
        assert!(matches!(
            ledger.available("MAT-404"),
            Err(EngineError::NotFound { .. })
        ));
    }
}
