// ==========================================
// 制造运营平台 - 引擎层
// ==========================================
// 职责: 库存账本、预留、缺口解析、任务状态机、履约编排
// 红线: 不拼 SQL（事务性数据操作下沉仓储层）
// ==========================================

pub mod error;
pub mod events;
pub mod fulfillment;
pub mod ledger;
pub mod production;
pub mod reservation;
pub mod shortage;

pub use error::{EngineError, EngineResult};
pub use events::{NoOpCompletionListener, ProductionCompletedEvent, ProductionCompletionListener};
pub use fulfillment::{CancelOutcome, FulfillmentCoordinator, SubmitOutcome, SYSTEM_ACTOR};
pub use ledger::StockLedger;
pub use production::{legal_sources, transition, ProductionTaskStateMachine};
pub use reservation::{ReservationManager, DEFAULT_MAX_RETRIES};
pub use shortage::{Resolution, ShortageResolver};
