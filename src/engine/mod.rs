// ==========================================
// 工单 WIP 余料核对 - 引擎层
// ==========================================
// 职责: 余料计算、关闭/停止拦截、退料并关闭编排、状态变更
// 红线: Engine 不拼 SQL（库存流水的 SQLite 实现除外，只调用仓储函数）
// ==========================================

pub mod close_guard;
pub mod error;
pub mod excess;
pub mod orchestrator;
pub mod status_change;
pub mod stock_ledger;

// 重导出核心引擎
pub use close_guard::CloseGuard;
pub use error::{ReconcileError, ReconcileResult};
pub use excess::{ExcessCalculator, ExcessItem};
pub use orchestrator::{ReconciliationResult, ReturnAndCloseOrchestrator};
pub use status_change::{StatusChange, WorkOrderStatusService};
pub use stock_ledger::{StockLedger, StockLedgerError};
