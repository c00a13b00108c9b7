// ==========================================
// 工单 WIP 余料核对 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、状态流转规则
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod stock_entry;
pub mod types;
pub mod work_order;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use stock_entry::{ReturnLine, ReturnTransaction, ReturnTransactionDraft};
pub use types::{ReconciliationStatus, StatusAction, WorkOrderStatus};
pub use work_order::{WorkOrder, WorkOrderItem};
