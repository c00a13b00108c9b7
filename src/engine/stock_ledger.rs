// ==========================================
// 工单 WIP 余料核对 - 库存流水服务
// ==========================================
// Engine 层定义 trait，编排器只依赖 trait
// SQLite 实现: StockLedgerRepository（在调用方工作单元内、SAVEPOINT 保护下写入）
// ==========================================

use crate::config::ConfigManager;
use crate::domain::stock_entry::{
    ReturnLine, ReturnTransaction, ReturnTransactionDraft, DOCSTATUS_SUBMITTED,
    PURPOSE_MATERIAL_RETURN,
};
use crate::repository::error::RepositoryError;
use crate::repository::stock_ledger_repo::{bin_qty_on, insert_return_on, unreturned_qty_on};
use crate::repository::{StockLedgerRepository, WorkOrderUnit};
use rusqlite::Connection;
use thiserror::Error;
use tracing::{debug, info};

/// 数量比较的浮点误差
const QTY_EPSILON: f64 = 1e-9;

const SAVEPOINT: &str = "stock_return";

/// 库存流水错误
#[derive(Error, Debug)]
pub enum StockLedgerError {
    #[error("退料单没有明细")]
    EmptyTransaction,

    #[error("第{line}行 ({item_code}) 被拒绝: {reason}")]
    LineRejected {
        line: usize,
        item_code: String,
        reason: String,
    },

    #[error("仓库 {warehouse} 物料 {item_code} 结存不足: 需要 {required}, 可用 {available}")]
    InsufficientBalance {
        item_code: String,
        warehouse: String,
        required: f64,
        available: f64,
    },

    #[error("物料 {item_code} 的未退数量已变化: 预期 {expected}, 当前 {actual}")]
    QuantityChanged {
        item_code: String,
        expected: f64,
        actual: f64,
    },

    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

// ==========================================
// StockLedger - 库存流水服务 Trait
// ==========================================
pub trait StockLedger: Send + Sync {
    /// 在工作单元内提交退料单
    ///
    /// # 返回
    /// - `Ok(ReturnTransaction)`: 已提交（随工作单元一同 commit）
    /// - `Err(...)`: 结构化失败，未留下任何部分写入
    fn submit_material_return(
        &self,
        unit: &WorkOrderUnit<'_>,
        draft: &ReturnTransactionDraft,
    ) -> Result<ReturnTransaction, StockLedgerError>;
}

impl StockLedger for StockLedgerRepository {
    fn submit_material_return(
        &self,
        unit: &WorkOrderUnit<'_>,
        draft: &ReturnTransactionDraft,
    ) -> Result<ReturnTransaction, StockLedgerError> {
        if draft.lines.is_empty() {
            return Err(StockLedgerError::EmptyTransaction);
        }

        let conn = unit.connection();
        conn.execute_batch(&format!("SAVEPOINT {}", SAVEPOINT))
            .map_err(RepositoryError::from)?;

        match post_return(conn, draft) {
            Ok(entry) => {
                conn.execute_batch(&format!("RELEASE {}", SAVEPOINT))
                    .map_err(RepositoryError::from)?;
                info!(
                    work_order_id = %entry.work_order_id,
                    stock_entry = %entry.name,
                    lines = entry.lines.len(),
                    total_qty = entry.total_qty,
                    "退料单已提交"
                );
                Ok(entry)
            }
            Err(e) => {
                if let Err(rb) =
                    conn.execute_batch(&format!("ROLLBACK TO {0}; RELEASE {0}", SAVEPOINT))
                {
                    tracing::warn!(error = %rb, "退料单保存点回滚失败");
                }
                Err(e)
            }
        }
    }
}

fn post_return(
    conn: &Connection,
    draft: &ReturnTransactionDraft,
) -> Result<ReturnTransaction, StockLedgerError> {
    let allow_negative =
        ConfigManager::allow_negative_stock_on(conn).map_err(RepositoryError::from)?;

    for (i, line) in draft.lines.iter().enumerate() {
        validate_line(i + 1, line)?;

        let unreturned = unreturned_qty_on(conn, &draft.work_order_id, line.item_idx)?
            .ok_or_else(|| StockLedgerError::LineRejected {
                line: i + 1,
                item_code: line.item_code.clone(),
                reason: format!("工单 {} 无第{}行明细", draft.work_order_id, line.item_idx),
            })?;
        if line.qty > unreturned + QTY_EPSILON {
            return Err(StockLedgerError::QuantityChanged {
                item_code: line.item_code.clone(),
                expected: line.qty,
                actual: unreturned,
            });
        }

        if !allow_negative {
            let available = bin_qty_on(conn, &line.from_warehouse, &line.item_code)?;
            debug!(
                item_code = %line.item_code,
                warehouse = %line.from_warehouse,
                available,
                required = line.qty,
                "校验 WIP 结存"
            );
            if available + QTY_EPSILON < line.qty {
                return Err(StockLedgerError::InsufficientBalance {
                    item_code: line.item_code.clone(),
                    warehouse: line.from_warehouse.clone(),
                    required: line.qty,
                    available,
                });
            }
        }
    }

    let entry = ReturnTransaction {
        name: ReturnTransaction::new_name(),
        purpose: PURPOSE_MATERIAL_RETURN.to_string(),
        work_order_id: draft.work_order_id.clone(),
        docstatus: DOCSTATUS_SUBMITTED.to_string(),
        total_qty: draft.total_qty(),
        posted_at: chrono::Local::now().naive_local(),
        created_by: draft.created_by.clone(),
        lines: draft.lines.clone(),
    };
    insert_return_on(conn, &entry)?;
    Ok(entry)
}

fn validate_line(line_no: usize, line: &ReturnLine) -> Result<(), StockLedgerError> {
    let reject = |reason: &str| StockLedgerError::LineRejected {
        line: line_no,
        item_code: line.item_code.clone(),
        reason: reason.to_string(),
    };

    if !line.qty.is_finite() || line.qty <= 0.0 {
        return Err(reject("数量必须为正数"));
    }
    if line.to_warehouse.trim().is_empty() {
        return Err(reject("未指定目标仓库"));
    }
    if line.from_warehouse.trim().is_empty() {
        return Err(reject("未指定来源仓库"));
    }
    if line.from_warehouse == line.to_warehouse {
        return Err(reject("来源仓库与目标仓库相同"));
    }
    Ok(())
}
