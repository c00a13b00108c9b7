// ==========================================
// 工单 WIP 余料核对 - 退料并关闭编排器
// ==========================================
// 用途: 一键把 WIP 余料退回发料仓并关闭工单
// 流程（单个工作单元内完成）:
// 1. 加载工单（不存在 → NotFound；已关闭 → no_action；非已提交 → InvalidState）
// 2. 余料计算
// 3. 无余料 → 直接关闭
// 4. 有余料 → 生成并提交退料单 → 关闭
// 5. 任一步失败 → 工作单元回滚，工单保持原状态
// ==========================================

use crate::config::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::stock_entry::{ReturnLine, ReturnTransactionDraft};
use crate::domain::types::{ReconciliationStatus, WorkOrderStatus};
use crate::domain::work_order::WorkOrder;
use crate::engine::error::{ReconcileError, ReconcileResult};
use crate::engine::excess::{ExcessCalculator, ExcessItem};
use crate::engine::stock_ledger::StockLedger;
use crate::i18n::{format_qty, t_with_args};
use crate::repository::WorkOrderRepository;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

// ==========================================
// ReconciliationResult - 核对结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub status: ReconciliationStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_returned_qty: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_entry: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ==========================================
// ReturnAndCloseOrchestrator - 退料并关闭编排器
// ==========================================
pub struct ReturnAndCloseOrchestrator {
    work_orders: Arc<WorkOrderRepository>,
    ledger: Arc<dyn StockLedger>,
    config: Arc<ConfigManager>,
}

impl ReturnAndCloseOrchestrator {
    pub fn new(
        work_orders: Arc<WorkOrderRepository>,
        ledger: Arc<dyn StockLedger>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            work_orders,
            ledger,
            config,
        }
    }

    /// 按当前配置构造余料计算器
    ///
    /// 必须在开启工作单元之前调用（工作单元持有共享连接）
    pub fn calculator(&self) -> ReconcileResult<ExcessCalculator> {
        load_calculator(&self.config)
    }

    /// 查询工单当前余料（按钮展示用，不加写锁）
    pub fn preview_excess(&self, work_order_id: &str) -> ReconcileResult<Vec<ExcessItem>> {
        let calculator = self.calculator()?;
        let work_order = self
            .work_orders
            .find_by_id(work_order_id)?
            .ok_or_else(|| ReconcileError::NotFound(work_order_id.to_string()))?;
        Ok(calculator.compute(&work_order.required_items))
    }

    /// 退料并关闭
    ///
    /// # 返回
    /// - returned_and_closed: 已生成退料单并关闭
    /// - closed: 无余料，直接关闭
    /// - no_action: 工单已关闭
    pub fn return_and_close(
        &self,
        work_order_id: &str,
        actor: &str,
    ) -> ReconcileResult<ReconciliationResult> {
        let calculator = self.calculator()?;
        let unit = self.work_orders.begin_unit()?;

        let work_order = unit
            .load_work_order(work_order_id)?
            .ok_or_else(|| ReconcileError::NotFound(work_order_id.to_string()))?;

        if work_order.status == WorkOrderStatus::Closed {
            info!(work_order_id = %work_order_id, "工单已关闭，无需操作");
            return Ok(ReconciliationResult {
                status: ReconciliationStatus::NoAction,
                total_returned_qty: None,
                stock_entry: None,
                message: Some(t_with_args(
                    "reconcile.already_closed",
                    &[("work_order", work_order_id)],
                )),
            });
        }

        if !work_order.status.is_open_submitted() {
            return Err(ReconcileError::InvalidState {
                work_order_id: work_order_id.to_string(),
                status: work_order.status.to_string(),
                reason: t_with_args(
                    "reconcile.not_open",
                    &[("status", work_order.status.to_db_str())],
                ),
            });
        }

        let items = calculator.compute(&work_order.required_items);
        debug!(
            work_order_id = %work_order_id,
            excess_items = items.len(),
            "余料计算完成"
        );

        // ===== 无余料: 直接关闭 =====
        if items.is_empty() {
            unit.transition_status(work_order_id, work_order.status, WorkOrderStatus::Closed)?;
            unit.insert_action_log(
                &ActionLog::new(work_order_id, ActionType::DirectClose, actor).with_payload(json!({
                    "from_status": work_order.status,
                    "to_status": WorkOrderStatus::Closed,
                })),
            )?;
            unit.commit()?;

            info!(work_order_id = %work_order_id, "无余料，工单已直接关闭");
            return Ok(ReconciliationResult {
                status: ReconciliationStatus::Closed,
                total_returned_qty: None,
                stock_entry: None,
                message: Some(t_with_args("reconcile.closed", &[("work_order", work_order_id)])),
            });
        }

        // ===== 有余料: 退料 → 关闭 =====
        let commit_failed = |reason: String| {
            warn!(work_order_id = %work_order_id, reason = %reason, "退料并关闭失败，已回滚");
            ReconcileError::ReturnCommitFailed {
                work_order_id: work_order_id.to_string(),
                reason,
            }
        };

        let draft = build_return_draft(&work_order, &items, actor).map_err(commit_failed)?;
        let entry = self
            .ledger
            .submit_material_return(&unit, &draft)
            .map_err(|e| commit_failed(e.to_string()))?;
        // 明细按未舍入数量移库，对外展示的合计按配置位数舍入
        let total_returned_qty = calculator.tolerance().round(entry.total_qty);

        unit.transition_status(work_order_id, work_order.status, WorkOrderStatus::Closed)
            .map_err(|e| commit_failed(e.to_string()))?;
        unit.insert_action_log(
            &ActionLog::new(work_order_id, ActionType::ReturnAndClose, actor)
                .with_payload(json!({
                    "from_status": work_order.status,
                    "to_status": WorkOrderStatus::Closed,
                    "stock_entry": entry.name,
                    "total_returned_qty": total_returned_qty,
                    "items": items,
                }))
                .with_detail(entry.name.clone()),
        )
        .map_err(|e| commit_failed(e.to_string()))?;
        unit.commit().map_err(|e| commit_failed(e.to_string()))?;

        info!(
            work_order_id = %work_order_id,
            stock_entry = %entry.name,
            total_returned_qty,
            "余料已退回，工单已关闭"
        );

        Ok(ReconciliationResult {
            status: ReconciliationStatus::ReturnedAndClosed,
            total_returned_qty: Some(total_returned_qty),
            message: Some(t_with_args(
                "reconcile.returned_and_closed",
                &[
                    ("work_order", work_order_id),
                    ("stock_entry", &entry.name),
                    ("qty", &format_qty(total_returned_qty)),
                ],
            )),
            stock_entry: Some(entry.name),
        })
    }
}

/// 读取容差配置并构造余料计算器
pub(crate) fn load_calculator(config: &ConfigManager) -> ReconcileResult<ExcessCalculator> {
    let tolerance = config
        .get_excess_tolerance()
        .map_err(|e| ReconcileError::Config(e.to_string()))?;
    Ok(ExcessCalculator::new(tolerance))
}

/// 生成退料单草稿: 每条余料一行，WIP → 明细发料仓，单位不变
fn build_return_draft(
    work_order: &WorkOrder,
    items: &[ExcessItem],
    actor: &str,
) -> Result<ReturnTransactionDraft, String> {
    let mut lines = Vec::with_capacity(items.len());

    for excess in items {
        let source = work_order
            .required_items
            .iter()
            .find(|i| i.idx == excess.idx)
            .and_then(|item| work_order.source_warehouse_for(item))
            .ok_or_else(|| {
                t_with_args(
                    "reconcile.no_source_warehouse",
                    &[("item", &excess.item_code)],
                )
            })?;

        lines.push(ReturnLine {
            item_idx: excess.idx,
            item_code: excess.item_code.clone(),
            qty: excess.return_qty,
            uom: excess.stock_uom.clone(),
            from_warehouse: work_order.wip_warehouse.clone(),
            to_warehouse: source.to_string(),
        });
    }

    Ok(ReturnTransactionDraft {
        work_order_id: work_order.work_order_id.clone(),
        lines,
        created_by: actor.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::work_order::WorkOrderItem;
    use chrono::Utc;

    fn order_with(items: Vec<WorkOrderItem>) -> WorkOrder {
        WorkOrder {
            work_order_id: "WO-0001".to_string(),
            production_item: "FG".to_string(),
            qty: 1.0,
            wip_warehouse: "WIP".to_string(),
            source_warehouse: Some("Main".to_string()),
            status: WorkOrderStatus::Submitted,
            required_items: items,
            modified_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn test_draft_uses_item_source_then_default() {
        let mut a = WorkOrderItem::new(1, "A", "Kg");
        a.source_warehouse = Some("Wire Store".to_string());
        a.transferred_qty = Some(10.0);
        a.consumed_qty = Some(6.0);
        let mut b = WorkOrderItem::new(2, "B", "Nos");
        b.transferred_qty = Some(3.0);
        let order = order_with(vec![a, b]);

        let items = ExcessCalculator::default().compute(&order.required_items);
        let draft = build_return_draft(&order, &items, "tester").unwrap();

        assert_eq!(draft.lines.len(), 2);
        assert_eq!(draft.lines[0].to_warehouse, "Wire Store");
        assert_eq!(draft.lines[0].qty, 4.0);
        assert_eq!(draft.lines[0].uom, "Kg");
        assert_eq!(draft.lines[1].to_warehouse, "Main");
        assert_eq!(draft.lines[1].uom, "Nos");
        assert!(draft.lines.iter().all(|l| l.from_warehouse == "WIP"));
        assert_eq!(draft.total_qty(), 7.0);
    }

    #[test]
    fn test_draft_without_source_warehouse_fails() {
        let mut a = WorkOrderItem::new(1, "A", "Kg");
        a.transferred_qty = Some(1.0);
        let mut order = order_with(vec![a]);
        order.source_warehouse = None;

        let items = ExcessCalculator::default().compute(&order.required_items);
        assert!(build_return_draft(&order, &items, "tester").is_err());
    }

    #[test]
    fn test_result_json_omits_empty_fields() {
        let result = ReconciliationResult {
            status: ReconciliationStatus::Closed,
            total_returned_qty: None,
            stock_entry: None,
            message: None,
        };
        assert_eq!(serde_json::to_string(&result).unwrap(), r#"{"status":"closed"}"#);
    }
}
