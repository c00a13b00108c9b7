// ==========================================
// 工单 WIP 余料核对 - 关闭/停止拦截
// ==========================================
// 在宿主执行 Close / Stop 之前同步校验:
// 余料计算结果非空 → BlockedByExcessRm，提示使用“退料并关闭”
// 红线: 不改变任何数量，不改变工单状态
// ==========================================

use crate::domain::types::StatusAction;
use crate::domain::work_order::WorkOrder;
use crate::engine::error::{ReconcileError, ReconcileResult};
use crate::engine::excess::{ExcessCalculator, ExcessItem};
use crate::i18n::{action_label, format_qty, t_with_args};
use tracing::warn;

pub struct CloseGuard {
    calculator: ExcessCalculator,
}

impl CloseGuard {
    pub fn new(calculator: ExcessCalculator) -> Self {
        Self { calculator }
    }

    /// 校验状态动作
    ///
    /// 仅拦截 Close / Stop；Reopen / Resume 直接放行
    pub fn validate_transition(
        &self,
        work_order: &WorkOrder,
        action: StatusAction,
    ) -> ReconcileResult<()> {
        if !action.is_guarded() {
            return Ok(());
        }

        let items = self.calculator.compute(&work_order.required_items);
        if items.is_empty() {
            return Ok(());
        }

        let message = blocked_message(&work_order.work_order_id, action, &items);
        warn!(
            work_order_id = %work_order.work_order_id,
            action = %action,
            blocking_items = items.len(),
            "存在未退余料，拦截状态变更"
        );

        Err(ReconcileError::BlockedByExcessRm {
            work_order_id: work_order.work_order_id.clone(),
            message,
            items,
        })
    }
}

/// 拼装拦截提示（逐行列出余料）
pub fn blocked_message(work_order_id: &str, action: StatusAction, items: &[ExcessItem]) -> String {
    let lines: Vec<String> = items
        .iter()
        .map(|item| {
            t_with_args(
                "guard.item_line",
                &[
                    ("item", &item.item_code),
                    ("excess", &format_qty(item.excess_qty)),
                    ("uom", &item.stock_uom),
                    ("transferred", &format_qty(item.transferred_qty)),
                    ("consumed", &format_qty(item.consumed_qty)),
                    ("returned", &format_qty(item.returned_qty)),
                ],
            )
        })
        .collect();

    t_with_args(
        "guard.blocked",
        &[
            ("work_order", work_order_id),
            ("action", &action_label(action)),
            ("items", &lines.join("\n")),
        ],
    )
}
