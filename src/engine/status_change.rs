// ==========================================
// 工单 WIP 余料核对 - 工单状态变更服务
// ==========================================
// 对应宿主的两个状态入口:
// - close_work_order: Closed → 关闭（受拦截）；其余 → 重新打开
// - stop_unstop: Stopped → 停止（受拦截）；其余 → 恢复
// 拦截、状态流转、操作日志在同一工作单元内完成
// ==========================================

use crate::config::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::types::{StatusAction, WorkOrderStatus};
use crate::engine::close_guard::CloseGuard;
use crate::engine::error::{ReconcileError, ReconcileResult};
use crate::engine::orchestrator::load_calculator;
use crate::i18n::{action_label, t_with_args};
use crate::repository::WorkOrderRepository;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// 状态变更结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    #[serde(rename = "work_order")]
    pub work_order_id: String,
    pub from_status: WorkOrderStatus,
    pub to_status: WorkOrderStatus,
}

pub struct WorkOrderStatusService {
    work_orders: Arc<WorkOrderRepository>,
    config: Arc<ConfigManager>,
}

impl WorkOrderStatusService {
    pub fn new(work_orders: Arc<WorkOrderRepository>, config: Arc<ConfigManager>) -> Self {
        Self {
            work_orders,
            config,
        }
    }

    /// close_work_order 入口
    pub fn close_work_order(
        &self,
        work_order_id: &str,
        status: &str,
        actor: &str,
    ) -> ReconcileResult<StatusChange> {
        self.apply(work_order_id, StatusAction::from_close_request(status), actor)
    }

    /// stop_unstop 入口
    pub fn stop_unstop(
        &self,
        work_order_id: &str,
        status: &str,
        actor: &str,
    ) -> ReconcileResult<StatusChange> {
        self.apply(work_order_id, StatusAction::from_stop_request(status), actor)
    }

    /// 执行状态动作
    pub fn apply(
        &self,
        work_order_id: &str,
        action: StatusAction,
        actor: &str,
    ) -> ReconcileResult<StatusChange> {
        let guard = CloseGuard::new(load_calculator(&self.config)?);
        let unit = self.work_orders.begin_unit()?;

        let work_order = unit
            .load_work_order(work_order_id)?
            .ok_or_else(|| ReconcileError::NotFound(work_order_id.to_string()))?;

        guard.validate_transition(&work_order, action)?;

        let from_status = work_order.status;
        let to_status = from_status
            .apply(action)
            .ok_or_else(|| ReconcileError::InvalidState {
                work_order_id: work_order_id.to_string(),
                status: from_status.to_string(),
                reason: t_with_args(
                    "reconcile.transition_not_allowed",
                    &[
                        ("status", from_status.to_db_str()),
                        ("action", &action_label(action)),
                    ],
                ),
            })?;

        unit.transition_status(work_order_id, from_status, to_status)?;
        unit.insert_action_log(
            &ActionLog::new(work_order_id, action_type_of(action), actor).with_payload(json!({
                "from_status": from_status,
                "to_status": to_status,
            })),
        )?;
        unit.commit()?;

        info!(
            work_order_id = %work_order_id,
            action = %action,
            from = %from_status,
            to = %to_status,
            "工单状态已变更"
        );

        Ok(StatusChange {
            work_order_id: work_order_id.to_string(),
            from_status,
            to_status,
        })
    }
}

fn action_type_of(action: StatusAction) -> ActionType {
    match action {
        StatusAction::Close => ActionType::Close,
        StatusAction::Reopen => ActionType::Reopen,
        StatusAction::Stop => ActionType::Stop,
        StatusAction::Resume => ActionType::Resume,
    }
}
