// ==========================================
// 工单 WIP 余料核对 - 工单 API
// ==========================================
// 职责: 退料并关闭、关闭/停止状态入口、余料查询
// 业务逻辑全部在引擎层，这里只做入参校验与错误转换
// ==========================================

use std::sync::Arc;
use tracing::debug;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::work_order::WorkOrder;
use crate::engine::excess::ExcessItem;
use crate::engine::orchestrator::{ReconciliationResult, ReturnAndCloseOrchestrator};
use crate::engine::status_change::{StatusChange, WorkOrderStatusService};
use crate::repository::WorkOrderRepository;

/// 未指定操作人时记录的默认值
pub const DEFAULT_ACTOR: &str = "system";

// ==========================================
// WorkOrderApi - 工单 API
// ==========================================
pub struct WorkOrderApi {
    work_order_repo: Arc<WorkOrderRepository>,
    orchestrator: Arc<ReturnAndCloseOrchestrator>,
    status_service: Arc<WorkOrderStatusService>,
}

impl WorkOrderApi {
    pub fn new(
        work_order_repo: Arc<WorkOrderRepository>,
        orchestrator: Arc<ReturnAndCloseOrchestrator>,
        status_service: Arc<WorkOrderStatusService>,
    ) -> Self {
        Self {
            work_order_repo,
            orchestrator,
            status_service,
        }
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 查询工单（含明细）
    pub fn get_work_order(&self, work_order_id: &str) -> ApiResult<WorkOrder> {
        let id = require_id(work_order_id)?;
        self.work_order_repo
            .find_by_id(id)?
            .ok_or_else(|| ApiError::NotFound(format!("工单(id={})不存在", id)))
    }

    /// 查询工单当前余料（“退料并关闭”按钮展示用）
    pub fn get_excess_items(&self, work_order_id: &str) -> ApiResult<Vec<ExcessItem>> {
        let id = require_id(work_order_id)?;
        let items = self.orchestrator.preview_excess(id)?;
        debug!(work_order_id = %id, excess_items = items.len(), "查询工单余料");
        Ok(items)
    }

    // ==========================================
    // 操作接口
    // ==========================================

    /// 退料并关闭
    pub fn return_and_close(
        &self,
        work_order_id: &str,
        actor: Option<&str>,
    ) -> ApiResult<ReconciliationResult> {
        let id = require_id(work_order_id)?;
        Ok(self.orchestrator.return_and_close(id, actor_or_default(actor))?)
    }

    /// 关闭 / 重新打开
    ///
    /// status = "Closed" 时受余料拦截；其余值视为重新打开
    pub fn close_work_order(
        &self,
        work_order_id: &str,
        status: &str,
        actor: Option<&str>,
    ) -> ApiResult<StatusChange> {
        let id = require_id(work_order_id)?;
        let status = require_status(status)?;
        Ok(self
            .status_service
            .close_work_order(id, status, actor_or_default(actor))?)
    }

    /// 停止 / 恢复
    ///
    /// status = "Stopped" 时受余料拦截；其余值视为恢复
    pub fn stop_unstop(
        &self,
        work_order_id: &str,
        status: &str,
        actor: Option<&str>,
    ) -> ApiResult<StatusChange> {
        let id = require_id(work_order_id)?;
        let status = require_status(status)?;
        Ok(self
            .status_service
            .stop_unstop(id, status, actor_or_default(actor))?)
    }
}

fn require_id(work_order_id: &str) -> ApiResult<&str> {
    let id = work_order_id.trim();
    if id.is_empty() {
        return Err(ApiError::InvalidInput("工单号不能为空".to_string()));
    }
    Ok(id)
}

fn require_status(status: &str) -> ApiResult<&str> {
    let status = status.trim();
    if status.is_empty() {
        return Err(ApiError::InvalidInput("目标状态不能为空".to_string()));
    }
    Ok(status)
}

fn actor_or_default(actor: Option<&str>) -> &str {
    actor
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or(DEFAULT_ACTOR)
}
