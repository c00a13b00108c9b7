// ==========================================
// 工单 WIP 余料核对 - 领域类型定义
// ==========================================
// 职责: 工单状态、状态动作、核对结果状态
// 序列化格式: 工单状态 SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 工单状态 (Work Order Status)
// ==========================================
// Submitted / InProcess / Completed 均为"已提交未关闭"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkOrderStatus {
    Draft,     // 草稿
    Submitted, // 已提交(未开工)
    InProcess, // 生产中
    Completed, // 已完工
    Stopped,   // 已停止
    Closed,    // 已关闭
    Cancelled, // 已取消
}

impl fmt::Display for WorkOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl WorkOrderStatus {
    /// 从字符串解析状态（未知值返回 None，不做静默兜底）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().replace([' ', '-'], "_").as_str() {
            "DRAFT" => Some(WorkOrderStatus::Draft),
            "SUBMITTED" | "NOT_STARTED" => Some(WorkOrderStatus::Submitted),
            "IN_PROCESS" => Some(WorkOrderStatus::InProcess),
            "COMPLETED" => Some(WorkOrderStatus::Completed),
            "STOPPED" => Some(WorkOrderStatus::Stopped),
            "CLOSED" => Some(WorkOrderStatus::Closed),
            "CANCELLED" => Some(WorkOrderStatus::Cancelled),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            WorkOrderStatus::Draft => "DRAFT",
            WorkOrderStatus::Submitted => "SUBMITTED",
            WorkOrderStatus::InProcess => "IN_PROCESS",
            WorkOrderStatus::Completed => "COMPLETED",
            WorkOrderStatus::Stopped => "STOPPED",
            WorkOrderStatus::Closed => "CLOSED",
            WorkOrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// 是否为"已提交且未关闭/停止/取消"的状态（可执行退料关闭）
    pub fn is_open_submitted(&self) -> bool {
        matches!(
            self,
            WorkOrderStatus::Submitted | WorkOrderStatus::InProcess | WorkOrderStatus::Completed
        )
    }

    /// 宿主平台的常规状态流转规则
    ///
    /// # 返回
    /// - Some(目标状态): 允许流转
    /// - None: 当前状态不允许该动作
    pub fn apply(&self, action: StatusAction) -> Option<WorkOrderStatus> {
        match (action, self) {
            (StatusAction::Close, s) if s.is_open_submitted() => Some(WorkOrderStatus::Closed),
            (StatusAction::Close, WorkOrderStatus::Stopped) => Some(WorkOrderStatus::Closed),
            (StatusAction::Reopen, WorkOrderStatus::Closed) => Some(WorkOrderStatus::Submitted),
            (StatusAction::Stop, WorkOrderStatus::Submitted | WorkOrderStatus::InProcess) => {
                Some(WorkOrderStatus::Stopped)
            }
            (StatusAction::Resume, WorkOrderStatus::Stopped) => Some(WorkOrderStatus::Submitted),
            _ => None,
        }
    }
}

// ==========================================
// 状态动作 (Status Action)
// ==========================================
// 对应宿主平台的两个状态入口: close_work_order / stop_unstop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusAction {
    Close,  // 关闭
    Reopen, // 重新打开
    Stop,   // 停止
    Resume, // 恢复
}

impl StatusAction {
    /// 解析 close_work_order 的 status 参数: "Closed" 为关闭，其余视为重新打开
    pub fn from_close_request(status: &str) -> Self {
        if status.trim().eq_ignore_ascii_case("closed") {
            StatusAction::Close
        } else {
            StatusAction::Reopen
        }
    }

    /// 解析 stop_unstop 的 status 参数: "Stopped" 为停止，其余视为恢复
    pub fn from_stop_request(status: &str) -> Self {
        if status.trim().eq_ignore_ascii_case("stopped") {
            StatusAction::Stop
        } else {
            StatusAction::Resume
        }
    }

    /// 是否需要余料拦截
    pub fn is_guarded(&self) -> bool {
        matches!(self, StatusAction::Close | StatusAction::Stop)
    }

    /// 用于提示信息的动作名
    pub fn label(&self) -> &'static str {
        match self {
            StatusAction::Close => "Close",
            StatusAction::Reopen => "Reopen",
            StatusAction::Stop => "Stop",
            StatusAction::Resume => "Resume",
        }
    }
}

impl fmt::Display for StatusAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ==========================================
// 核对结果状态 (Reconciliation Status)
// ==========================================
// 序列化格式: snake_case (对外 JSON 契约)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationStatus {
    ReturnedAndClosed, // 已退料并关闭
    Closed,            // 无余料，直接关闭
    NoAction,          // 无需操作（已关闭）
}

impl fmt::Display for ReconciliationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconciliationStatus::ReturnedAndClosed => write!(f, "returned_and_closed"),
            ReconciliationStatus::Closed => write!(f, "closed"),
            ReconciliationStatus::NoAction => write!(f, "no_action"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip_db_str() {
        for s in [
            WorkOrderStatus::Draft,
            WorkOrderStatus::Submitted,
            WorkOrderStatus::InProcess,
            WorkOrderStatus::Completed,
            WorkOrderStatus::Stopped,
            WorkOrderStatus::Closed,
            WorkOrderStatus::Cancelled,
        ] {
            assert_eq!(WorkOrderStatus::parse(s.to_db_str()), Some(s));
        }
        assert_eq!(WorkOrderStatus::parse("Not Started"), Some(WorkOrderStatus::Submitted));
        assert_eq!(WorkOrderStatus::parse("in process"), Some(WorkOrderStatus::InProcess));
        assert_eq!(WorkOrderStatus::parse("bogus"), None);
    }

    #[test]
    fn test_host_transition_rules() {
        use StatusAction::*;
        use WorkOrderStatus::*;

        assert_eq!(Submitted.apply(Close), Some(Closed));
        assert_eq!(InProcess.apply(Close), Some(Closed));
        assert_eq!(Stopped.apply(Close), Some(Closed));
        assert_eq!(Draft.apply(Close), None);
        assert_eq!(Cancelled.apply(Close), None);
        assert_eq!(Closed.apply(Close), None);

        assert_eq!(Closed.apply(Reopen), Some(Submitted));
        assert_eq!(Submitted.apply(Reopen), None);

        assert_eq!(Submitted.apply(Stop), Some(Stopped));
        assert_eq!(Completed.apply(Stop), None);
        assert_eq!(Stopped.apply(Resume), Some(Submitted));
        assert_eq!(Submitted.apply(Resume), None);
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!(StatusAction::from_close_request("Closed"), StatusAction::Close);
        assert_eq!(StatusAction::from_close_request("Submitted"), StatusAction::Reopen);
        assert_eq!(StatusAction::from_stop_request("Stopped"), StatusAction::Stop);
        assert_eq!(StatusAction::from_stop_request("Resumed"), StatusAction::Resume);
        assert!(StatusAction::Close.is_guarded());
        assert!(StatusAction::Stop.is_guarded());
        assert!(!StatusAction::Reopen.is_guarded());
        assert!(!StatusAction::Resume.is_guarded());
    }

    #[test]
    fn test_reconciliation_status_json() {
        let json = serde_json::to_string(&ReconciliationStatus::ReturnedAndClosed).unwrap();
        assert_eq!(json, "\"returned_and_closed\"");
        let json = serde_json::to_string(&ReconciliationStatus::NoAction).unwrap();
        assert_eq!(json, "\"no_action\"");
    }
}
