// ==========================================
// 工单 WIP 余料核对 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use crate::engine::excess::ExcessItem;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 余料核对错误类型
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("工单不存在: {0}")]
    NotFound(String),

    #[error("工单状态不允许该操作: {work_order_id} ({status}): {reason}")]
    InvalidState {
        work_order_id: String,
        status: String,
        reason: String,
    },

    /// 存在未退余料，需先执行退料并关闭（可恢复）
    #[error("{message}")]
    BlockedByExcessRm {
        work_order_id: String,
        message: String,
        items: Vec<ExcessItem>,
    },

    /// 退料单提交失败，无任何副作用保留（可安全重试）
    #[error("退料单提交失败 ({work_order_id}): {reason}")]
    ReturnCommitFailed {
        work_order_id: String,
        reason: String,
    },

    #[error("配置读取失败: {0}")]
    Config(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Result 类型别名
pub type ReconcileResult<T> = Result<T, ReconcileError>;
