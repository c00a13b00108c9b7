// ==========================================
// 工单 WIP 余料核对 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，把仓储/引擎错误转换为用户可读的错误消息
// ==========================================

use crate::engine::error::ReconcileError;
use crate::engine::excess::ExcessItem;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
/// 所有错误信息必须包含显式原因
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效的工单状态: {0}")]
    InvalidState(String),

    /// 存在未退余料（可恢复: 执行退料并关闭）
    #[error("{message}")]
    BlockedByExcessRm {
        message: String,
        items: Vec<ExcessItem>,
    },

    /// 退料单提交失败（无副作用，可重试）
    #[error("退料单提交失败: {0}")]
    ReturnCommitFailed(String),

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("版本冲突: {0}")]
    VersionConflict(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::VersionConflict {
                work_order_id,
                expected,
            } => ApiError::VersionConflict(format!(
                "工单{}的状态已被其他操作修改（期望状态={}）",
                work_order_id, expected
            )),

            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::DatabaseError(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::DatabaseError(format!("外键约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InternalError(format!("字段{}数据异常: {}", field, message))
            }

            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 ReconcileError 转换
// ==========================================
impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::NotFound(id) => ApiError::NotFound(format!("工单(id={})不存在", id)),
            ReconcileError::InvalidState { reason, .. } => ApiError::InvalidState(reason),
            ReconcileError::BlockedByExcessRm { message, items, .. } => {
                ApiError::BlockedByExcessRm { message, items }
            }
            ReconcileError::ReturnCommitFailed { reason, .. } => {
                ApiError::ReturnCommitFailed(reason)
            }
            ReconcileError::Config(msg) => ApiError::InternalError(format!("配置读取失败: {}", msg)),
            ReconcileError::Repository(e) => e.into(),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
