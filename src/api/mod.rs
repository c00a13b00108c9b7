// ==========================================
// 工单 WIP 余料核对 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供远程调用适配层使用
// ==========================================

pub mod error;
pub mod work_order_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use work_order_api::WorkOrderApi;
