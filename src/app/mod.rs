// ==========================================
// 工单 WIP 余料核对 - 应用层
// ==========================================
// 职责: 组装各层实例，提供远程调用适配
// ==========================================

pub mod rpc;
pub mod state;

// 重导出
pub use rpc::{handle_line, invoke, map_api_error, ErrorResponse};
pub use state::{get_default_db_path, AppState};
