// ==========================================
// 工单 WIP 余料核对 - 配置层
// ==========================================
// 职责: 系统配置管理
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod tolerance;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use tolerance::ExcessTolerance;
