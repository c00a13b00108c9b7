// ==========================================
// 工单 WIP 余料核对 - 核心库
// ==========================================
// 关闭/停止工单前拦截 WIP 余料，提供一键退料并关闭
// 技术栈: Rust + SQLite
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装与远程调用适配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{ReconciliationStatus, StatusAction, WorkOrderStatus};

// 领域实体
pub use domain::{ActionLog, ActionType, ReturnLine, ReturnTransaction, WorkOrder, WorkOrderItem};

// 引擎
pub use engine::{
    CloseGuard, ExcessCalculator, ExcessItem, ReconcileError, ReconciliationResult,
    ReturnAndCloseOrchestrator, StockLedger, StockLedgerError, WorkOrderStatusService,
};

// API
pub use api::{ApiError, WorkOrderApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "工单 WIP 余料核对";
