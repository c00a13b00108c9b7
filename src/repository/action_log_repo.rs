// ==========================================
// 工单 WIP 余料核对 - 操作日志数据仓储
// ==========================================
// 红线: 本系统发起的每一次状态变更都必须记录
// ==========================================

mod core;
mod queries;

#[cfg(test)]
mod tests;

pub use core::ActionLogRepository;
