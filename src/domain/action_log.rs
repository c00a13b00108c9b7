// ==========================================
// 工单 WIP 余料核对 - 操作日志领域模型
// ==========================================
// 红线: 本系统发起的每一次工单状态变更都必须记录
// 用途: 审计追踪
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,         // 日志ID
    pub work_order_id: String,     // 关联工单
    pub action_type: String,       // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime,  // 操作时间戳
    pub actor: String,             // 操作人

    pub payload_json: Option<JsonValue>, // 操作参数/结果 (JSON)
    pub detail: Option<String>,    // 详细描述
}

impl ActionLog {
    /// 以当前时间创建日志
    pub fn new(work_order_id: &str, action_type: ActionType, actor: &str) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            work_order_id: work_order_id.to_string(),
            action_type: action_type.as_str().to_string(),
            action_ts: chrono::Local::now().naive_local(),
            actor: actor.to_string(),
            payload_json: None,
            detail: None,
        }
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload_json = Some(payload);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    ReturnAndClose, // 退料并关闭
    DirectClose,    // 无余料直接关闭 (退料关闭流程内)
    Close,          // 关闭
    Reopen,         // 重新打开
    Stop,           // 停止
    Resume,         // 恢复
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::ReturnAndClose => "RETURN_AND_CLOSE",
            ActionType::DirectClose => "DIRECT_CLOSE",
            ActionType::Close => "CLOSE",
            ActionType::Reopen => "REOPEN",
            ActionType::Stop => "STOP",
            ActionType::Resume => "RESUME",
        }
    }
}
