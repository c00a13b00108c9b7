// ==========================================
// 工单 WIP 余料核对 - 远程调用适配层
// ==========================================
// 职责: 方法名 + JSON 参数 → WorkOrderApi；结果/错误序列化为 JSON 字符串
// 约束: 不含业务逻辑；同步 API 在 spawn_blocking 中执行
// ==========================================

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::error::ApiError;
use crate::app::state::AppState;
use crate::i18n::t_with_args;

/// 错误响应（返回给调用方）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 错误代码
    pub code: String,

    /// 错误消息
    pub message: String,

    /// 详细信息（可选）
    pub details: Option<Value>,
}

/// 将ApiError转换为JSON字符串
pub fn map_api_error(err: ApiError) -> String {
    let error_response = ErrorResponse {
        code: match &err {
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InvalidState(_) => "INVALID_STATE",
            ApiError::BlockedByExcessRm { .. } => "BLOCKED_BY_EXCESS_RM",
            ApiError::ReturnCommitFailed(_) => "RETURN_COMMIT_FAILED",
            ApiError::VersionConflict(_) => "VERSION_CONFLICT",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::DatabaseConnectionError(_) => "DATABASE_CONNECTION_ERROR",
            ApiError::DatabaseTransactionError(_) => "DATABASE_TRANSACTION_ERROR",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::Other(_) => "OTHER_ERROR",
        }
        .to_string(),
        message: err.to_string(),
        details: match &err {
            ApiError::BlockedByExcessRm { items, .. } => {
                Some(serde_json::json!({ "items": items }))
            }
            _ => None,
        },
    };

    serde_json::to_string(&error_response).unwrap_or_else(|_| err.to_string())
}

fn unknown_method(method: &str) -> String {
    let error_response = ErrorResponse {
        code: "UNKNOWN_METHOD".to_string(),
        message: t_with_args("common.unknown_method", &[("method", method)]),
        details: None,
    };
    serde_json::to_string(&error_response).unwrap_or_else(|_| error_response.message.clone())
}

// ==========================================
// 参数
// ==========================================

#[derive(Debug, Deserialize)]
struct WorkOrderArgs {
    work_order: String,
    #[serde(default)]
    user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusArgs {
    work_order: String,
    status: String,
    #[serde(default)]
    user: Option<String>,
}

fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, String> {
    serde_json::from_value(args)
        .map_err(|e| map_api_error(ApiError::InvalidInput(format!("参数错误: {}", e))))
}

fn to_json<T: Serialize>(result: &T) -> Result<String, String> {
    serde_json::to_string(result).map_err(|e| format!("序列化失败: {}", e))
}

// ==========================================
// 调用入口
// ==========================================

/// 按方法名分发调用
///
/// # 返回
/// - Ok(String): 结果 JSON
/// - Err(String): ErrorResponse JSON
pub async fn invoke(state: &AppState, method: &str, args: Value) -> Result<String, String> {
    let api = state.work_order_api.clone();

    match method {
        "return_and_close" => {
            let args: WorkOrderArgs = parse_args(args)?;
            let result = tokio::task::spawn_blocking(move || {
                api.return_and_close(&args.work_order, args.user.as_deref())
            })
            .await
            .map_err(|e| format!("任务执行失败: {}", e))?
            .map_err(map_api_error)?;
            to_json(&result)
        }
        "close_work_order" => {
            let args: StatusArgs = parse_args(args)?;
            let result = tokio::task::spawn_blocking(move || {
                api.close_work_order(&args.work_order, &args.status, args.user.as_deref())
            })
            .await
            .map_err(|e| format!("任务执行失败: {}", e))?
            .map_err(map_api_error)?;
            to_json(&result)
        }
        "stop_unstop" => {
            let args: StatusArgs = parse_args(args)?;
            let result = tokio::task::spawn_blocking(move || {
                api.stop_unstop(&args.work_order, &args.status, args.user.as_deref())
            })
            .await
            .map_err(|e| format!("任务执行失败: {}", e))?
            .map_err(map_api_error)?;
            to_json(&result)
        }
        "get_excess_items" => {
            let args: WorkOrderArgs = parse_args(args)?;
            let result = tokio::task::spawn_blocking(move || api.get_excess_items(&args.work_order))
                .await
                .map_err(|e| format!("任务执行失败: {}", e))?
                .map_err(map_api_error)?;
            to_json(&result)
        }
        "get_work_order" => {
            let args: WorkOrderArgs = parse_args(args)?;
            let result = tokio::task::spawn_blocking(move || api.get_work_order(&args.work_order))
                .await
                .map_err(|e| format!("任务执行失败: {}", e))?
                .map_err(map_api_error)?;
            to_json(&result)
        }
        other => {
            tracing::warn!(method = %other, "未知的远程调用方法");
            Err(unknown_method(other))
        }
    }
}

// ==========================================
// 行协议: 每行一个请求 / 一个响应
// ==========================================

/// 请求: {"method": "...", "args": {...}}
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default)]
    pub args: Value,
}

/// 响应: {"ok": true, "data": ...} 或 {"ok": false, "error": {...}}
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl RpcResponse {
    fn from_result(result: Result<String, String>) -> Self {
        match result {
            Ok(data) => Self {
                ok: true,
                data: Some(serde_json::from_str(&data).unwrap_or(Value::String(data))),
                error: None,
            },
            Err(error) => Self {
                ok: false,
                data: None,
                error: Some(serde_json::from_str(&error).unwrap_or(Value::String(error))),
            },
        }
    }
}

/// 处理一行请求，返回一行响应
pub async fn handle_line(state: &AppState, line: &str) -> String {
    let result = match serde_json::from_str::<RpcRequest>(line) {
        Ok(request) => invoke(state, &request.method, request.args).await,
        Err(e) => Err(map_api_error(ApiError::InvalidInput(format!(
            "请求格式错误: {}",
            e
        )))),
    };

    let response = RpcResponse::from_result(result);
    serde_json::to_string(&response)
        .unwrap_or_else(|e| format!(r#"{{"ok":false,"error":"序列化失败: {}"}}"#, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_api_error_codes() {
        let json = map_api_error(ApiError::NotFound("WO-1".to_string()));
        let resp: ErrorResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(resp.code, "NOT_FOUND");
        assert!(resp.details.is_none());

        let json = map_api_error(ApiError::BlockedByExcessRm {
            message: "blocked".to_string(),
            items: vec![],
        });
        let resp: ErrorResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(resp.code, "BLOCKED_BY_EXCESS_RM");
        assert_eq!(resp.message, "blocked");
        assert!(resp.details.unwrap()["items"].is_array());
    }

    #[test]
    fn test_response_shapes() {
        let ok = RpcResponse::from_result(Ok(r#"{"status":"closed"}"#.to_string()));
        let v = serde_json::to_value(&ok).unwrap();
        assert_eq!(v["ok"], true);
        assert_eq!(v["data"]["status"], "closed");
        assert!(v.get("error").is_none());

        let err = RpcResponse::from_result(Err("plain".to_string()));
        let v = serde_json::to_value(&err).unwrap();
        assert_eq!(v["ok"], false);
        assert_eq!(v["error"], "plain");
    }
}
