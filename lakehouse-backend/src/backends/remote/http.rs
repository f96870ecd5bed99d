//! GraphQL 请求方法

use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::credential::{Credential, RemoteAuth, request_credential};
use crate::error::{OpsError, Result};
use crate::http_client::HttpUtils;
use crate::traits::{ErrorContext, ErrorMapper, RawApiError};

use super::RemoteApiBackend;
use super::types::GraphQlResponse;

/// 查询的最大重试次数
const QUERY_MAX_RETRIES: u32 = 2;
/// 变更操作不重试
const MUTATION_MAX_RETRIES: u32 = 0;

/// HTTP 状态码映射为错误码（无法从响应体得到 GraphQL 错误时使用）
pub(crate) fn status_code(status: u16) -> String {
    match status {
        401 => "UNAUTHENTICATED".to_string(),
        403 => "FORBIDDEN".to_string(),
        404 => "NOT_FOUND".to_string(),
        400 | 422 => "BAD_USER_INPUT".to_string(),
        other => format!("HTTP_{other}"),
    }
}

impl RemoteApiBackend {
    /// 当前调用使用的凭证：请求上下文优先，其次为构造时附带的凭证
    pub(crate) fn current_credential(&self) -> Result<Credential> {
        if let Some(credential) = request_credential() {
            return Ok(credential);
        }
        match &self.auth {
            RemoteAuth::Static(credential) => Ok(credential.clone()),
            RemoteAuth::PerRequest => Err(OpsError::Authentication {
                backend: self.backend_name().to_string(),
                detail: "no credential bound to this request".to_string(),
            }),
        }
    }

    /// 执行查询（可重试）
    pub(crate) async fn query(
        &self,
        operation: &str,
        document: &str,
        variables: Value,
        context: ErrorContext,
    ) -> Result<Value> {
        self.execute(operation, document, variables, context, QUERY_MAX_RETRIES)
            .await
    }

    /// 执行变更（不重试）
    pub(crate) async fn mutate(
        &self,
        operation: &str,
        document: &str,
        variables: Value,
        context: ErrorContext,
    ) -> Result<Value> {
        self.execute(operation, document, variables, context, MUTATION_MAX_RETRIES)
            .await
    }

    async fn execute(
        &self,
        operation: &str,
        document: &str,
        variables: Value,
        context: ErrorContext,
        max_retries: u32,
    ) -> Result<Value> {
        let credential = self.current_credential()?;
        let request = self
            .client
            .post(&self.graphql_url)
            .header(reqwest::header::AUTHORIZATION, credential.bearer_header())
            .json(&json!({ "query": document, "variables": variables }));

        let (status, body) = HttpUtils::execute_request_with_retry(
            request,
            self.backend_name(),
            "POST",
            operation,
            max_retries,
        )
        .await?;

        let response: Option<GraphQlResponse> = serde_json::from_str(&body).ok();

        if let Some(error) = response.as_ref().and_then(|r| r.errors.first()) {
            let code = error
                .extensions
                .as_ref()
                .and_then(|ext| ext.code.clone())
                .unwrap_or_else(|| status_code(status));
            log::warn!("[{}] {operation} failed: {code}", self.backend_name());
            return Err(self.map_error(
                RawApiError::with_code(code, error.message.clone()),
                context,
            ));
        }

        if !(200..300).contains(&status) {
            return Err(self.map_error(
                RawApiError::with_code(status_code(status), format!("HTTP {status}")),
                context,
            ));
        }

        // 首次解析失败时重新解析，以记录具体错误
        let response = match response {
            Some(response) => response,
            None => HttpUtils::parse_json::<GraphQlResponse>(&body, self.backend_name())?,
        };

        response
            .data
            .ok_or_else(|| self.parse_error("GraphQL response carries neither data nor errors"))
    }

    /// 按 JSON Pointer 取出并反序列化；路径不存在视为 `null`
    pub(crate) fn extract<T: DeserializeOwned>(&self, data: &Value, pointer: &str) -> Result<T> {
        let value = data.pointer(pointer).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| self.parse_error(format!("{pointer}: {e}")))
    }

    /// 解析 union 结果：`InvalidInput` / `OperationError` 转为错误，其余原样返回
    pub(crate) fn union_outcome(&self, value: Value, context: ErrorContext) -> Result<Value> {
        let typename = value
            .get("__typename")
            .and_then(Value::as_str)
            .unwrap_or_default();

        match typename {
            "InvalidInput" => {
                let first = value.pointer("/errors/0");
                let field = |key: &str| {
                    first
                        .and_then(|e| e.get(key))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                };
                let param = field("path")
                    .and_then(|p| p.rsplit('.').next().map(str::to_string))
                    .filter(|p| !p.is_empty())
                    .or(context.param)
                    .unwrap_or_else(|| "input".to_string());
                let detail = field("message").unwrap_or_else(|| "invalid input".to_string());
                Err(self.validation_error(&param, detail))
            }
            "OperationError" => {
                let name = value
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("OperationError");
                let message = value
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Err(self.map_error(RawApiError::with_code(name, message), context))
            }
            _ => Ok(value),
        }
    }
}
