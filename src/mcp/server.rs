//! MCP server implementation
//!
//! Implements the Model Context Protocol server that exposes the Odoo
//! tools over newline-delimited JSON-RPC on stdio.

use crate::mcp::protocol::*;
use crate::mcp::tools;
use crate::odoo::RecordSource;
use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

pub const SERVER_NAME: &str = "odoo-mcp";

pub struct McpServer {
    source: Option<Arc<dyn RecordSource>>,
}

impl McpServer {
    pub fn new(source: Option<Arc<dyn RecordSource>>) -> Self {
        Self { source }
    }

    /// Run the MCP server on stdin/stdout until the client disconnects
    pub async fn run(&self) -> Result<()> {
        info!("MCP server starting on stdio");
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await
    }

    /// Serve requests from `reader`, writing responses to `writer`
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = Vec::new();

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }

            // A bad line only costs that one message
            let response = match std::str::from_utf8(&buf) {
                Ok(line) => {
                    let line = line.trim();

                    // Skip empty lines
                    if line.is_empty() {
                        continue;
                    }

                    debug!("Received request: {}", line);
                    self.handle_request(line).await
                }
                Err(e) => {
                    warn!("Received non UTF-8 line: {}", e);
                    Some(JsonRpcResponse::failure(
                        Value::Null,
                        JsonRpcError::new(PARSE_ERROR, format!("Parse error: {}", e)),
                    ))
                }
            };

            if let Some(response) = response {
                let response_json = serde_json::to_string(&response)?;
                writer.write_all(response_json.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
                debug!("Sent response");
            }
        }

        info!("Client closed connection");
        Ok(())
    }

    /// Handle one line; notifications produce no response
    pub async fn handle_request(&self, content: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(content) {
            Ok(value) => value,
            Err(e) => {
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    JsonRpcError::new(PARSE_ERROR, format!("Parse error: {}", e)),
                ));
            }
        };

        // Well-formed JSON that is not a request object
        let request: JsonRpcRequest = match serde_json::from_value(value.clone()) {
            Ok(req) => req,
            Err(e) => {
                let id = value.get("id").cloned().unwrap_or(Value::Null);
                return Some(JsonRpcResponse::failure(
                    id,
                    JsonRpcError::new(INVALID_REQUEST, format!("Invalid request: {}", e)),
                ));
            }
        };

        if request.is_notification() {
            debug!("Notification: {}", request.method);
            return None;
        }

        let id = request.id.clone().unwrap_or(Value::Null);

        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::failure(
                id,
                JsonRpcError::new(
                    INVALID_REQUEST,
                    format!("Unsupported jsonrpc version: {}", request.jsonrpc),
                ),
            ));
        }

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => self.handle_list_tools(),
            "tools/call" => self.handle_call_tool(request.params).await,
            _ => {
                warn!("Method not found: {}", request.method);
                Err(JsonRpcError::new(
                    METHOD_NOT_FOUND,
                    format!("Method not found: {}", request.method),
                ))
            }
        };

        Some(match result {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        })
    }

    fn handle_initialize(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: InitializeParams = match params {
            Some(params) => serde_json::from_value(params).map_err(|e| {
                JsonRpcError::new(INVALID_PARAMS, format!("Invalid initialize params: {}", e))
            })?,
            None => InitializeParams::default(),
        };

        if let Some(client) = &params.client_info {
            info!("Client connected: {}", client.name);
        }

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                logging: None,
                tools: Some(serde_json::json!({})),
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        serde_json::to_value(result).map_err(|e| {
            JsonRpcError::new(INTERNAL_ERROR, format!("Failed to serialize result: {}", e))
        })
    }

    fn handle_list_tools(&self) -> Result<Value, JsonRpcError> {
        let result = ListToolsResult {
            tools: tools::get_tool_definitions(),
        };

        serde_json::to_value(result).map_err(|e| {
            JsonRpcError::new(INTERNAL_ERROR, format!("Failed to serialize tools: {}", e))
        })
    }

    async fn handle_call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: CallToolParams = serde_json::from_value(params.unwrap_or(Value::Null))
            .map_err(|e| {
                JsonRpcError::new(INVALID_PARAMS, format!("Invalid tool call params: {}", e))
            })?;

        let result = tools::call_tool(&params.name, params.arguments, self.source.clone()).await;

        serde_json::to_value(result).map_err(|e| {
            JsonRpcError::new(
                INTERNAL_ERROR,
                format!("Failed to serialize tool result: {}", e),
            )
        })
    }
}
