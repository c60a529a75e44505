use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::error::{DispatchError, Result};
use crate::registry::Dispatcher;
use crate::value::Value;

/// Call request as it arrives from a transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Service name to call
    pub service: String,
    /// Method name to call
    pub method: String,
    /// Loosely-typed parameters, coerced with `validate`
    #[serde(default)]
    pub params: serde_json::Value,
}

impl RpcRequest {
    pub fn new(service: impl Into<String>, method: impl Into<String>, params: impl Serialize) -> Result<Self> {
        Ok(Self {
            service: service.into(),
            method: method.into(),
            params: serde_json::to_value(params)?,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Outcome of a dispatched request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum RpcResponse {
    Success {
        data: serde_json::Value,
        /// Processing time in milliseconds
        processing_time_ms: u64,
    },
    Error {
        error: String,
        /// Error code for structured error handling
        code: Option<String>,
        /// Additional error details
        details: Option<serde_json::Value>,
    },
}

impl RpcResponse {
    pub fn success(data: impl Serialize, processing_time_ms: u64) -> Result<Self> {
        Ok(Self::Success {
            data: serde_json::to_value(data)?,
            processing_time_ms,
        })
    }

    pub fn from_error(err: &DispatchError) -> Self {
        Self::Error {
            error: err.to_string(),
            code: Some(err.code().to_string()),
            details: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Extract success data
    pub fn data<T: for<'de> Deserialize<'de>>(&self) -> Result<T> {
        match self {
            Self::Success { data, .. } => Ok(serde_json::from_value(data.clone())?),
            Self::Error { error, .. } => Err(DispatchError::Method(anyhow::anyhow!("{}", error))),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Encode results: nothing as `null`, one value as itself, several as an array
fn encode_results(mut results: Vec<Value>) -> Result<serde_json::Value> {
    let encoded = match results.len() {
        0 => serde_json::Value::Null,
        1 => serde_json::to_value(results.remove(0))?,
        _ => serde_json::to_value(results)?,
    };
    Ok(encoded)
}

impl Dispatcher {
    /// Coerce, run and encode one request
    pub fn handle(&self, request: &RpcRequest) -> RpcResponse {
        let start_time = Instant::now();

        let outcome = self
            .validate(&request.service, &request.method, &request.params)
            .and_then(|args| self.run(&request.service, &request.method, args))
            .and_then(encode_results);

        let processing_time = start_time.elapsed().as_millis() as u64;
        debug!(
            "Handled {}.{} ({}ms)",
            request.service, request.method, processing_time
        );

        match outcome {
            Ok(data) => RpcResponse::Success {
                data,
                processing_time_ms: processing_time,
            },
            Err(err) => RpcResponse::from_error(&err),
        }
    }
}
