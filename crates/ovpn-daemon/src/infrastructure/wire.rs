//! Request decoding shared by both transports.
//!
//! A WebSocket text frame and a control-socket line carry the same JSON
//! request and get the same JSON response.  A request that does not decode
//! still gets a response (`{"success":false,"error":"Invalid request: ..."}`)
//! so a caller is never left waiting.

use ovpn_core::{Request, Response};
use serde::Serialize;
use tracing::{debug, error};

use crate::application::DispatcherHandle;

/// Decodes `text`, runs it through the dispatcher and returns the response.
pub async fn answer(handle: &DispatcherHandle, text: &str) -> Response {
    let request: Request = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(e) => {
            debug!("Undecodable request: {e}");
            return Response::failure(format!("Invalid request: {e}"));
        }
    };
    match handle.request(request).await {
        Ok(response) => response,
        Err(e) => Response::failure(e),
    }
}

/// Serializes an outgoing message; `None` (logged) if that is impossible.
pub fn encode<T: Serialize>(message: &T) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(json) => Some(json),
        Err(e) => {
            error!("JSON serialization error: {e}");
            None
        }
    }
}
