//! CDP page session for interacting with a single page.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use tracing::debug;

use crate::client::Channel;
use crate::error::CdpError;
use crate::protocol::{
    ExceptionDetails, KeyEventType, MouseButton, MouseEventType, ScreenshotClip,
};

/// A flattened session attached to a single page target.
pub struct PageSession {
    target_id: String,
    session_id: String,
    channel: Arc<Channel>,
}

impl PageSession {
    pub(crate) fn new(target_id: String, session_id: String, channel: Arc<Channel>) -> Self {
        Self {
            target_id,
            session_id,
            channel,
        }
    }

    /// Get target ID.
    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Get session ID.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Send a CDP command to this page session.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        self.channel
            .call(method, params, Some(&self.session_id))
            .await
    }

    /// Enable required CDP domains.
    pub(crate) async fn enable_domains(&self) -> Result<(), CdpError> {
        self.call("Page.enable", None).await?;
        self.call("Runtime.enable", None).await?;

        debug!("Enabled CDP domains for session {}", self.session_id);
        Ok(())
    }

    /// Current document URL.
    pub async fn get_url(&self) -> Result<String, CdpError> {
        let result = self.evaluate("window.location.href").await?;
        Ok(result.as_str().unwrap_or_default().to_string())
    }

    /// Evaluate an expression and return its value.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, CdpError> {
        let result = self
            .call(
                "Runtime.evaluate",
                Some(json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                })),
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let message = serde_json::from_value::<ExceptionDetails>(exception.clone())
                .map(|details| details.message())
                .unwrap_or_else(|_| {
                    exception["text"]
                        .as_str()
                        .unwrap_or("Unknown error")
                        .to_string()
                });
            return Err(CdpError::JavaScript(message));
        }

        Ok(result["result"]["value"].clone())
    }

    /// Invoke a function expression with JSON arguments, as `(fn)(...args)`.
    pub async fn evaluate_function(
        &self,
        function: &str,
        args: &[Value],
    ) -> Result<Value, CdpError> {
        let expression = function_call_expression(function, args)?;
        self.evaluate(&expression).await
    }

    /// Capture a screenshot and return the decoded image bytes.
    pub async fn screenshot(
        &self,
        format: &str,
        quality: Option<u8>,
        full_page: bool,
        clip: Option<ScreenshotClip>,
    ) -> Result<Vec<u8>, CdpError> {
        let mut params = json!({
            "format": format,
            "captureBeyondViewport": full_page,
        });

        if let Some(q) = quality {
            params["quality"] = json!(q);
        }

        if let Some(c) = clip {
            params["clip"] = serde_json::to_value(c)?;
        }

        let result = self.call("Page.captureScreenshot", Some(params)).await?;

        let data = result["data"]
            .as_str()
            .ok_or_else(|| CdpError::InvalidResponse("Missing screenshot data".to_string()))?;
        STANDARD
            .decode(data)
            .map_err(|e| CdpError::InvalidResponse(format!("Screenshot data: {}", e)))
    }

    /// Override the viewport size.
    pub async fn set_viewport(&self, width: u32, height: u32) -> Result<(), CdpError> {
        self.call(
            "Emulation.setDeviceMetricsOverride",
            Some(json!({
                "width": width,
                "height": height,
                "deviceScaleFactor": 1,
                "mobile": false,
            })),
        )
        .await?;
        Ok(())
    }

    /// Move the mouse.
    pub async fn mouse_move(&self, x: f64, y: f64) -> Result<(), CdpError> {
        self.call(
            "Input.dispatchMouseEvent",
            Some(json!({
                "type": MouseEventType::MouseMoved,
                "x": x,
                "y": y,
                "button": MouseButton::None,
            })),
        )
        .await?;
        Ok(())
    }

    /// Left click at coordinates.
    pub async fn click(&self, x: f64, y: f64) -> Result<(), CdpError> {
        self.mouse_move(x, y).await?;
        for event_type in [MouseEventType::MousePressed, MouseEventType::MouseReleased] {
            self.call(
                "Input.dispatchMouseEvent",
                Some(json!({
                    "type": event_type,
                    "x": x,
                    "y": y,
                    "button": MouseButton::Left,
                    "clickCount": 1,
                })),
            )
            .await?;
        }
        Ok(())
    }

    /// Dispatch a mouse wheel event.
    pub async fn scroll(&self, x: f64, y: f64, delta_x: f64, delta_y: f64) -> Result<(), CdpError> {
        self.call(
            "Input.dispatchMouseEvent",
            Some(json!({
                "type": MouseEventType::MouseWheel,
                "x": x,
                "y": y,
                "deltaX": delta_x,
                "deltaY": delta_y,
            })),
        )
        .await?;
        Ok(())
    }

    /// Press and release a key.
    pub async fn press_key(&self, key: &str) -> Result<(), CdpError> {
        for event_type in [KeyEventType::KeyDown, KeyEventType::KeyUp] {
            self.call(
                "Input.dispatchKeyEvent",
                Some(json!({
                    "type": event_type,
                    "key": key,
                })),
            )
            .await?;
        }
        Ok(())
    }
}

/// Build the `(fn)(...args)` expression sent to `Runtime.evaluate`.
pub(crate) fn function_call_expression(function: &str, args: &[Value]) -> Result<String, CdpError> {
    let args = serde_json::to_string(args)?;
    Ok(format!("({})(...{})", function.trim(), args))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_call_expression() {
        let expr = function_call_expression(" (a, b) => a + b ", &[json!(1), json!(2)]).unwrap();
        assert_eq!(expr, "((a, b) => a + b)(...[1,2])");
    }

    #[test]
    fn test_function_call_expression_without_args() {
        let expr = function_call_expression("() => document.title", &[]).unwrap();
        assert_eq!(expr, "(() => document.title)(...[])");
    }

    #[test]
    fn test_function_call_expression_escapes_strings() {
        let expr = function_call_expression("(s) => s", &[json!("a\"b")]).unwrap();
        assert_eq!(expr, r#"((s) => s)(...["a\"b"])"#);
    }
}
