//! Page-side scripts and the evaluation helper that runs them.

use chromiumoxide::Page;
use serde_json::Value;
use std::time::Duration;
use vigil_engine::host::HostError;

/// Default timeout for JavaScript evaluation (10 seconds).
/// This prevents hanging when dialogs (alert/confirm/prompt) block the JS thread.
const EVAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum retries for context errors during page navigation.
const MAX_CONTEXT_RETRIES: u32 = 10;

/// Delay between retries when context is not found (page navigating).
const CONTEXT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Check if an error indicates the page context is unavailable (e.g., during navigation).
fn is_context_error(err: &str) -> bool {
    err.contains("Cannot find context")
        || err.contains("Execution context was destroyed")
        || err.contains("-32000")
}

enum EvalError {
    Timeout,
    Context(String),
    Other(String),
}

/// Evaluate `expression` in `page`, retrying while the page is between
/// documents. Scripts must return a non-null JSON value.
pub async fn evaluate(page: &Page, expression: &str) -> Result<Value, HostError> {
    let mut last_error = None;

    for attempt in 0..MAX_CONTEXT_RETRIES {
        match evaluate_with_timeout(page, expression).await {
            Ok(value) => return Ok(value),
            Err(EvalError::Timeout) => {
                return Err(HostError::Script(
                    "Evaluation timed out - possibly blocked by a dialog".into(),
                ));
            }
            Err(EvalError::Context(err_str)) => {
                tracing::debug!(
                    "Context error during evaluation (attempt {}/{}), retrying...",
                    attempt + 1,
                    MAX_CONTEXT_RETRIES
                );
                last_error = Some(err_str);
                tokio::time::sleep(CONTEXT_RETRY_DELAY).await;
            }
            Err(EvalError::Other(err_str)) => return Err(HostError::Script(err_str)),
        }
    }

    Err(HostError::Script(last_error.unwrap_or_else(|| {
        "Evaluation failed after retries".to_string()
    })))
}

async fn evaluate_with_timeout(page: &Page, expression: &str) -> Result<Value, EvalError> {
    let eval_result = tokio::time::timeout(EVAL_TIMEOUT, page.evaluate(expression)).await;

    match eval_result {
        Err(_) => Err(EvalError::Timeout),
        Ok(Err(e)) => {
            let err_str = e.to_string();
            if is_context_error(&err_str) {
                Err(EvalError::Context(err_str))
            } else {
                Err(EvalError::Other(err_str))
            }
        }
        Ok(Ok(remote_object)) => remote_object
            .into_value::<Value>()
            .map_err(|e| EvalError::Other(format!("Failed to get result: {}", e))),
    }
}

/// `{found, text}` for the first element matching `selector`.
pub fn element_text_script(selector: &str) -> Result<String, HostError> {
    let selector = serde_json::to_string(selector)?;
    Ok(format!(
        "(() => {{ const el = document.querySelector({selector}); \
         return el ? {{ found: true, text: el.innerText || el.textContent || '' }} \
         : {{ found: false, text: '' }}; }})()"
    ))
}

pub const BODY_TEXT_SCRIPT: &str =
    "(() => (document.body && document.body.innerText) ? document.body.innerText : '')()";

/// Fixed-position banner at the top of the page, removed after `duration`.
pub fn banner_script(message: &str, duration: Duration) -> Result<String, HostError> {
    let message = serde_json::to_string(message)?;
    let millis = duration.as_millis();
    Ok(format!(
        r#"(() => {{
  const el = document.createElement('div');
  el.id = 'vigil-banner';
  el.textContent = {message};
  el.style.cssText = 'position:fixed;top:20px;left:50%;transform:translateX(-50%);' +
    'background:#6c5ce7;color:white;padding:15px 25px;border-radius:10px;' +
    'font:bold 14px sans-serif;z-index:999999;box-shadow:0 10px 40px rgba(0,0,0,0.3);';
  (document.body || document.documentElement).appendChild(el);
  setTimeout(() => el.remove(), {millis});
  return true;
}})()"#
    ))
}

/// Read the `{found, text}` object produced by [`element_text_script`].
pub fn parse_element_text(value: &Value) -> Option<String> {
    if !value.get("found").and_then(Value::as_bool).unwrap_or(false) {
        return None;
    }
    Some(
        value
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    )
}
