use rpc_core::{Error, ResponseError, Result};
use rpc_runtime::Router;
use serde_json::{json, Value};
use tracing::info;

/// Methods answered by `rpc serve`
pub fn builtin_router() -> Router {
    Router::new()
        .method("ping", |_| async { Ok(json!("pong")) })
        .method("echo", |params| async move { Ok(params.unwrap_or(Value::Null)) })
        .method("sum", |params| async move { sum(params) })
        .notification("log", |params| async move {
            let params = params.unwrap_or(Value::Null);
            info!("log: {}", params);
            Ok(())
        })
}

/// Integers sum to an integer; anything else numeric sums to a float
fn sum(params: Option<Value>) -> Result<Value> {
    let numbers = match params {
        Some(Value::Array(numbers)) => numbers,
        _ => return Err(invalid("sum expects an array of numbers")),
    };

    if let Some(integers) = numbers.iter().map(Value::as_i64).collect::<Option<Vec<_>>>() {
        return integers
            .into_iter()
            .try_fold(0i64, i64::checked_add)
            .map(|total| json!(total))
            .ok_or_else(|| invalid("sum overflows a 64-bit integer"));
    }

    numbers
        .iter()
        .map(Value::as_f64)
        .sum::<Option<f64>>()
        .map(|total| json!(total))
        .ok_or_else(|| invalid("sum expects an array of numbers"))
}

fn invalid(message: &str) -> Error {
    Error::Remote(ResponseError::invalid_params(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum() {
        assert_eq!(sum(Some(json!([1, 2, 3]))).unwrap(), json!(6));
        assert_eq!(sum(Some(json!([]))).unwrap(), json!(0));
        assert_eq!(sum(Some(json!([1, 2.5]))).unwrap(), json!(3.5));
    }

    #[test]
    fn test_sum_rejects_bad_params() {
        for params in [None, Some(json!("1,2")), Some(json!([1, "2"])), Some(json!([i64::MAX, 1]))] {
            match sum(params) {
                Err(Error::Remote(error)) => assert_eq!(error.code, rpc_core::ErrorCode::INVALID_PARAMS),
                other => panic!("expected invalid params, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_log_notification_accepts_any_params() {
        let handler = builtin_router().notification_handler();
        for params in [None, Some(json!({"msg": "hi"}))] {
            let notification = rpc_core::Notification::new("log", params);
            assert!(handler.call(notification).await.is_ok());
        }
    }
}
