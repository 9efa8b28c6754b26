use rpc_core::{Error, RequestId, Result, SuccessResponse};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

pub(crate) type Resolver = oneshot::Sender<Result<SuccessResponse>>;
pub(crate) type Resolution = oneshot::Receiver<Result<SuccessResponse>>;

struct PendingCall {
    serial: u64,
    resolver: Resolver,
}

#[derive(Default)]
struct Table {
    calls: HashMap<RequestId, PendingCall>,
    next_serial: u64,
    closed: bool,
}

/// Outstanding requests keyed by id. Each entry is resolved at most once.
#[derive(Default)]
pub(crate) struct PendingCalls {
    table: Mutex<Table>,
}

impl PendingCalls {
    /// Register a call under `id`. The returned serial identifies this
    /// registration when it is removed later.
    pub fn register(&self, id: RequestId) -> Result<(u64, Resolution)> {
        let mut table = self.lock()?;
        if table.closed {
            return Err(Error::Closed);
        }
        if table.calls.contains_key(&id) {
            return Err(Error::DuplicateRequestId(id));
        }

        let (resolver, resolution) = oneshot::channel();
        table.next_serial += 1;
        let serial = table.next_serial;
        table.calls.insert(id, PendingCall { serial, resolver });
        Ok((serial, resolution))
    }

    /// Resolve and remove the call registered under `id`. Returns false if
    /// there is none.
    pub fn resolve(&self, id: &RequestId, result: Result<SuccessResponse>) -> bool {
        let call = match self.lock() {
            Ok(mut table) => table.calls.remove(id),
            Err(_) => None,
        };
        match call {
            Some(call) => {
                // The caller may have given up already
                let _ = call.resolver.send(result);
                true
            }
            None => false,
        }
    }

    /// Drop the entry for `id` if it still belongs to registration `serial`
    pub fn remove(&self, id: &RequestId, serial: u64) {
        if let Ok(mut table) = self.lock() {
            if table.calls.get(id).map(|call| call.serial) == Some(serial) {
                table.calls.remove(id);
                debug!("Removed abandoned call {}", id);
            }
        }
    }

    /// Resolve every call with a clone of `error` and refuse new ones
    pub fn fail_all(&self, error: Error) {
        let calls: Vec<PendingCall> = match self.lock() {
            Ok(mut table) => {
                table.closed = true;
                table.calls.drain().map(|(_, call)| call).collect()
            }
            Err(_) => Vec::new(),
        };
        if !calls.is_empty() {
            debug!("Failing {} pending call(s): {}", calls.len(), error);
        }
        for call in calls {
            let _ = call.resolver.send(Err(error.clone()));
        }
    }

    pub fn len(&self) -> usize {
        self.lock().map(|table| table.calls.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Table>> {
        self.table.lock().map_err(|_| {
            warn!("Pending call table lock poisoned");
            Error::Closed
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_resolve_by_exact_id() {
        let pending = PendingCalls::default();
        let (_, by_number) = pending.register(RequestId::Number(1)).unwrap();
        let (_, by_string) = pending.register(RequestId::from("1")).unwrap();

        let response = SuccessResponse::new(RequestId::from("1"), json!("s"));
        assert!(pending.resolve(&RequestId::from("1"), Ok(response.clone())));
        assert_eq!(by_string.await.unwrap().unwrap(), response);
        assert_eq!(pending.len(), 1);

        assert!(!pending.resolve(&RequestId::Number(2), Err(Error::Closed)));
        pending.fail_all(Error::ConnectionClosed);
        assert!(matches!(by_number.await.unwrap(), Err(Error::ConnectionClosed)));
    }

    #[test]
    fn test_duplicate_and_closed_registrations_fail() {
        let pending = PendingCalls::default();
        let _call = pending.register(RequestId::Number(1)).unwrap();
        assert!(matches!(
            pending.register(RequestId::Number(1)),
            Err(Error::DuplicateRequestId(RequestId::Number(1)))
        ));

        pending.fail_all(Error::ConnectionClosed);
        assert!(matches!(pending.register(RequestId::Number(2)), Err(Error::Closed)));
    }

    #[test]
    fn test_remove_ignores_newer_registration() {
        let pending = PendingCalls::default();
        let (old_serial, _old) = pending.register(RequestId::Number(1)).unwrap();
        pending.remove(&RequestId::Number(1), old_serial);
        let (_new_serial, _new) = pending.register(RequestId::Number(1)).unwrap();

        pending.remove(&RequestId::Number(1), old_serial);
        assert_eq!(pending.len(), 1);
    }
}
