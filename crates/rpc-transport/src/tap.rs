use rpc_core::Result;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;

use crate::transport::Transport;

type Hook<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Observes traffic through a transport without changing it
pub struct Tap<In, Out> {
    on_outbound: Option<Hook<In>>,
    on_inbound: Option<Hook<Result<Out>>>,
}

impl<In, Out> Clone for Tap<In, Out> {
    fn clone(&self) -> Self {
        Self {
            on_outbound: self.on_outbound.clone(),
            on_inbound: self.on_inbound.clone(),
        }
    }
}

impl<In, Out> Default for Tap<In, Out> {
    fn default() -> Self {
        Self {
            on_outbound: None,
            on_inbound: None,
        }
    }
}

impl<In: Send + 'static, Out: Send + 'static> Tap<In, Out> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outbound(mut self, hook: impl Fn(&In) + Send + Sync + 'static) -> Self {
        self.on_outbound = Some(Arc::new(hook));
        self
    }

    pub fn inbound(mut self, hook: impl Fn(&Result<Out>) + Send + Sync + 'static) -> Self {
        self.on_inbound = Some(Arc::new(hook));
        self
    }

    pub fn apply(&self, transport: Transport<In, Out>) -> Transport<In, Out> {
        let on_outbound = self.on_outbound.clone();
        let on_inbound = self.on_inbound.clone();
        transport.map(
            move |value: In| {
                if let Some(hook) = &on_outbound {
                    hook(&value);
                }
                Ok(value)
            },
            move |item: Result<Out>| {
                if let Some(hook) = &on_inbound {
                    hook(&item);
                }
                Some(item)
            },
        )
    }
}

impl<In, Out> Tap<In, Out>
where
    In: Debug + Send + 'static,
    Out: Debug + Send + 'static,
{
    /// A tap that logs every message at debug level under `label`
    pub fn logging(label: &'static str) -> Self {
        Self::new()
            .outbound(move |value| debug!("[{}] >> {:?}", label, value))
            .inbound(move |item| debug!("[{}] << {:?}", label, item))
    }
}
