pub mod config;
pub mod logging;
pub mod protocol;

pub use config::Config;
pub use logging::tracing::init_tracing;
pub use protocol::{
    ClientItem, ClientMessage, DecodeError, Error, ErrorCode, ErrorKind, FailResponse,
    JsonRpcMessage, Notification, Request, RequestId, ResponseError, Result, ServerItem,
    ServerMessage, SuccessResponse,
};
