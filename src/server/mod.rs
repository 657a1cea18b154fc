//! 守护进程的网络层：控制协议服务器、发布/订阅网关以及应用装配。

pub mod app;
pub mod handlers;
pub mod pubsub;
pub mod rpc;

pub use app::{App, Running};
pub use handlers::Dispatcher;
pub use pubsub::Gateway;
