//! 文本控制协议：请求的词法与语法分析、`show` 的路径路由以及响应的序列化。

pub mod lexer;
pub mod parser;
pub mod router;
pub mod serializers;

pub use parser::{Format, Request, Value, parse};
pub use router::Router;
pub use serializers::{Output, StatusInfo, frame, render};
