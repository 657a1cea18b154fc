//! 定义了整个 `feeluown_rs` 库的错误类型 `FuoError`。

use std::io;
use thiserror::Error;

/// `feeluown_rs` 库的通用错误枚举。
#[derive(Error, Debug)]
pub enum FuoError {
    /// JSON 解析失败 (源自 `serde_json::Error`)
    #[error("JSON 解析失败: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// TOML 解析失败 (源自 `toml::de::Error`)
    #[error("TOML 解析失败: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// 整数解析失败 (源自 `std::num::ParseIntError`)
    #[error("整数解析失败: {0}")]
    ParseInt(#[from] std::num::ParseIntError),

    /// I/O 错误 (源自 `io::Error`)
    #[error("I/O 错误: {0}")]
    Io(#[from] io::Error),

    /// URI 无法解析，或者找不到对应的提供商/资源
    #[error("无法解析资源: {0}")]
    ResolveFailed(String),

    /// 提供商的网络或 I/O 故障，调用方可以自行决定是否重试
    #[error("提供商 '{provider}' 出错: {message}")]
    ProviderIo {
        /// 出错的提供商标识
        provider: String,
        /// 错误信息
        message: String,
    },

    /// 提供商不具备请求的能力
    #[error("不支持的操作: {0}")]
    NotSupported(String),

    /// Reader 的 `read_func` 失败或者返回了错误的数量
    #[error("读取失败: {0}")]
    ReadFailed(String),

    /// 协议语法错误
    #[error("语法错误 (第 {column} 列): {text}")]
    Syntax {
        /// 出错的列号，从 0 开始
        column: usize,
        /// 出错位置的文本
        text: String,
    },

    /// 路由没有匹配
    #[error("未找到: {0}")]
    NotFound(String),

    /// 命令执行失败，信息会直接展示给用户
    #[error("{0}")]
    Cmd(String),

    /// 非法的音质排序策略
    #[error("非法的排序策略: '{0}'")]
    InvalidPolicy(String),

    /// 同标识的对象已存在
    #[error("已存在: {0}")]
    AlreadyExists(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),
}

impl FuoError {
    /// 创建一个 `ProviderIo` 错误。
    pub fn provider_io(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderIo {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// 创建一个 `Syntax` 错误。
    pub fn syntax(column: usize, text: impl Into<String>) -> Self {
        Self::Syntax {
            column,
            text: text.into(),
        }
    }

    /// 该错误是否由提供商的故障引起，搜索时会重试一次。
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::ProviderIo { .. } | Self::Io(_))
    }
}

/// `FuoError` 的 `Result` 类型别名，方便在函数签名中使用。
pub type Result<T> = std::result::Result<T, FuoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_message_carries_column() {
        let err = FuoError::syntax(7, "]]");
        assert_eq!(err.to_string(), "语法错误 (第 7 列): ]]");
    }

    #[test]
    fn test_io_errors_are_retriable() {
        let err: FuoError = io::Error::new(io::ErrorKind::TimedOut, "timeout").into();
        assert!(err.is_retriable());
        assert!(FuoError::provider_io("netease", "502").is_retriable());
        assert!(!FuoError::NotSupported("song_get".into()).is_retriable());
    }
}
