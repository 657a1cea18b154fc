//! 请求解析。
//!
//! ```text
//! request      = cmd (value)* cmd_options? req_options? heredoc?
//! cmd_options  = '[' option_list ']'
//! req_options  = '#:' option_list
//! option_list  = option (',' option)*
//! option       = NAME ('=' value)?
//! ```
//!
//! 在 `name=value` 之后出现的不带值的选项会被并入前一个选项，形成列表，
//! 所以 `[type=so,al,source=qq]` 中 `type` 的值是 `[so, al]`。

use std::collections::BTreeMap;
use std::fmt;
use std::iter::Peekable;
use std::vec::IntoIter;

use serde::Serialize;

use super::lexer::{Token, TokenKind, tokenize};
use crate::error::{FuoError, Result};

/// 参数或选项的值。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// 字符串
    Str(String),
    /// 整数
    Int(i64),
    /// 浮点数
    Float(f64),
    /// 布尔值，只出现在选项中
    Bool(bool),
    /// 资源 URI
    Furi(String),
    /// 逗号连接的多个值
    List(Vec<Value>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) | Value::Furi(s) => f.write_str(s),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::List(items) => {
                let items: Vec<String> = items.iter().map(ToString::to_string).collect();
                f.write_str(&items.join(","))
            }
        }
    }
}

impl Value {
    /// 转为字符串列表，单个值视为只有一个元素的列表。
    pub fn to_str_list(&self) -> Vec<String> {
        match self {
            Value::List(items) => items.iter().map(ToString::to_string).collect(),
            other => vec![other.to_string()],
        }
    }

    /// 数值形式，字符串会尝试解析。
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(v) => Some(*v),
            Value::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    fn from_arg(kind: TokenKind) -> Option<Self> {
        Some(match kind {
            TokenKind::Name(s) | TokenKind::Str(s) | TokenKind::Unquoted(s) => Value::Str(s),
            TokenKind::Int(i) => Value::Int(i),
            TokenKind::Float(v) => Value::Float(v),
            TokenKind::Furi(s) => Value::Furi(s),
            _ => return None,
        })
    }

    fn from_option(kind: TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Name(s) | TokenKind::Unquoted(s) if s.eq_ignore_ascii_case("true") => {
                Some(Value::Bool(true))
            }
            TokenKind::Name(s) | TokenKind::Unquoted(s) if s.eq_ignore_ascii_case("false") => {
                Some(Value::Bool(false))
            }
            other => Self::from_arg(other),
        }
    }
}

/// 响应格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// 纯文本
    #[default]
    Plain,
    /// JSON
    Json,
}

/// 一个解析后的请求。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Request {
    /// 命令名
    pub cmd: String,
    /// 命令参数。heredoc 的内容会作为最后一个参数。
    pub cmd_args: Vec<Value>,
    /// `[...]` 中的命令选项
    pub cmd_options: BTreeMap<String, Value>,
    /// `#:` 之后的请求选项，例如 `format`
    pub options: BTreeMap<String, Value>,
    /// heredoc 的结束标记
    pub heredoc_word: Option<String>,
}

impl Request {
    /// 是否还需要读取 heredoc 的内容。
    pub fn has_heredoc(&self) -> bool {
        self.heredoc_word.is_some()
    }

    /// 把 heredoc 的内容追加为最后一个参数。
    pub fn set_heredoc_body(&mut self, body: String) {
        self.cmd_args.push(Value::Str(body));
    }

    /// 请求的响应格式，由 `format` 选项决定。
    pub fn format(&self) -> Result<Format> {
        match self.options.get("format") {
            None => Ok(Format::Plain),
            Some(v) => match v.to_string().to_lowercase().as_str() {
                "plain" => Ok(Format::Plain),
                "json" => Ok(Format::Json),
                other => Err(FuoError::Cmd(format!("未知的响应格式: {other}"))),
            },
        }
    }

    /// 以空格连接的参数。有 heredoc 时最后一个参数显示为 `<<WORD`。
    pub fn args_text(&self) -> String {
        let mut args: Vec<String> = self.cmd_args.iter().map(ToString::to_string).collect();
        if let Some(word) = &self.heredoc_word {
            args.pop();
            args.push(format!("<<{word}"));
        }
        args.join(" ")
    }
}

struct Parser {
    tokens: Peekable<IntoIter<Token>>,
}

impl Parser {
    fn unexpected(token: Token) -> FuoError {
        FuoError::syntax(token.column, token.kind.text())
    }

    fn parse_option_list(&mut self, closing: bool) -> Result<BTreeMap<String, Value>> {
        let mut options = BTreeMap::new();
        let mut last_valued: Option<String> = None;

        loop {
            let token = match self.tokens.next() {
                Some(t) => t,
                None if closing => return Err(FuoError::syntax(0, "缺少 ']'")),
                None => break,
            };
            let name = match token.kind {
                TokenKind::Name(name) => name,
                TokenKind::RBracket if closing && options.is_empty() => break,
                _ => return Err(Self::unexpected(token)),
            };

            if self
                .tokens
                .next_if(|t| t.kind == TokenKind::Equals)
                .is_some()
            {
                let token = self
                    .tokens
                    .next()
                    .ok_or_else(|| FuoError::syntax(token.column, format!("{name}=")))?;
                let column = token.column;
                let value = Value::from_option(token.kind.clone())
                    .ok_or_else(|| FuoError::syntax(column, token.kind.text()))?;
                options.insert(name.clone(), value);
                last_valued = Some(name);
            } else if let Some(prev) = &last_valued
                && let Some(value) = options.get_mut(prev)
            {
                let item = Value::Str(name);
                match value {
                    Value::List(items) => items.push(item),
                    other => *other = Value::List(vec![other.clone(), item]),
                }
            } else {
                options.insert(name, Value::Bool(true));
            }

            match self.tokens.peek().map(|t| &t.kind) {
                Some(TokenKind::Comma) => {
                    self.tokens.next();
                }
                Some(TokenKind::RBracket) if closing => {
                    self.tokens.next();
                    break;
                }
                Some(TokenKind::Heredoc(_)) | None if !closing => break,
                Some(_) => {
                    let token = self.tokens.next().ok_or_else(|| FuoError::syntax(0, ""))?;
                    return Err(Self::unexpected(token));
                }
                None => return Err(FuoError::syntax(0, "缺少 ']'")),
            }
        }
        Ok(options)
    }

    fn parse(mut self) -> Result<Request> {
        let first = self
            .tokens
            .next()
            .ok_or_else(|| FuoError::syntax(0, "空请求"))?;
        let TokenKind::Name(cmd) = first.kind else {
            return Err(Self::unexpected(first));
        };
        let mut request = Request {
            cmd,
            ..Default::default()
        };

        while let Some(token) = self.tokens.next_if(|t| {
            !matches!(
                t.kind,
                TokenKind::LBracket | TokenKind::ReqOptions | TokenKind::Heredoc(_)
            )
        }) {
            let column = token.column;
            let text = token.kind.text();
            let value =
                Value::from_arg(token.kind).ok_or_else(|| FuoError::syntax(column, text))?;
            request.cmd_args.push(value);
        }

        if self
            .tokens
            .next_if(|t| t.kind == TokenKind::LBracket)
            .is_some()
        {
            request.cmd_options = self.parse_option_list(true)?;
        }
        if self
            .tokens
            .next_if(|t| t.kind == TokenKind::ReqOptions)
            .is_some()
        {
            request.options = self.parse_option_list(false)?;
        }
        if let Some(token) = self.tokens.next() {
            match token.kind {
                TokenKind::Heredoc(word) => request.heredoc_word = Some(word),
                _ => return Err(Self::unexpected(token)),
            }
        }
        if let Some(token) = self.tokens.next() {
            return Err(Self::unexpected(token));
        }
        Ok(request)
    }
}

/// 解析一行请求。
///
/// # 返回
/// 无法识别的内容会返回带列号的 `FuoError::Syntax`。
pub fn parse(line: &str) -> Result<Request> {
    let tokens = tokenize(line.trim_end_matches(['\r', '\n']))?;
    Parser {
        tokens: tokens.into_iter().peekable(),
    }
    .parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_command() {
        let req = parse("status\n").unwrap();
        assert_eq!(req.cmd, "status");
        assert!(req.cmd_args.is_empty());
        assert_eq!(req.format().unwrap(), Format::Plain);
    }

    #[test]
    fn test_args_and_options() {
        let req = parse(r#"search "晴天 周杰伦" [type=so,al,source=qq,local,fuzzy] #: format=json"#)
            .unwrap();
        assert_eq!(req.cmd_args, vec![Value::Str("晴天 周杰伦".into())]);
        assert_eq!(
            req.cmd_options["type"].to_str_list(),
            vec!["so".to_string(), "al".to_string()]
        );
        assert_eq!(
            req.cmd_options["source"].to_str_list(),
            vec!["qq", "local", "fuzzy"]
        );
        assert_eq!(req.format().unwrap(), Format::Json);
    }

    #[test]
    fn test_bare_option_is_true_and_bools_coerce() {
        let req = parse("set [verbose, mute=FALSE, volume=30]").unwrap();
        assert_eq!(req.cmd_options["verbose"], Value::Bool(true));
        assert_eq!(req.cmd_options["mute"], Value::Bool(false));
        assert_eq!(req.cmd_options["volume"], Value::Int(30));
        // 参数中的 true 不会被转换
        let req = parse("echo true").unwrap();
        assert_eq!(req.cmd_args, vec![Value::Str("true".into())]);
    }

    #[test]
    fn test_heredoc() {
        let mut req = parse("exec <<EOF").unwrap();
        assert_eq!(req.heredoc_word.as_deref(), Some("EOF"));
        req.set_heredoc_body("status\nlist".into());
        assert_eq!(req.args_text(), "<<EOF");
        assert_eq!(req.cmd_args.len(), 1);
    }

    #[test]
    fn test_tail_garbage_has_column() {
        let err = parse("play fuo://local/songs/1 [a=1] extra").unwrap_err();
        assert!(
            matches!(&err, FuoError::Syntax { column: 31, text } if text == "extra"),
            "{err:?}"
        );
        assert!(parse("[a=1]").is_err());
        assert!(parse("play [a=1").is_err());
        assert!(parse("play <<EOF more").is_err());
    }
}
