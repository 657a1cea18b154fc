//! 请求行的词法分析器。
//!
//! 分词依赖上下文：`,` 和 `=` 只在 `[...]` 或 `#:` 之后才是分隔符，
//! 其它位置属于普通的参数，例如 `play http://a.com/?x=1,2`。

use crate::error::{FuoError, Result};

/// 一个词法单元。
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// 形如标识符的单词
    Name(String),
    /// 双引号字符串
    Str(String),
    /// 整数
    Int(i64),
    /// 浮点数
    Float(f64),
    /// `fuo://` 开头的 URI
    Furi(String),
    /// 其它不带引号的文本
    Unquoted(String),
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `,`
    Comma,
    /// `=`
    Equals,
    /// `#:`
    ReqOptions,
    /// `<<WORD`
    Heredoc(String),
}

/// 带位置的词法单元，`column` 为从 0 开始的字符列号。
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// 词法单元
    pub kind: TokenKind,
    /// 起始列
    pub column: usize,
}

impl TokenKind {
    /// 出错时展示的文本。
    pub fn text(&self) -> String {
        match self {
            TokenKind::Name(s) | TokenKind::Unquoted(s) | TokenKind::Furi(s) => s.clone(),
            TokenKind::Str(s) => format!("\"{s}\""),
            TokenKind::Int(i) => i.to_string(),
            TokenKind::Float(f) => f.to_string(),
            TokenKind::LBracket => "[".into(),
            TokenKind::RBracket => "]".into(),
            TokenKind::Comma => ",".into(),
            TokenKind::Equals => "=".into(),
            TokenKind::ReqOptions => "#:".into(),
            TokenKind::Heredoc(word) => format!("<<{word}"),
        }
    }
}

fn is_name(word: &str) -> bool {
    let mut chars = word.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn classify(word: String) -> TokenKind {
    if word.starts_with("fuo://") {
        return TokenKind::Furi(word);
    }
    if let Ok(i) = word.parse::<i64>() {
        return TokenKind::Int(i);
    }
    if word.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '.')
        && let Ok(f) = word.parse::<f64>()
        && f.is_finite()
    {
        return TokenKind::Float(f);
    }
    if is_name(&word) {
        TokenKind::Name(word)
    } else {
        TokenKind::Unquoted(word)
    }
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    /// 处于 `[...]` 内或 `#:` 之后
    in_options: bool,
    tokens: Vec<Token>,
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn push(&mut self, kind: TokenKind, column: usize) {
        self.tokens.push(Token { kind, column });
    }

    fn is_delimiter(&self, c: char) -> bool {
        c.is_whitespace() || (self.in_options && matches!(c, ',' | '=' | ']'))
    }

    fn read_string(&mut self) -> Result<String> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                '"' => return Ok(out),
                '\\' => match self.peek() {
                    Some(escaped @ ('"' | '\\')) => {
                        out.push(escaped);
                        self.pos += 1;
                    }
                    Some('n') => {
                        out.push('\n');
                        self.pos += 1;
                    }
                    Some('t') => {
                        out.push('\t');
                        self.pos += 1;
                    }
                    _ => out.push('\\'),
                },
                other => out.push(other),
            }
        }
        let text: String = self.chars[start..].iter().collect();
        Err(FuoError::syntax(start, format!("未闭合的字符串 {text}")))
    }

    fn read_word(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if self.is_delimiter(c) {
                break;
            }
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn run(mut self) -> Result<Vec<Token>> {
        while let Some(c) = self.peek() {
            let column = self.pos;
            if c.is_whitespace() {
                self.pos += 1;
                continue;
            }
            match c {
                '"' => {
                    let s = self.read_string()?;
                    self.push(TokenKind::Str(s), column);
                }
                '[' if !self.in_options => {
                    self.pos += 1;
                    self.in_options = true;
                    self.push(TokenKind::LBracket, column);
                }
                ']' if self.in_options => {
                    self.pos += 1;
                    self.in_options = false;
                    self.push(TokenKind::RBracket, column);
                }
                ',' if self.in_options => {
                    self.pos += 1;
                    self.push(TokenKind::Comma, column);
                }
                '=' if self.in_options => {
                    self.pos += 1;
                    self.push(TokenKind::Equals, column);
                }
                '#' if self.peek_at(1) == Some(':') => {
                    self.pos += 2;
                    self.in_options = true;
                    self.push(TokenKind::ReqOptions, column);
                }
                '<' if self.peek_at(1) == Some('<') => {
                    self.pos += 2;
                    let word = self.read_word();
                    if word.is_empty() {
                        return Err(FuoError::syntax(column, "<<"));
                    }
                    self.push(TokenKind::Heredoc(word), column);
                }
                _ => {
                    let word = self.read_word();
                    self.push(classify(word), column);
                }
            }
        }
        Ok(self.tokens)
    }
}

/// 将一行请求切分为词法单元。
pub fn tokenize(line: &str) -> Result<Vec<Token>> {
    Lexer {
        chars: line.chars().collect(),
        pos: 0,
        in_options: false,
        tokens: Vec::new(),
    }
    .run()
}
