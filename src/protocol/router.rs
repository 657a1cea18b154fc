//! 路径路由，用于 `show` 命令。
//!
//! 模式中 `<name>` 表示一个捕获段，例如 `/<provider>/songs/<id>`。

use std::collections::HashMap;

use tracing::trace;

use crate::error::{FuoError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Capture(String),
}

fn compile(pattern: &str) -> Vec<Segment> {
    pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| match s.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
            Some(name) => Segment::Capture(name.to_string()),
            None => Segment::Literal(s.to_string()),
        })
        .collect()
}

/// 一次匹配的结果。
#[derive(Debug)]
pub struct Match<'a, H> {
    /// 匹配到的处理器
    pub handler: &'a H,
    /// 路径中的捕获
    pub params: HashMap<String, String>,
    /// 查询字符串中的参数
    pub query: HashMap<String, String>,
}

impl<H> Match<'_, H> {
    /// 读取一个捕获，路由模式保证它存在。
    pub fn param(&self, name: &str) -> &str {
        self.params.get(name).map_or("", String::as_str)
    }
}

/// 按注册顺序匹配的路由表。
#[derive(Debug)]
pub struct Router<H> {
    routes: Vec<(Vec<Segment>, H)>,
}

impl<H> Default for Router<H> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

/// 解析查询字符串，`+` 视为空格。
pub fn parse_query(query: &str) -> HashMap<String, String> {
    let decode = |s: &str| {
        let s = s.replace('+', " ");
        urlencoding::decode(&s).map_or(s.clone(), |d| d.into_owned())
    };
    query
        .split('&')
        .filter(|kv| !kv.is_empty())
        .map(|kv| match kv.split_once('=') {
            Some((k, v)) => (decode(k), decode(v)),
            None => (decode(kv), String::new()),
        })
        .collect()
}

impl<H> Router<H> {
    /// 创建空路由表。
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一条路由。
    pub fn route(mut self, pattern: &str, handler: H) -> Self {
        self.routes.push((compile(pattern), handler));
        self
    }

    /// 匹配一个路径，路径可以带查询字符串。
    ///
    /// # 返回
    /// 没有路由匹配时返回 `FuoError::NotFound`。
    pub fn dispatch(&self, path: &str) -> Result<Match<'_, H>> {
        let (path, query) = path.split_once('?').unwrap_or((path, ""));
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        for (segments, handler) in &self.routes {
            if segments.len() != parts.len() {
                continue;
            }
            let mut params = HashMap::new();
            let matched = segments.iter().zip(&parts).all(|(seg, part)| match seg {
                Segment::Literal(lit) => lit == part,
                Segment::Capture(name) => {
                    params.insert(name.clone(), (*part).to_string());
                    true
                }
            });
            if matched {
                trace!("路径 {path} 匹配成功: {params:?}");
                return Ok(Match {
                    handler,
                    params,
                    query: parse_query(query),
                });
            }
        }
        Err(FuoError::NotFound(format!("没有匹配的路由: {path}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> Router<&'static str> {
        Router::new()
            .route("/", "root")
            .route("/<provider>/songs/<id>", "song")
            .route("/<provider>/songs/<id>/lyric", "lyric")
    }

    #[test]
    fn test_dispatch_with_captures_and_query() {
        let router = router();
        let m = router.dispatch("/netease/songs/123/lyric?lang=zh%20CN&x").unwrap();
        assert_eq!(*m.handler, "lyric");
        assert_eq!(m.param("provider"), "netease");
        assert_eq!(m.param("id"), "123");
        assert_eq!(m.query["lang"], "zh CN");
        assert_eq!(m.query["x"], "");

        assert_eq!(*router.dispatch("/").unwrap().handler, "root");
        assert_eq!(*router.dispatch("").unwrap().handler, "root");
    }

    #[test]
    fn test_unmatched_is_not_found() {
        let err = router().dispatch("/netease/albums/1").unwrap_err();
        assert!(matches!(err, FuoError::NotFound(_)));
    }
}
