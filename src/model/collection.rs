//! `.fuo` 收藏文件。
//!
//! 文件可以带有一个由 `+++` 包围的 TOML 头部：
//!
//! ```text
//! +++
//! title = "我喜欢的音乐"
//! updated = "2024-05-01T12:00:00+00:00"
//! +++
//! fuo://netease/songs/16841667	# "No Matter What" - Boyzone
//! ```
//!
//! 头部之后每行一个模型，以 `#` 开头的行是注释。

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{FuoError, Result};
use crate::model::BriefModel;
use crate::model::uri::{model_to_line, parse_line};

const HEADER_DELIMITER: &str = "+++";

/// 一个收藏文件。
#[derive(Debug, Clone)]
pub struct Collection {
    /// 文件路径
    pub path: PathBuf,
    /// 名称，没有头部时为文件名
    pub name: String,
    /// 最后更新时间
    pub updated: Option<DateTime<Utc>>,
    /// 头部中其它的字段
    pub extras: toml::Table,
    /// 收藏的模型，按文件中的顺序
    pub models: Vec<BriefModel>,
    has_header: bool,
}

impl Collection {
    /// 创建一个新的、空的收藏。保存时总会写出头部。
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            updated: None,
            extras: toml::Table::new(),
            models: Vec::new(),
            has_header: true,
        }
    }

    /// 从文件加载收藏。无法解析的模型行会被跳过并记录。
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut collection = Self::parse(&content, &stem)?;
        collection.path = path.to_path_buf();
        info!(
            "已加载收藏 '{}'，共 {} 项。",
            collection.name,
            collection.models.len()
        );
        Ok(collection)
    }

    /// 解析收藏文件的内容。
    ///
    /// # 参数
    /// * `content` - 文件内容。
    /// * `default_name` - 没有头部或头部没有 `title` 时使用的名称。
    pub fn parse(content: &str, default_name: &str) -> Result<Self> {
        let mut collection = Self::new(PathBuf::new(), default_name);
        collection.has_header = false;

        let mut lines = content.lines().peekable();
        if lines.peek().map(|l| l.trim()) == Some(HEADER_DELIMITER) {
            lines.next();
            let mut header = String::new();
            let mut closed = false;
            for line in lines.by_ref() {
                if line.trim() == HEADER_DELIMITER {
                    closed = true;
                    break;
                }
                header.push_str(line);
                header.push('\n');
            }
            if !closed {
                return Err(FuoError::ResolveFailed("收藏文件的头部没有闭合".into()));
            }
            collection.apply_header(header.parse::<toml::Table>()?);
        }

        for (i, line) in lines.enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_line(line) {
                Ok(model) => collection.models.push(model),
                Err(e) => warn!("跳过收藏中无法解析的第 {} 行 '{line}': {e}", i + 1),
            }
        }
        Ok(collection)
    }

    fn apply_header(&mut self, mut table: toml::Table) {
        self.has_header = true;
        if let Some(toml::Value::String(title)) = table.remove("title") {
            self.name = title;
        }
        self.updated = match table.remove("updated") {
            Some(toml::Value::String(s)) => DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Some(toml::Value::Datetime(dt)) => DateTime::parse_from_rfc3339(&dt.to_string())
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            _ => None,
        };
        self.extras = table;
    }

    /// 序列化为文件内容。
    pub fn render(&self) -> Result<String> {
        let mut out = String::new();
        if self.has_header {
            let mut table = toml::Table::new();
            table.insert("title".into(), toml::Value::String(self.name.clone()));
            if let Some(updated) = self.updated {
                table.insert("updated".into(), toml::Value::String(updated.to_rfc3339()));
            }
            for (k, v) in &self.extras {
                table.insert(k.clone(), v.clone());
            }
            let header = toml::to_string(&table).map_err(|e| FuoError::Internal(e.to_string()))?;
            out.push_str(HEADER_DELIMITER);
            out.push('\n');
            out.push_str(&header);
            if !header.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(HEADER_DELIMITER);
            out.push('\n');
        }
        for model in &self.models {
            out.push_str(&model_to_line(model));
            out.push('\n');
        }
        Ok(out)
    }

    /// 写回磁盘，有头部时会更新 `updated`。
    pub fn save(&mut self) -> Result<()> {
        if self.has_header {
            self.updated = Some(Utc::now());
        }
        let content = self.render()?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, content)?;
        info!("收藏 '{}' 已保存到 {}。", self.name, self.path.display());
        Ok(())
    }

    /// 文件名去掉扩展名，用作收藏在 `show` 路径中的标识。
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.clone())
    }

    /// 加载目录下所有的 `.fuo` 文件，按文件名排序。
    ///
    /// 目录不存在时返回空列表，无法加载的文件会被跳过并记录。
    pub fn load_dir(dir: &Path) -> Result<Vec<Self>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("收藏目录 {} 不存在", dir.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "fuo"))
            .collect();
        paths.sort();

        let mut collections = Vec::with_capacity(paths.len());
        for path in paths {
            match Self::load(&path) {
                Ok(collection) => collections.push(collection),
                Err(e) => warn!("无法加载收藏 {}: {e}", path.display()),
            }
        }
        Ok(collections)
    }

    /// 添加一个模型，已存在时返回 `false`。
    pub fn add(&mut self, model: BriefModel) -> bool {
        if self.models.contains(&model) {
            return false;
        }
        self.models.push(model);
        true
    }

    /// 移除一个模型，不存在时返回 `false`。
    pub fn remove(&mut self, model: &BriefModel) -> bool {
        let before = self.models.len();
        self.models.retain(|m| m != model);
        self.models.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelType;

    const WITH_HEADER: &str = "+++\ntitle = \"我喜欢的音乐\"\nupdated = \"2024-05-01T12:00:00+00:00\"\ncover = \"a.png\"\n+++\n# 注释\nfuo://netease/songs/16841667\t# \"No Matter What\" - Boyzone\nnot a uri\nfuo://netease/albums/1\t# 叶惠美 - 周杰伦\n";

    #[test]
    fn test_parse_with_header() {
        let collection = Collection::parse(WITH_HEADER, "fallback").unwrap();
        assert_eq!(collection.name, "我喜欢的音乐");
        assert!(collection.updated.is_some());
        assert_eq!(
            collection.extras.get("cover").and_then(|v| v.as_str()),
            Some("a.png")
        );
        assert_eq!(collection.models.len(), 2);
        assert_eq!(collection.models[1].model_type(), ModelType::Album);
    }

    #[test]
    fn test_missing_header_uses_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("收藏夹.fuo");
        fs::write(&path, "fuo://local/songs/1\n").unwrap();

        let collection = Collection::load(&path).unwrap();
        assert_eq!(collection.name, "收藏夹");
        assert_eq!(collection.render().unwrap(), "fuo://local/songs/1\n");
    }

    #[test]
    fn test_load_dir_skips_broken_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.fuo"), WITH_HEADER).unwrap();
        fs::write(dir.path().join("a.fuo"), "fuo://local/songs/1\n").unwrap();
        fs::write(dir.path().join("broken.fuo"), "+++\ntitle = \"x\"\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "fuo://local/songs/2\n").unwrap();

        let collections = Collection::load_dir(dir.path()).unwrap();
        let stems: Vec<_> = collections.iter().map(Collection::stem).collect();
        assert_eq!(stems, vec!["a", "b"]);
        assert_eq!(collections[1].name, "我喜欢的音乐");

        assert!(Collection::load_dir(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_save_preserves_header_and_bumps_updated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fav.fuo");
        fs::write(&path, WITH_HEADER).unwrap();

        let mut collection = Collection::load(&path).unwrap();
        let before = collection.updated;
        let song = BriefModel::new("local", ModelType::Song, "42");
        assert!(collection.add(song.clone()));
        assert!(!collection.add(song.clone()));
        collection.save().unwrap();

        let reloaded = Collection::load(&path).unwrap();
        assert_eq!(reloaded.name, "我喜欢的音乐");
        assert!(reloaded.updated > before);
        assert_eq!(reloaded.models.len(), 3);
        assert!(reloaded.extras.contains_key("cover"));

        let mut reloaded = reloaded;
        assert!(reloaded.remove(&song));
        assert!(!reloaded.remove(&song));
    }
}
