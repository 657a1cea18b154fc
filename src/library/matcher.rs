//! 匹配算法模块，用于给备用歌曲候选打分

use strsim::normalized_levenshtein;

use crate::model::BriefSongModel;

/// 两部分分数各自的满分。
const PART_SCORE: f64 = 50.0;

/// 候选歌曲用于计算相似度的表示，即 `"标题 歌手"`。
fn candidate_repr(candidate: &BriefSongModel) -> String {
    format!("{} {}", candidate.title, candidate.artists_name)
        .trim()
        .to_string()
}

/// 候选歌曲的完整表示，用于检查关键词是否出现。
fn candidate_full_repr(candidate: &BriefSongModel) -> String {
    format!(
        "{} {} {}",
        candidate.title, candidate.artists_name, candidate.album_name
    )
}

///
/// 计算候选歌曲与原歌曲的相似度分数，分数越高越相似。
///
/// 分数由两部分组成：
/// * `s1`：原标题与候选表示的相似度，乘以 50 后取整。
/// * `s2`：从 50 开始，原 `"标题 歌手"` 按空白切分成 N 段，每有一段没有
///   出现在候选的完整表示中就减去 `round(50 / N)`。
///
/// # 参数
/// * `title` - 原歌曲标题。
/// * `origin_repr` - 原歌曲的 `"标题 歌手"`。
/// * `candidate` - 候选歌曲。
///
pub fn score(title: &str, origin_repr: &str, candidate: &BriefSongModel) -> i64 {
    let s1 = (normalized_levenshtein(title, &candidate_repr(candidate)) * PART_SCORE).round() as i64;

    let parts: Vec<&str> = origin_repr.split_whitespace().collect();
    let mut s2 = PART_SCORE as i64;
    if !parts.is_empty() {
        let penalty = (PART_SCORE / parts.len() as f64).round() as i64;
        let full_repr = candidate_full_repr(candidate);
        let missing = parts.iter().filter(|p| !full_repr.contains(*p)).count() as i64;
        s2 -= penalty * missing;
    }

    s1 + s2
}
