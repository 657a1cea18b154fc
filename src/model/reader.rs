//! 分页数据的读取器。
//!
//! 提供商返回的歌单歌曲、专辑列表等往往是分页的。[`Reader`] 把两种常见的
//! 访问方式统一起来：
//!
//! * `Sequential`：只能顺序读取的流，不可重新开始。
//! * `RandomSequential`：知道总数、可以按下标读取，按页调用 `read_func`
//!   并缓存结果。

use std::collections::HashMap;
use std::sync::Arc;

use futures::{
    StreamExt,
    future::BoxFuture,
    stream::{self, BoxStream},
};

use crate::error::{FuoError, Result};

/// 按 `[start, end)` 读取一页数据的函数。
pub type ReadFunc<T> = Arc<dyn Fn(usize, usize) -> BoxFuture<'static, Result<Vec<T>>> + Send + Sync>;

/// 顺序读取器。
pub struct SequentialReader<T> {
    stream: BoxStream<'static, Result<T>>,
    offset: usize,
    count: Option<usize>,
}

impl<T> SequentialReader<T> {
    /// 用一个流创建读取器，`count` 是已知的总数（如果有）。
    pub fn new(stream: BoxStream<'static, Result<T>>, count: Option<usize>) -> Self {
        Self {
            stream,
            offset: 0,
            count,
        }
    }

    /// 读取下一个元素。
    pub async fn next(&mut self) -> Option<Result<T>> {
        let item = self.stream.next().await?;
        if item.is_ok() {
            self.offset += 1;
        }
        Some(item)
    }

    /// 已经读取的数量。
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// 剩余数量的估计值，总数未知时为 `None`。
    pub fn remaining_hint(&self) -> Option<usize> {
        self.count.map(|c| c.saturating_sub(self.offset))
    }
}

/// 可随机访问的读取器。
pub struct RandomSequentialReader<T> {
    count: usize,
    page_size: usize,
    read_func: Option<ReadFunc<T>>,
    // 按页号缓存，只保存读过的页
    pages: HashMap<usize, Vec<T>>,
    offset: usize,
}

impl<T: Clone> RandomSequentialReader<T> {
    /// 创建读取器。
    ///
    /// # 参数
    /// * `count` - 元素总数。
    /// * `page_size` - 每次调用 `read_func` 读取的数量，最小为 1。
    /// * `read_func` - 读取 `[start, end)` 区间的函数，返回的数量必须等于 `end - start`。
    pub fn new(count: usize, page_size: usize, read_func: ReadFunc<T>) -> Self {
        Self {
            count,
            page_size: page_size.max(1),
            read_func: Some(read_func),
            pages: HashMap::new(),
            offset: 0,
        }
    }

    /// 用已经在内存中的列表创建读取器。
    pub fn from_vec(items: Vec<T>) -> Self {
        let count = items.len();
        Self {
            count,
            page_size: count.max(1),
            read_func: None,
            pages: HashMap::from([(0, items)]),
            offset: 0,
        }
    }

    /// 元素总数。
    pub fn count(&self) -> usize {
        self.count
    }

    /// 读取下标为 `index` 的元素，未缓存时读取它所在的整页。
    pub async fn read(&mut self, index: usize) -> Result<T> {
        if index >= self.count {
            return Err(FuoError::ReadFailed(format!(
                "下标 {index} 越界，总数为 {}",
                self.count
            )));
        }
        let page = index / self.page_size;
        let slot = index % self.page_size;
        if let Some(item) = self.pages.get(&page).and_then(|items| items.get(slot)) {
            return Ok(item.clone());
        }

        let start = page * self.page_size;
        let end = start.saturating_add(self.page_size).min(self.count);
        let read_func = self
            .read_func
            .as_ref()
            .ok_or_else(|| FuoError::ReadFailed("没有可用的 read_func".into()))?;
        let items = read_func(start, end)
            .await
            .map_err(|e| FuoError::ReadFailed(format!("读取 [{start}, {end}) 失败: {e}")))?;
        if items.len() != end - start {
            return Err(FuoError::ReadFailed(format!(
                "读取 [{start}, {end}) 应返回 {} 个元素，实际返回 {} 个",
                end - start,
                items.len()
            )));
        }
        let item = items[slot].clone();
        self.pages.insert(page, items);
        Ok(item)
    }

    /// 按顺序读取下一个元素。
    pub async fn next(&mut self) -> Option<Result<T>> {
        if self.offset >= self.count {
            return None;
        }
        let result = self.read(self.offset).await;
        if result.is_ok() {
            self.offset += 1;
        }
        Some(result)
    }
}

/// 统一的读取器。
pub enum Reader<T> {
    /// 顺序读取
    Sequential(SequentialReader<T>),
    /// 随机访问
    RandomSequential(RandomSequentialReader<T>),
}

impl<T: Clone + Send + 'static> Reader<T> {
    /// 用列表创建一个读取器。
    pub fn from_list(items: Vec<T>) -> Self {
        Reader::RandomSequential(RandomSequentialReader::from_vec(items))
    }

    /// 用流创建一个顺序读取器。
    pub fn from_stream(stream: BoxStream<'static, Result<T>>, count: Option<usize>) -> Self {
        Reader::Sequential(SequentialReader::new(stream, count))
    }

    /// 用分页函数创建一个随机访问读取器。
    pub fn paged(count: usize, page_size: usize, read_func: ReadFunc<T>) -> Self {
        Reader::RandomSequential(RandomSequentialReader::new(count, page_size, read_func))
    }

    /// 总数，顺序读取器可能未知。
    pub fn count(&self) -> Option<usize> {
        match self {
            Reader::Sequential(r) => r.count,
            Reader::RandomSequential(r) => Some(r.count()),
        }
    }

    /// 读取下一个元素。
    pub async fn next(&mut self) -> Option<Result<T>> {
        match self {
            Reader::Sequential(r) => r.next().await,
            Reader::RandomSequential(r) => r.next().await,
        }
    }

    /// 读取剩余的全部元素。任意一次读取失败都会返回 `ReadFailed`。
    pub async fn readall(mut self) -> Result<Vec<T>> {
        // 总数来自提供商，不能直接用来预分配
        let mut items = Vec::with_capacity(self.count().unwrap_or(0).min(1024));
        while let Some(item) = self.next().await {
            items.push(item.map_err(|e| match e {
                FuoError::ReadFailed(_) => e,
                other => FuoError::ReadFailed(other.to_string()),
            })?);
        }
        Ok(items)
    }

    /// 读取至多 `limit` 个元素。
    pub async fn take(&mut self, limit: usize) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while items.len() < limit {
            match self.next().await {
                Some(item) => items.push(item?),
                None => break,
            }
        }
        Ok(items)
    }
}

/// 把一个迭代器包装成顺序读取器需要的流。
pub fn stream_from_iter<T, I>(iter: I) -> BoxStream<'static, Result<T>>
where
    T: Send + 'static,
    I: IntoIterator<Item = T>,
    I::IntoIter: Send + 'static,
{
    stream::iter(iter.into_iter().map(Ok)).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_read_func(calls: Arc<AtomicUsize>) -> ReadFunc<usize> {
        Arc::new(move |start: usize, end: usize| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, FuoError>((start..end).collect::<Vec<_>>()) }.boxed()
        })
    }

    #[tokio::test]
    async fn test_random_sequential_reads_by_page() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut reader = RandomSequentialReader::new(7, 3, counting_read_func(calls.clone()));

        assert_eq!(reader.read(4).await.unwrap(), 4);
        assert_eq!(reader.read(3).await.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1, "同一页只应读取一次");

        let all = Reader::RandomSequential(reader).readall().await.unwrap();
        assert_eq!(all, (0..7).collect::<Vec<_>>());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_huge_count_reads_only_touched_pages() {
        let calls = Arc::new(AtomicUsize::new(0));
        let count = 1usize << 40;
        let mut reader = RandomSequentialReader::new(count, 2, counting_read_func(calls.clone()));

        assert_eq!(reader.read(count - 1).await.unwrap(), count - 1);
        assert_eq!(reader.read(count - 2).await.unwrap(), count - 2);
        assert_eq!(reader.next().await.unwrap().unwrap(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(reader.pages.len(), 2);
    }

    #[tokio::test]
    async fn test_wrong_count_is_read_failed() {
        let read_func: ReadFunc<usize> =
            Arc::new(|_: usize, _: usize| async { Ok::<_, FuoError>(vec![1usize]) }.boxed());
        let reader = Reader::paged(4, 2, read_func);
        assert!(matches!(reader.readall().await, Err(FuoError::ReadFailed(_))));
    }

    #[tokio::test]
    async fn test_read_func_error_is_read_failed() {
        let read_func: ReadFunc<usize> = Arc::new(|_: usize, _: usize| {
            async { Err::<Vec<usize>, _>(FuoError::provider_io("netease", "连接被重置")) }.boxed()
        });
        let mut reader = RandomSequentialReader::new(2, 2, read_func);
        let err = reader.read(0).await.unwrap_err();
        assert!(matches!(err, FuoError::ReadFailed(_)));
        assert!(err.to_string().contains("连接被重置"));
    }

    #[tokio::test]
    async fn test_sequential_reader() {
        let mut reader = Reader::from_stream(stream_from_iter(vec!["a", "b", "c"]), Some(3));
        assert_eq!(reader.take(2).await.unwrap(), vec!["a", "b"]);
        if let Reader::Sequential(r) = &reader {
            assert_eq!(r.offset(), 2);
            assert_eq!(r.remaining_hint(), Some(1));
        }
        assert_eq!(reader.readall().await.unwrap(), vec!["c"]);
    }

    #[tokio::test]
    async fn test_from_list() {
        let reader = Reader::from_list(vec![1, 2, 3]);
        assert_eq!(reader.count(), Some(3));
        assert_eq!(reader.readall().await.unwrap(), vec![1, 2, 3]);
    }
}
