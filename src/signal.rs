//! 进程内的信号总线。
//!
//! 一个 [`Signal`] 持有一组接收者。直接接收者只以弱引用的方式保存，
//! 调用方需要自己持有对应的 [`Slot`]，一旦 `Slot` 被释放，信号在下一次
//! 发射时会自动跳过并清理它。
//!
//! 通过 [`Signal::connect_queued`] 注册的接收者不会在 `emit` 时被同步调用，
//! 而是把值按 FIFO 顺序投递到一个通道，由事件循环中的任务异步消费。
//!
//! ```rust
//! use std::sync::Arc;
//! use feeluown_rs::signal::{Signal, Slot};
//!
//! let signal: Signal<u32> = Signal::new("volume_changed");
//! let slot: Slot<u32> = Arc::new(|v: &u32| println!("音量: {v}"));
//! signal.connect(&slot);
//! signal.emit(42);
//! ```

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, Weak},
};

use tokio::sync::mpsc;
use tracing::{error, trace};

/// 可以连接到信号上的回调。
pub type Slot<T> = Arc<dyn Fn(&T) + Send + Sync>;

enum Receiver<T> {
    Direct(Weak<dyn Fn(&T) + Send + Sync>),
    Queued(mpsc::UnboundedSender<T>),
}

/// 一个带名字的信号。
pub struct Signal<T> {
    name: &'static str,
    receivers: Mutex<Vec<Receiver<T>>>,
}

impl<T> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal").field("name", &self.name).finish()
    }
}

impl<T: Clone + Send + 'static> Signal<T> {
    /// 创建一个没有任何接收者的信号。
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            receivers: Mutex::new(Vec::new()),
        }
    }

    /// 信号的名字，仅用于日志。
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 连接一个回调。重复连接同一个 `Slot` 不会产生效果。
    pub fn connect(&self, slot: &Slot<T>) {
        let mut receivers = self.lock();
        let exists = receivers.iter().any(|r| match r {
            Receiver::Direct(weak) => std::ptr::addr_eq(weak.as_ptr(), Arc::as_ptr(slot)),
            Receiver::Queued(_) => false,
        });
        if !exists {
            receivers.push(Receiver::Direct(Arc::downgrade(slot)));
        }
    }

    /// 断开一个回调。未连接时什么也不做。
    pub fn disconnect(&self, slot: &Slot<T>) {
        self.lock().retain(|r| match r {
            Receiver::Direct(weak) => !std::ptr::addr_eq(weak.as_ptr(), Arc::as_ptr(slot)),
            Receiver::Queued(_) => true,
        });
    }

    /// 注册一个排队接收者，发射的值会按顺序投递到返回的通道中。
    ///
    /// 丢弃返回的 `UnboundedReceiver` 即视为断开。
    pub fn connect_queued(&self) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(Receiver::Queued(tx));
        rx
    }

    /// 当前存活的接收者数量。
    pub fn receiver_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|r| match r {
                Receiver::Direct(weak) => weak.strong_count() > 0,
                Receiver::Queued(tx) => !tx.is_closed(),
            })
            .count()
    }

    /// 向所有存活的接收者发射一个值。
    ///
    /// 某个回调 panic 只会被记录下来，不会影响其它接收者。
    pub fn emit(&self, value: T) {
        let mut direct: Vec<Slot<T>> = Vec::new();
        let mut queued: Vec<mpsc::UnboundedSender<T>> = Vec::new();
        {
            let mut receivers = self.lock();
            receivers.retain(|r| match r {
                Receiver::Direct(weak) => match weak.upgrade() {
                    Some(slot) => {
                        direct.push(slot);
                        true
                    }
                    None => false,
                },
                Receiver::Queued(tx) => {
                    if tx.is_closed() {
                        false
                    } else {
                        queued.push(tx.clone());
                        true
                    }
                }
            });
        }

        trace!(
            "信号 '{}' 发射给 {} 个接收者",
            self.name,
            direct.len() + queued.len()
        );

        for slot in direct {
            if panic::catch_unwind(AssertUnwindSafe(|| slot(&value))).is_err() {
                error!("信号 '{}' 的一个接收者 panic 了，已忽略。", self.name);
            }
        }
        for tx in queued {
            // 接收端已关闭时在下一次发射时清理
            let _ = tx.send(value.clone());
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Receiver<T>>> {
        self.receivers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
