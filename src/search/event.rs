//! 搜索事件、监听者与取消标志。
//!
//! 同一次运行的事件顺序为 `Started, [Progress]*, 终止事件`，终止事件恰好一个。
//! 取消之后只可能再投递一个 `Aborted`。
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use log::trace;
use serde::Serialize;

use crate::net::TransitionId;

/// `steps` 均为截至该事件已发射的迁移次数。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SearchEvent {
    Started,
    Progress {
        steps: usize,
    },
    Success {
        steps: usize,
        backtrack: Vec<TransitionId>,
    },
    Failure {
        steps: usize,
    },
    Aborted {
        steps: usize,
    },
    Finished {
        steps: usize,
    },
}

impl SearchEvent {
    pub fn is_terminal(&self) -> bool {
        self.status().is_some()
    }

    pub fn status(&self) -> Option<Status> {
        match self {
            SearchEvent::Started | SearchEvent::Progress { .. } => None,
            SearchEvent::Success { .. } => Some(Status::Success),
            SearchEvent::Failure { .. } => Some(Status::Failure),
            SearchEvent::Aborted { .. } => Some(Status::Aborted),
            SearchEvent::Finished { .. } => Some(Status::Finished),
        }
    }

    pub fn steps(&self) -> Option<usize> {
        match self {
            SearchEvent::Started => None,
            SearchEvent::Progress { steps }
            | SearchEvent::Success { steps, .. }
            | SearchEvent::Failure { steps }
            | SearchEvent::Aborted { steps }
            | SearchEvent::Finished { steps } => Some(*steps),
        }
    }
}

impl fmt::Display for SearchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchEvent::Started => f.write_str("started"),
            SearchEvent::Progress { steps } => write!(f, "progress: {steps} steps"),
            SearchEvent::Success { steps, backtrack } => {
                write!(f, "success after {steps} steps, path of {} firings", backtrack.len())
            }
            SearchEvent::Failure { steps } => write!(f, "failure after {steps} steps"),
            SearchEvent::Aborted { steps } => write!(f, "aborted after {steps} steps"),
            SearchEvent::Finished { steps } => write!(f, "finished after {steps} steps"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Status {
    Success,
    Failure,
    Aborted,
    Finished,
}

/// 事件接收者。回调在工作线程上同步执行，不应长时间阻塞。
pub trait SearchListener: Send + Sync {
    fn update(&self, event: &SearchEvent);
}

impl<L> SearchListener for Arc<L>
where
    L: SearchListener + ?Sized,
{
    fn update(&self, event: &SearchEvent) {
        (**self).update(event)
    }
}

/// 接收端已关闭时静默丢弃。
impl SearchListener for Sender<SearchEvent> {
    fn update(&self, event: &SearchEvent) {
        let _ = self.send(event.clone());
    }
}

/// 以闭包作为监听者。
pub struct FnListener<F>(pub F);

impl<F> SearchListener for FnListener<F>
where
    F: Fn(&SearchEvent) + Send + Sync,
{
    fn update(&self, event: &SearchEvent) {
        (self.0)(event)
    }
}

/// 记录全部事件，主要用于测试与命令行汇总。
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<SearchEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SearchEvent> {
        lock(&self.events).clone()
    }

    pub fn terminal(&self) -> Option<SearchEvent> {
        lock(&self.events)
            .iter()
            .rev()
            .find(|event| event.is_terminal())
            .cloned()
    }
}

impl SearchListener for EventLog {
    fn update(&self, event: &SearchEvent) {
        lock(&self.events).push(event.clone());
    }
}

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Registry = Vec<(ListenerId, Arc<dyn SearchListener>)>;

/// 监听者注册表与投递通道。
///
/// 投递在 `delivery` 锁内同步进行；注册表只在复制快照时短暂加锁，
/// 因此回调内部仍可增删监听者。
pub struct EventBus {
    listeners: Mutex<Registry>,
    delivery: Mutex<()>,
    delivering_thread: Mutex<Option<ThreadId>>,
    next_id: AtomicU64,
    cancel: CancelToken,
    terminated: AtomicBool,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &lock(&self.listeners).len())
            .field("cancelled", &self.cancel.is_cancelled())
            .field("terminated", &self.terminated.load(Ordering::SeqCst))
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_token(CancelToken::new())
    }

    pub fn with_token(cancel: CancelToken) -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            delivery: Mutex::new(()),
            delivering_thread: Mutex::new(None),
            next_id: AtomicU64::new(0),
            cancel,
            terminated: AtomicBool::new(false),
        }
    }

    pub fn token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    pub fn add_listener(&self, listener: Arc<dyn SearchListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.listeners).push((id, listener));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// 设置取消标志，并等待正在进行的投递结束。
    ///
    /// 返回后除 `Aborted` 外不会再有事件送达。若在投递线程的回调中调用则不等待。
    pub fn interrupt(&self) {
        self.cancel.cancel();
        let current = thread::current().id();
        if *lock(&self.delivering_thread) == Some(current) {
            return;
        }
        drop(lock(&self.delivery));
    }

    /// 投递事件，返回实际送达的事件。
    ///
    /// 已取消时非终止事件被丢弃，终止事件改写为 `Aborted`；终止之后的一切事件都被丢弃。
    pub fn emit(&self, event: SearchEvent) -> Option<SearchEvent> {
        let _delivery = lock(&self.delivery);
        if self.is_terminated() {
            return None;
        }
        let event = if self.is_cancelled() {
            match event {
                SearchEvent::Started | SearchEvent::Progress { .. } => return None,
                SearchEvent::Aborted { .. } => event,
                other => SearchEvent::Aborted {
                    steps: other.steps().unwrap_or_default(),
                },
            }
        } else {
            event
        };
        if event.is_terminal() {
            self.terminated.store(true, Ordering::SeqCst);
        }

        let snapshot = lock(&self.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect::<Vec<_>>();
        trace!("delivering {event} to {} listeners", snapshot.len());

        *lock(&self.delivering_thread) = Some(thread::current().id());
        for listener in &snapshot {
            listener.update(&event);
        }
        *lock(&self.delivering_thread) = None;
        Some(event)
    }
}

/// 锁中毒只意味着某个回调曾经 panic，数据本身仍然可用。
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
