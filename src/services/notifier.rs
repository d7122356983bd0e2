//! 事件通知服务 - 业务能力层
//!
//! 只负责"把事件发给控制端"，控制端可能根本不在监听

use tokio::sync::broadcast;
use tracing::debug;

use crate::models::Event;

/// 一次通知的投递结果
///
/// `NoReceiver` 对发送方来说不是错误。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    NoReceiver,
}

/// 事件通知能力
pub trait EventNotifier {
    fn notify(&self, event: Event) -> Delivery;
}

/// 基于 broadcast 通道的通知服务
///
/// 职责：
/// - 向所有订阅者广播事件
/// - 没有订阅者时返回 `Delivery::NoReceiver`，从不阻塞
#[derive(Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<Event>,
}

impl BroadcastNotifier {
    /// 创建新的通知服务
    pub fn new(sender: broadcast::Sender<Event>) -> Self {
        Self { sender }
    }

    /// 使用指定容量创建通道
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// 订阅事件
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl EventNotifier for BroadcastNotifier {
    fn notify(&self, event: Event) -> Delivery {
        match self.sender.send(event) {
            Ok(_) => Delivery::Delivered,
            Err(broadcast::error::SendError(event)) => {
                debug!("没有控制端在监听，丢弃事件: {:?}", event);
                Delivery::NoReceiver
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_receiver_is_not_an_error() {
        let notifier = BroadcastNotifier::with_capacity(4);
        assert_eq!(
            notifier.notify(Event::BulkOperationCancelled),
            Delivery::NoReceiver
        );

        let mut rx = notifier.subscribe();
        assert_eq!(
            notifier.notify(Event::BulkOperationCancelled),
            Delivery::Delivered
        );
        assert_eq!(rx.try_recv().unwrap(), Event::BulkOperationCancelled);
    }
}
