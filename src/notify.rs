use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::calendar::DayKey;
use crate::model::{Batch, BookingStatus};

const CHANNEL_CAPACITY: usize = 128;

/// A notification addressed to one employee. Delivery transport (mail, push,
/// websocket) is someone else's problem — the hub only fans out in-process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Tomorrow is the employee's batch day and no seat is booked yet.
    Reminder { day: DayKey, batch: Batch },
    /// Floating booking has opened for `day`.
    FloatingUnlocked { day: DayKey },
    /// One of the employee's bookings changed state.
    BookingUpdate {
        booking: Ulid,
        day: DayKey,
        status: BookingStatus,
    },
}

/// Per-employee broadcast hub. Sends are fire-and-forget: with no subscriber
/// the notice is dropped, and a slow subscriber only lags its own channel.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Notice>>,
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to an employee's notices, creating the channel if needed.
    pub fn subscribe(&self, employee: Ulid) -> broadcast::Receiver<Notice> {
        self.channels
            .entry(employee)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Send a notice. No-op if nobody is listening.
    pub fn send(&self, employee: Ulid, notice: Notice) {
        if let Some(sender) = self.channels.get(&employee) {
            let _ = sender.send(notice);
        }
    }
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = NotifyHub::new();
        let emp = Ulid::new();
        let mut rx = hub.subscribe(emp);

        let notice = Notice::FloatingUnlocked {
            day: "2025-06-10".parse().unwrap(),
        };
        hub.send(emp, notice.clone());
        assert_eq!(rx.recv().await.unwrap(), notice);
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        hub.send(
            Ulid::new(),
            Notice::Reminder {
                day: "2025-06-09".parse().unwrap(),
                batch: Batch::One,
            },
        );
    }

    #[tokio::test]
    async fn notices_are_per_employee() {
        let hub = NotifyHub::new();
        let (a, b) = (Ulid::new(), Ulid::new());
        let mut rx_a = hub.subscribe(a);
        let _rx_b = hub.subscribe(b);

        hub.send(
            b,
            Notice::FloatingUnlocked {
                day: "2025-06-10".parse().unwrap(),
            },
        );
        assert!(rx_a.try_recv().is_err());
    }
}
