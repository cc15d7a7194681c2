// Communication channels lock-free

use std::sync::{Arc, Mutex};

use ringbuf::traits::{Producer, Split};
use ringbuf::HeapRb;

use crate::messaging::notification::{Notification, PositionUpdate};

pub type NotificationProducer = ringbuf::HeapProd<Notification>;
pub type NotificationConsumer = ringbuf::HeapCons<Notification>;

pub fn create_notification_channel(
    capacity: usize,
) -> (NotificationProducer, NotificationConsumer) {
    let rb = HeapRb::<Notification>::new(capacity);
    rb.split()
}

pub type PositionProducer = ringbuf::HeapProd<PositionUpdate>;
pub type PositionConsumer = ringbuf::HeapCons<PositionUpdate>;

pub fn create_position_channel(capacity: usize) -> (PositionProducer, PositionConsumer) {
    let rb = HeapRb::<PositionUpdate>::new(capacity);
    rb.split()
}

/// Push without blocking; the notification is dropped if the producer is
/// busy or the ring is full.
pub fn push_notification(tx: &Arc<Mutex<NotificationProducer>>, notification: Notification) {
    if let Ok(mut tx) = tx.try_lock() {
        let _ = tx.try_push(notification);
    }
}
