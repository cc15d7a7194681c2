// Messaging - Lock-free channels from the player core to a host UI

pub mod channels;
pub mod notification;

pub use channels::{
    NotificationConsumer, NotificationProducer, PositionConsumer, PositionProducer,
    create_notification_channel, create_position_channel,
};
pub use notification::{Notification, NotificationCategory, NotificationLevel, PositionUpdate};
