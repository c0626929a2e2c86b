// Messaging module - Lock-free channels between the frame loop and the UI

pub mod channels;
pub mod notification;

pub use channels::{
    FrameConsumer, FrameProducer, NotificationConsumer, NotificationProducer, create_frame_channel,
    create_notification_channel,
};
pub use notification::{Notification, NotificationCategory, NotificationLevel};
