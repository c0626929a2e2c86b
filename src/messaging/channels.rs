// Lock-free communication channels
// Analysis frames flow into the engine; notifications flow out to the UI

use crate::analysis::frame::AnalysisFrame;
use crate::messaging::notification::Notification;
use ringbuf::{HeapRb, traits::Split};

pub type FrameProducer = ringbuf::HeapProd<AnalysisFrame>;
pub type FrameConsumer = ringbuf::HeapCons<AnalysisFrame>;

pub fn create_frame_channel(capacity: usize) -> (FrameProducer, FrameConsumer) {
    let rb = HeapRb::<AnalysisFrame>::new(capacity);
    rb.split()
}

pub type NotificationProducer = ringbuf::HeapProd<Notification>;
pub type NotificationConsumer = ringbuf::HeapCons<Notification>;

pub fn create_notification_channel(
    capacity: usize,
) -> (NotificationProducer, NotificationConsumer) {
    let rb = HeapRb::<Notification>::new(capacity);
    rb.split()
}
