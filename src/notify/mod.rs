//! Real-time notification fan-out
//!
//! A process-wide registry maps user ids to their open output channels
//! (SSE streams, browser push subscriptions). Delivery is best-effort and
//! fire-and-forget: no queueing, no retry, and a user connected to a
//! different process instance is silently missed. Horizontal fan-out
//! would need a shared pub/sub layer this design does not include.

pub mod event;
pub mod registry;

pub use event::NotificationEvent;
pub use registry::{
    ChannelId, ConnectionRegistry, DeliveryReport, NotificationChannel, PushChannel,
    PushSubscription, SseChannel,
};
