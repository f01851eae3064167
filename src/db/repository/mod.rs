pub mod delivery_attempt;
pub mod dispatch_queue;
pub mod notification;
pub mod recipient;

pub use delivery_attempt::DeliveryAttemptRepository;
pub use dispatch_queue::DispatchQueueRepository;
pub use notification::NotificationRepository;
pub use recipient::RecipientRepository;
