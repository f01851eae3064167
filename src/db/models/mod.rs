//! Database models, one file per table.

pub mod channel;
pub mod delivery_attempt;
pub mod dispatch_job;
pub mod notification;
pub mod recipient;

pub use self::channel::*;
pub use self::delivery_attempt::*;
pub use self::dispatch_job::*;
pub use self::notification::*;
pub use self::recipient::*;
