pub mod admin;
pub mod channels;
pub mod dispatch;
pub mod init;
pub mod jobs;
pub mod selector;
