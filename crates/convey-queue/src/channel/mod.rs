//! In-process queue backend built on bounded channels.

mod channel_backend;

pub use channel_backend::ChannelBackend;
