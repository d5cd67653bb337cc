pub mod channel;
pub mod config;
pub mod frame;
pub mod oracle;
pub mod profile;
pub mod relay;
pub mod room;
pub mod sync_writer;
pub mod verification;
