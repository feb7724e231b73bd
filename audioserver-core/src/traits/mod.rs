pub mod audio_client;
pub mod backend;
pub mod midi;
pub mod server_delegate;
