pub mod device;
pub mod processor;
pub mod transmitter;
