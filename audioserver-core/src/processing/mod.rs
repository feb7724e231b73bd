pub mod bridge;
pub mod buffer_view;
pub mod interleave;
