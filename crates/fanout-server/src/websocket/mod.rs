//! WebSocket upgrade handling.
//!
//! The adapter is the only place that knows about axum's socket types. It
//! turns an upgraded socket into a `Frame` sink/stream pair and hands it to
//! [`fanout_hub::serve`]; it never touches hub membership directly.

pub mod adapter;

pub use adapter::{frame_to_message, message_to_frame, split_socket};
