// HLS Relay API Library
//
// HTTP gateway in front of the manifest-aware relay

pub mod http;

// Re-export commonly used types
pub use http::{create_router, AppState};
