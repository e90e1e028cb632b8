pub mod adapter;
pub mod connection_manager;
pub mod normalizer;
pub mod query_executor;
pub mod session_cache;
pub mod transport; // Remote object store client seam

pub use adapter::*;
pub use connection_manager::*;
pub use normalizer::*;
pub use query_executor::*;
pub use session_cache::*;
