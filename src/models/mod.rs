pub mod collection;
pub mod query;
pub mod session;
pub mod write;

pub use collection::*;
pub use query::*;
pub use session::*;
pub use write::*;
