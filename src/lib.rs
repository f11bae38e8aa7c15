pub mod config;
pub mod engine;
pub mod error;
pub mod frame;
pub mod pending;
pub mod registry;
pub mod result;
pub mod scanner;
pub mod search;
pub mod session;
pub mod source;
pub mod stabilizer;
pub mod sync;
pub mod types;

mod worker;

// Re-exports
pub use config::*;
pub use engine::*;
pub use error::*;
pub use frame::*;
pub use pending::*;
pub use registry::*;
pub use result::*;
pub use scanner::*;
pub use search::*;
pub use session::*;
pub use source::*;
pub use stabilizer::*;
pub use sync::*;
pub use types::*;
