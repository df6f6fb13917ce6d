// Declare modules at the root level
pub mod bucket;
pub mod domain;
pub mod error;
pub mod fold;
pub mod normalize;
pub mod processor;
pub mod store;
pub mod test_utils;
pub mod time;

// Re-export everything under a shared namespace for external access
pub mod shared {
    pub use super::bucket;
    pub use super::domain;
    pub use super::error;
    pub use super::fold;
    pub use super::normalize;
    pub use super::processor;
    pub use super::store;
    pub use super::time;
}

// Also re-export at root for convenience
pub use bucket::*;
pub use domain::*;
pub use error::*;
pub use fold::*;
pub use normalize::*;
pub use processor::*;
pub use store::*;
pub use time::*;
