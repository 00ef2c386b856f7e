//! Content-script mock resolution
//!
//! Holds a snapshot of the developer's mock store, indexes it for exact
//! and `/:param` pattern lookup, and answers the injected hook script's
//! "is there a mock for this request" queries over the message bus. The
//! snapshot is rebuilt on the panel's store-change notification rather
//! than kept continuously in sync.

pub mod pattern;
pub mod relay;
pub mod store;

pub use pattern::PathPattern;
pub use relay::{ContentScript, UPDATE_STORE};
pub use store::{
    ExtensionStorage, InMemoryStorage, MockPath, MockStore, MockStoreProvider, StorageError,
    StorageStoreProvider,
};
