//! Provider adapters, registry and streaming
//!
//! An [`Adapter`] turns common requests into provider calls. The
//! [`ProviderRegistry`] maps identifiers to adapters and is the only way
//! the common API finds one.

pub mod adapter;
pub mod registry;
pub mod streaming;

pub use adapter::{Adapter, HttpAdapter};
pub use registry::{global, init, shutdown, ProviderId, ProviderRegistry};
pub use streaming::{decode_sse, FragmentStream, ResponseStream, StreamAccumulator};
