pub mod consts;
pub mod errors;
pub mod bitmap;
pub mod params;
pub mod hash;
pub mod filter;
pub mod allocator;
pub mod scalable;
pub mod manifest;
pub mod store;

pub use allocator::{AnonymousAllocator, BitmapAllocator, DirAllocator};
pub use bitmap::{Backing, Bitmap};
pub use errors::{Result, SbfError};
pub use filter::{AddOutcome, BloomFilter};
pub use params::FilterParams;
pub use scalable::{ChainCloseError, SbfHandle, SbfParams, ScalableBloomFilter};
pub use store::SbfStore;
