//! API implementation submodules.
//!
//! Each submodule contains `impl AssetPipeline` blocks that extend the public
//! API. The struct definition remains in `lib.rs`.

mod builder;
mod bundles;
mod loading;

pub use builder::AssetPipelineBuilder;
