//! Opaque resource handles and the native resource factory contract.
//!
//! The pipeline never decodes content. Everything it caches is an
//! `Arc<dyn Resource>` produced by an injected [`ResourceFactory`] (normally
//! the engine). The only things the pipeline may do with a resource are:
//!
//! - ask whether it is still valid,
//! - take one native reference when a cache entry is created and give it back
//!   when the entry is destroyed.

mod dependency;
mod raw;
mod recipe;

pub use dependency::{DependencyIndex, DependencyRecord};
pub use raw::{RawResource, RawResourceFactory};
pub use recipe::{swap_extension, AssetRecipe, PartSpec, RecipeRegistry};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::error::Result;

/// Type-erasure helper implemented for every `Send + Sync + 'static` type.
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Engine-managed content.
///
/// `retain`/`release` drive the engine's own reference count, which is
/// independent of the cache's logical reference count.
pub trait Resource: AsAny {
    fn kind(&self) -> ResourceKind;

    /// `false` once the engine destroyed the underlying object.
    fn is_valid(&self) -> bool;

    /// Take one native reference.
    fn retain(&self);

    /// Give back one native reference.
    fn release(&self);
}

/// Shared handle to a resource.
pub type ResourceHandle = Arc<dyn Resource>;

/// Downcast a handle to its concrete engine type.
pub fn downcast<T: Resource>(handle: ResourceHandle) -> Option<Arc<T>> {
    handle.into_any().downcast::<T>().ok()
}

/// Request type of a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Texture,
    SpriteFrame,
    Text,
    Json,
    Binary,
    Audio,
    SpriteAtlas,
    BitmapFont,
    Skeleton,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 9] = [
        ResourceKind::Texture,
        ResourceKind::SpriteFrame,
        ResourceKind::Text,
        ResourceKind::Json,
        ResourceKind::Binary,
        ResourceKind::Audio,
        ResourceKind::SpriteAtlas,
        ResourceKind::BitmapFont,
        ResourceKind::Skeleton,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Texture => "texture",
            ResourceKind::SpriteFrame => "sprite-frame",
            ResourceKind::Text => "text",
            ResourceKind::Json => "json",
            ResourceKind::Binary => "binary",
            ResourceKind::Audio => "audio",
            ResourceKind::SpriteAtlas => "sprite-atlas",
            ResourceKind::BitmapFont => "bitmap-font",
            ResourceKind::Skeleton => "skeleton",
        }
    }


    /// File extensions an item of this kind usually carries on disk, in
    /// lookup order.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::Texture | ResourceKind::SpriteFrame => &["png", "jpg", "jpeg", "webp"],
            ResourceKind::Text => &["txt", "md", "csv"],
            ResourceKind::Json => &["json"],
            ResourceKind::Binary => &["bin"],
            ResourceKind::Audio => &["mp3", "ogg", "wav", "m4a"],
            ResourceKind::SpriteAtlas => &["plist"],
            ResourceKind::BitmapFont => &["fnt"],
            ResourceKind::Skeleton => &["json", "skel"],
        }
    }
}

/// Error returned when a string names no [`ResourceKind`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown resource kind '{0}'")]
pub struct UnknownKind(pub String);

impl FromStr for ResourceKind {
    type Err = UnknownKind;

    /// Parse the kebab-case name, ignoring ASCII case.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of a sub-resource inside a composite asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartRole {
    /// Page image shared by atlases, fonts and skeletons.
    Texture,
    /// Frame table of a sprite atlas (`.plist`).
    AtlasData,
    /// Glyph table of a bitmap font (`.fnt`).
    FontData,
    /// Bone/animation data of a skeleton (`.json`).
    SkeletonData,
    /// Region table of a skeleton (`.atlas`).
    SkeletonAtlas,
}

/// Raw bytes handed to the factory, tagged with where they came from.
#[derive(Debug, Clone)]
pub struct Payload {
    /// URL or bundle path.
    pub source: String,
    pub bytes: Bytes,
}

impl Payload {
    pub fn new(source: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            source: source.into(),
            bytes: bytes.into(),
        }
    }
}

/// A constructed sub-resource of a composite asset.
#[derive(Clone)]
pub struct ResourcePart {
    pub role: PartRole,
    pub source: String,
    pub resource: ResourceHandle,
}

impl fmt::Debug for ResourcePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePart")
            .field("role", &self.role)
            .field("source", &self.source)
            .field("valid", &self.resource.is_valid())
            .finish()
    }
}

/// Native resource factory (the engine side of the boundary).
pub trait ResourceFactory: Send + Sync {
    /// Build a standalone resource from a single payload.
    fn create(&self, kind: ResourceKind, payload: Payload) -> Result<ResourceHandle>;

    /// Build one sub-resource of a composite asset.
    fn create_part(&self, role: PartRole, payload: Payload) -> Result<ResourceHandle>;

    /// Link constructed sub-resources into one top-level resource.
    fn assemble(
        &self,
        kind: ResourceKind,
        source: &str,
        parts: Vec<ResourcePart>,
    ) -> Result<ResourceHandle>;
}
