//! Assembly recipes per resource kind.
//!
//! A recipe says which payloads a kind is built from and how they turn into
//! one top-level resource. Simple kinds come from a single payload; composite
//! kinds read the requested payload as their first part and fan out to
//! companion payloads whose locations are derived from it by swapping the file
//! extension.

use std::collections::HashMap;

use super::{PartRole, Payload, ResourceFactory, ResourceHandle, ResourceKind, ResourcePart};
use crate::error::{AssetError, Result};

/// One payload of a composite asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartSpec {
    pub role: PartRole,
    /// Extension of companion parts. For the first (primary) part this is
    /// only the usual one: the requested location is read as is.
    pub extension: &'static str,
}

impl PartSpec {
    pub const fn new(role: PartRole, extension: &'static str) -> Self {
        Self { role, extension }
    }
}

const SPRITE_ATLAS_PARTS: &[PartSpec] = &[
    PartSpec::new(PartRole::AtlasData, "plist"),
    PartSpec::new(PartRole::Texture, "png"),
];

const BITMAP_FONT_PARTS: &[PartSpec] = &[
    PartSpec::new(PartRole::FontData, "fnt"),
    PartSpec::new(PartRole::Texture, "png"),
];

const SKELETON_PARTS: &[PartSpec] = &[
    PartSpec::new(PartRole::SkeletonData, "json"),
    PartSpec::new(PartRole::SkeletonAtlas, "atlas"),
    PartSpec::new(PartRole::Texture, "png"),
];

/// How a kind is assembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetRecipe {
    /// One payload, one resource.
    Simple,
    /// One payload per part, linked into one top-level resource.
    Composite { parts: Vec<PartSpec> },
}

impl AssetRecipe {
    /// Payload locations needed for an asset requested at `source`.
    ///
    /// `source` itself is always the first one, so a binary skeleton
    /// (`hero.skel`) is read from where it was found.
    pub fn sources(&self, source: &str) -> Vec<String> {
        match self {
            AssetRecipe::Simple => vec![source.to_string()],
            AssetRecipe::Composite { parts } => std::iter::once(source.to_string())
                .chain(
                    parts
                        .iter()
                        .skip(1)
                        .map(|part| swap_extension(source, part.extension)),
                )
                .collect(),
        }
    }

    /// Build the top-level resource from payloads ordered like
    /// [`sources`](Self::sources).
    ///
    /// Fails as a whole if any payload or part is rejected.
    pub fn build(
        &self,
        factory: &dyn ResourceFactory,
        kind: ResourceKind,
        source: &str,
        payloads: Vec<Payload>,
    ) -> Result<ResourceHandle> {
        let handle = match self {
            AssetRecipe::Simple => {
                let [payload]: [Payload; 1] =
                    payloads.try_into().map_err(|p: Vec<Payload>| AssetError::Construction {
                        kind,
                        message: format!("expected 1 payload for {}, got {}", source, p.len()),
                    })?;
                factory.create(kind, payload)?
            }
            AssetRecipe::Composite { parts } => {
                if payloads.len() != parts.len() {
                    return Err(AssetError::Construction {
                        kind,
                        message: format!(
                            "expected {} payloads for {}, got {}",
                            parts.len(),
                            source,
                            payloads.len()
                        ),
                    });
                }

                let mut built = Vec::with_capacity(parts.len());
                for (spec, payload) in parts.iter().zip(payloads) {
                    let part_source = payload.source.clone();
                    let resource = factory.create_part(spec.role, payload)?;
                    if !resource.is_valid() {
                        return Err(AssetError::InvalidResource { key: part_source });
                    }
                    built.push(ResourcePart {
                        role: spec.role,
                        source: part_source,
                        resource,
                    });
                }
                factory.assemble(kind, source, built)?
            }
        };

        if !handle.is_valid() {
            return Err(AssetError::InvalidResource {
                key: source.to_string(),
            });
        }
        Ok(handle)
    }
}

/// Recipes keyed by resource kind.
#[derive(Debug, Clone)]
pub struct RecipeRegistry {
    recipes: HashMap<ResourceKind, AssetRecipe>,
}

impl Default for RecipeRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for kind in [
            ResourceKind::Texture,
            ResourceKind::SpriteFrame,
            ResourceKind::Text,
            ResourceKind::Json,
            ResourceKind::Binary,
            ResourceKind::Audio,
        ] {
            registry.register(kind, AssetRecipe::Simple);
        }
        registry.register(
            ResourceKind::SpriteAtlas,
            AssetRecipe::Composite {
                parts: SPRITE_ATLAS_PARTS.to_vec(),
            },
        );
        registry.register(
            ResourceKind::BitmapFont,
            AssetRecipe::Composite {
                parts: BITMAP_FONT_PARTS.to_vec(),
            },
        );
        registry.register(
            ResourceKind::Skeleton,
            AssetRecipe::Composite {
                parts: SKELETON_PARTS.to_vec(),
            },
        );
        registry
    }
}

impl RecipeRegistry {
    /// Registry with the built-in recipe of every kind.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with no recipes, for callers that register their own.
    pub fn empty() -> Self {
        Self {
            recipes: HashMap::new(),
        }
    }

    /// Insert or replace the recipe of `kind`.
    pub fn register(&mut self, kind: ResourceKind, recipe: AssetRecipe) {
        self.recipes.insert(kind, recipe);
    }

    /// Recipe for `kind`; a missing recipe is a construction error.
    pub fn get(&self, kind: ResourceKind) -> Result<&AssetRecipe> {
        self.recipes.get(&kind).ok_or_else(|| AssetError::Construction {
            kind,
            message: "no assembly recipe registered".to_string(),
        })
    }
}

/// Replace the extension of the last path segment of `source`.
///
/// Works on URLs (query and fragment are kept) and on plain paths. A segment
/// without an extension gets one appended.
pub fn swap_extension(source: &str, extension: &str) -> String {
    if let Ok(mut url) = url::Url::parse(source) {
        if !url.cannot_be_a_base() {
            let path = swap_path_extension(url.path(), extension);
            url.set_path(&path);
            return url.to_string();
        }
    }
    swap_path_extension(source, extension)
}

fn swap_path_extension(path: &str, extension: &str) -> String {
    let segment_start = path.rfind('/').map_or(0, |i| i + 1);
    let stem_end = match path[segment_start..].rfind('.') {
        Some(dot) if dot > 0 => segment_start + dot,
        _ => path.len(),
    };
    format!("{}.{}", &path[..stem_end], extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{downcast, RawResource, RawResourceFactory};

    #[test]
    fn test_swap_extension() {
        assert_eq!(
            swap_extension("https://cdn.example.com/ui/atlas.plist", "png"),
            "https://cdn.example.com/ui/atlas.png"
        );
        assert_eq!(
            swap_extension("https://cdn.example.com/f.fnt?v=3", "png"),
            "https://cdn.example.com/f.png?v=3"
        );
        assert_eq!(swap_extension("fonts/title.fnt", "png"), "fonts/title.png");
        assert_eq!(swap_extension("fonts/title", "fnt"), "fonts/title.fnt");
        assert_eq!(swap_extension("v1.2/.hidden", "png"), "v1.2/.hidden.png");
    }

    #[test]
    fn test_default_registry_covers_every_kind() {
        let registry = RecipeRegistry::new();
        for kind in ResourceKind::ALL {
            assert!(registry.get(kind).is_ok(), "{kind} has no recipe");
        }
        assert!(RecipeRegistry::empty().get(ResourceKind::Texture).is_err());
    }

    #[test]
    fn test_skeleton_sources() {
        let registry = RecipeRegistry::new();
        let sources = registry
            .get(ResourceKind::Skeleton)
            .unwrap()
            .sources("https://cdn/hero.json");
        assert_eq!(
            sources,
            vec![
                "https://cdn/hero.json".to_string(),
                "https://cdn/hero.atlas".to_string(),
                "https://cdn/hero.png".to_string(),
            ]
        );

        let binary = registry
            .get(ResourceKind::Skeleton)
            .unwrap()
            .sources("bundles/ui/hero.skel");
        assert_eq!(binary[0], "bundles/ui/hero.skel");
        assert_eq!(binary[1], "bundles/ui/hero.atlas");
    }

    #[test]
    fn test_build_composite() {
        let registry = RecipeRegistry::new();
        let recipe = registry.get(ResourceKind::SpriteAtlas).unwrap();
        let handle = recipe
            .build(
                &RawResourceFactory::new(),
                ResourceKind::SpriteAtlas,
                "ui.plist",
                vec![
                    Payload::new("ui.plist", &b"<plist/>"[..]),
                    Payload::new("ui.png", &b"\x89PNG"[..]),
                ],
            )
            .unwrap();

        let raw = downcast::<RawResource>(handle).unwrap();
        assert_eq!(raw.parts().len(), 2);
        assert!(raw.part(PartRole::AtlasData).is_some());
    }

    #[test]
    fn test_build_rejects_missing_part() {
        let registry = RecipeRegistry::new();
        let recipe = registry.get(ResourceKind::BitmapFont).unwrap();
        let result = recipe.build(
            &RawResourceFactory::new(),
            ResourceKind::BitmapFont,
            "f.fnt",
            vec![Payload::new("f.fnt", &b"info"[..])],
        );
        assert!(matches!(result, Err(AssetError::Construction { .. })));
    }

    #[test]
    fn test_build_rejects_bad_part_payload() {
        let registry = RecipeRegistry::new();
        let recipe = registry.get(ResourceKind::Skeleton).unwrap();
        let result = recipe.build(
            &RawResourceFactory::new(),
            ResourceKind::Skeleton,
            "hero.json",
            vec![
                Payload::new("hero.json", &b"{broken"[..]),
                Payload::new("hero.atlas", &b"hero.png"[..]),
                Payload::new("hero.png", &b"\x89PNG"[..]),
            ],
        );
        assert!(result.is_err());
    }
}
