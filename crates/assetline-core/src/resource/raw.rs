//! Reference resource factory for headless use.
//!
//! [`RawResourceFactory`] keeps payload bytes as-is and only checks what can be
//! checked without decoding a media format (non-empty payloads, UTF-8 text,
//! well-formed JSON). Its resources expose their native reference count so the
//! cache's single-reference invariant is observable.

use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::{PartRole, Payload, Resource, ResourceFactory, ResourceHandle, ResourceKind, ResourcePart};
use crate::error::{AssetError, Result};

/// Bytes-backed resource with an observable native reference count.
#[derive(Debug)]
pub struct RawResource {
    kind: ResourceKind,
    source: String,
    bytes: Bytes,
    parts: Vec<ResourcePart>,
    native_refs: AtomicUsize,
    valid: AtomicBool,
}

impl RawResource {
    pub fn new(kind: ResourceKind, source: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            kind,
            source: source.into(),
            bytes,
            parts: Vec::new(),
            native_refs: AtomicUsize::new(0),
            valid: AtomicBool::new(true),
        }
    }

    fn composite(kind: ResourceKind, source: &str, parts: Vec<ResourcePart>) -> Self {
        Self {
            parts,
            ..Self::new(kind, source, Bytes::new())
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// The bytes as UTF-8, if they are valid text.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }

    pub fn parts(&self) -> &[ResourcePart] {
        &self.parts
    }

    /// First part playing `role`.
    pub fn part(&self, role: PartRole) -> Option<&ResourcePart> {
        self.parts.iter().find(|p| p.role == role)
    }

    /// Outstanding native references; reaches 0 once the cache releases the resource.
    pub fn native_ref_count(&self) -> usize {
        self.native_refs.load(Ordering::SeqCst)
    }

    /// Simulate the engine destroying the object.
    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }
}

impl Resource for RawResource {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    fn retain(&self) {
        self.native_refs.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self) {
        // Saturates at zero.
        let _ = self
            .native_refs
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }
}

fn is_json_source(source: &str) -> bool {
    let path = source.split(['?', '#']).next().unwrap_or(source);
    path.rsplit_once('.')
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("json"))
}

/// Factory producing [`RawResource`]s.
#[derive(Debug, Default, Clone)]
pub struct RawResourceFactory;

impl RawResourceFactory {
    pub fn new() -> Self {
        Self
    }

    fn check_payload(kind: ResourceKind, payload: &Payload) -> Result<()> {
        if payload.bytes.is_empty() {
            return Err(AssetError::Construction {
                kind,
                message: format!("empty payload from {}", payload.source),
            });
        }
        match kind {
            ResourceKind::Text => {
                std::str::from_utf8(&payload.bytes).map_err(|e| AssetError::Construction {
                    kind,
                    message: format!("{} is not UTF-8: {}", payload.source, e),
                })?;
            }
            ResourceKind::Json => {
                serde_json::from_slice::<serde_json::Value>(&payload.bytes).map_err(|e| {
                    AssetError::Construction {
                        kind,
                        message: format!("{} is not valid JSON: {}", payload.source, e),
                    }
                })?;
            }
            _ => {}
        }
        Ok(())
    }
}

impl ResourceFactory for RawResourceFactory {
    fn create(&self, kind: ResourceKind, payload: Payload) -> Result<ResourceHandle> {
        Self::check_payload(kind, &payload)?;
        Ok(Arc::new(RawResource::new(kind, payload.source, payload.bytes)))
    }

    fn create_part(&self, role: PartRole, payload: Payload) -> Result<ResourceHandle> {
        let kind = match role {
            PartRole::Texture => ResourceKind::Texture,
            // Skeleton data is JSON or the binary `.skel` export.
            PartRole::SkeletonData if is_json_source(&payload.source) => ResourceKind::Json,
            PartRole::SkeletonData => ResourceKind::Binary,
            PartRole::AtlasData | PartRole::FontData | PartRole::SkeletonAtlas => ResourceKind::Text,
        };
        self.create(kind, payload)
    }

    fn assemble(
        &self,
        kind: ResourceKind,
        source: &str,
        parts: Vec<ResourcePart>,
    ) -> Result<ResourceHandle> {
        if parts.is_empty() {
            return Err(AssetError::Construction {
                kind,
                message: format!("no parts to assemble for {}", source),
            });
        }
        if let Some(bad) = parts.iter().find(|p| !p.resource.is_valid()) {
            return Err(AssetError::Construction {
                kind,
                message: format!("part {} is no longer valid", bad.source),
            });
        }
        Ok(Arc::new(RawResource::composite(kind, source, parts)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::downcast;

    #[test]
    fn test_native_ref_count_saturates() {
        let res = RawResource::new(ResourceKind::Binary, "a.bin", Bytes::from_static(b"\x01"));
        res.retain();
        res.retain();
        res.release();
        res.release();
        res.release();
        assert_eq!(res.native_ref_count(), 0);
    }

    #[test]
    fn test_skeleton_data_part_accepts_binary_export() {
        let factory = RawResourceFactory::new();
        let binary = factory
            .create_part(PartRole::SkeletonData, Payload::new("hero.skel", &b"\x00\xffSKEL"[..]))
            .unwrap();
        assert_eq!(binary.kind(), ResourceKind::Binary);

        assert!(factory
            .create_part(PartRole::SkeletonData, Payload::new("hero.json?v=2", &b"{oops"[..]))
            .is_err());
    }

    #[test]
    fn test_create_checks_payload() {
        let factory = RawResourceFactory::new();
        assert!(factory
            .create(ResourceKind::Texture, Payload::new("a.png", Bytes::new()))
            .is_err());
        assert!(factory
            .create(ResourceKind::Json, Payload::new("a.json", &b"{not json"[..]))
            .is_err());
        assert!(factory
            .create(ResourceKind::Text, Payload::new("a.txt", &b"\xff\xfe"[..]))
            .is_err());

        let handle = factory
            .create(ResourceKind::Json, Payload::new("a.json", &br#"{"hp": 3}"#[..]))
            .unwrap();
        assert!(handle.is_valid());
        assert_eq!(handle.kind(), ResourceKind::Json);
    }

    #[test]
    fn test_assemble_links_parts() {
        let factory = RawResourceFactory::new();
        let data = factory
            .create_part(PartRole::FontData, Payload::new("f.fnt", &b"info face=x"[..]))
            .unwrap();
        let page = factory
            .create_part(PartRole::Texture, Payload::new("f.png", &b"\x89PNG"[..]))
            .unwrap();

        let font = factory
            .assemble(
                ResourceKind::BitmapFont,
                "f.fnt",
                vec![
                    ResourcePart { role: PartRole::FontData, source: "f.fnt".into(), resource: data },
                    ResourcePart { role: PartRole::Texture, source: "f.png".into(), resource: page },
                ],
            )
            .unwrap();

        let raw = downcast::<RawResource>(font).unwrap();
        assert_eq!(raw.parts().len(), 2);
        assert_eq!(raw.part(PartRole::Texture).unwrap().source, "f.png");
    }

    #[test]
    fn test_assemble_rejects_invalid_part() {
        let factory = RawResourceFactory::new();
        let page = Arc::new(RawResource::new(ResourceKind::Texture, "f.png", Bytes::from_static(b"x")));
        page.invalidate();

        let result = factory.assemble(
            ResourceKind::BitmapFont,
            "f.fnt",
            vec![ResourcePart { role: PartRole::Texture, source: "f.png".into(), resource: page }],
        );
        assert!(matches!(result, Err(AssetError::Construction { .. })));
    }
}
