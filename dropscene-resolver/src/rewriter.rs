use std::borrow::Cow;

use log::{debug, warn};

use crate::manifest::{Manifest, ReferenceKind};
use crate::report::UnresolvedReference;
use crate::resource::{ResourceHandle, ResourceIndex};
use crate::scene::ResolvedScene;

/// Points the manifest's buffer and image references at the resources of `index`.
///
/// References without a matching resource keep their original URI and are returned, rewriting the
/// other references carries on regardless.
pub fn rewrite(mut manifest: Manifest, index: ResourceIndex) -> (ResolvedScene, Vec<UnresolvedReference>) {
    let mut unresolved = Vec::new();

    for kind in ReferenceKind::ALL {
        for reference in manifest.references(kind) {
            let lookup_key = kind.lookup_key(&reference.uri);
            match find(&index, kind, lookup_key) {
                Some(handle) => {
                    debug!(
                        "{} #{}: {} -> {}",
                        kind,
                        reference.index,
                        reference.uri,
                        handle.uri()
                    );
                    manifest.set_uri(kind, reference.index, handle.uri().to_string());
                }
                None => {
                    warn!(
                        "{} #{} references {}, which is not part of the drop",
                        kind, reference.index, reference.uri
                    );
                    unresolved.push(UnresolvedReference {
                        kind,
                        index: reference.index,
                        lookup_key: lookup_key.to_string(),
                        uri: reference.uri,
                    });
                }
            }
        }
    }

    (ResolvedScene::new(manifest, index), unresolved)
}

fn find<'a>(index: &'a ResourceIndex, kind: ReferenceKind, key: &str) -> Option<&'a ResourceHandle> {
    let lookup = |name: &str| match kind {
        ReferenceKind::Buffer => index.buffer(name),
        ReferenceKind::Image => index.image(name),
    };

    // Manifest URIs are URI references and may be percent-encoded (`my%20texture.png`), file names are not.
    lookup(key).or_else(|| match urlencoding::decode(key) {
        Ok(Cow::Owned(decoded)) => lookup(&decoded),
        _ => None,
    })
}
