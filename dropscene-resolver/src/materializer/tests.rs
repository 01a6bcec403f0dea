use std::sync::Arc;

use super::*;
use crate::entry::memory::MemoryFile;

fn dropped(file: MemoryFile) -> DroppedFile<MemoryFile> {
    DroppedFile {
        name: file.name().to_string(),
        path: format!("drop/{}", file.name()),
        handle: file,
    }
}

#[tokio::test]
async fn manifest_is_decoded_as_text() {
    let allocator = HandleAllocator::new(1);
    let mut bytes = UTF8_BOM.to_vec();
    bytes.extend_from_slice(br#"{"asset":{"version":"2.0"}}"#);

    let resource = materialize(
        &dropped(MemoryFile::untyped("scene.gltf", bytes)),
        ResourceRole::Manifest,
        &allocator,
    )
    .await
    .unwrap();

    let MaterializedResource::Manifest { name, path, text } = resource else {
        panic!("expected manifest text");
    };
    assert_eq!(name, "scene.gltf");
    assert_eq!(path, "drop/scene.gltf");
    assert_eq!(text, r#"{"asset":{"version":"2.0"}}"#);
}

#[tokio::test]
async fn binaries_are_tagged_with_media_types() {
    let allocator = HandleAllocator::new(1);

    let buffer = materialize(
        &dropped(MemoryFile::new("scene.bin", "text/plain", vec![1, 2, 3])),
        ResourceRole::ExternalBuffer,
        &allocator,
    )
    .await
    .unwrap();
    let image = materialize(
        &dropped(MemoryFile::new("tex.png", "image/png", vec![4])),
        ResourceRole::Image,
        &allocator,
    )
    .await
    .unwrap();

    let MaterializedResource::Buffer(buffer) = buffer else {
        panic!("expected a buffer");
    };
    assert_eq!(buffer.media_type(), "application/octet-stream");
    assert_eq!(buffer.bytes(), &[1, 2, 3]);

    let MaterializedResource::Image(image) = image else {
        panic!("expected an image");
    };
    assert_eq!(image.media_type(), "image/png");
    assert_ne!(buffer.uri(), image.uri());
}

#[tokio::test]
async fn read_and_decode_failures_name_the_file() {
    let allocator = HandleAllocator::new(1);

    let unreadable = materialize(
        &dropped(MemoryFile::failing("scene.bin", "", "device not ready")),
        ResourceRole::ExternalBuffer,
        &allocator,
    )
    .await
    .unwrap_err();
    assert_eq!(unreadable.name, "scene.bin");
    assert_eq!(unreadable.path, "drop/scene.bin");
    assert_eq!(unreadable.role, ResourceRole::ExternalBuffer);
    assert!(unreadable.reason.contains("device not ready"));

    let not_utf8 = materialize(
        &dropped(MemoryFile::untyped("scene.gltf", vec![0xFF, 0xFE, 0x00])),
        ResourceRole::Manifest,
        &allocator,
    )
    .await
    .unwrap_err();
    assert_eq!(not_utf8.role, ResourceRole::Manifest);
}

#[test_log::test(tokio::test)]
async fn batch_isolates_failures_and_skips_unknown_files() {
    let mut files = FlatFileSet::default();
    for file in [
        MemoryFile::untyped("scene.gltf", "{}"),
        MemoryFile::untyped("scene.bin", vec![0; 16]),
        MemoryFile::failing("broken.bin", "", "checksum mismatch"),
        MemoryFile::new("tex.png", "image/png", vec![0; 4]),
        MemoryFile::new("readme.txt", "text/plain", "hello"),
        MemoryFile::untyped("model.glb", b"glTF".to_vec()),
    ] {
        files.insert(dropped(file));
    }

    let batch = materialize_all(files, Arc::new(HandleAllocator::new(7))).await;

    assert_eq!(batch.ignored, ["readme.txt"]);
    assert_eq!(batch.failures.len(), 1);
    assert_eq!(batch.failures[0].name, "broken.bin");

    let loaded = batch
        .resources
        .iter()
        .map(|resource| (resource.name(), resource.role()))
        .collect::<Vec<_>>();
    assert_eq!(
        loaded,
        [
            ("model.glb", ResourceRole::SelfContainedPackage),
            ("scene.bin", ResourceRole::ExternalBuffer),
            ("scene.gltf", ResourceRole::Manifest),
            ("tex.png", ResourceRole::Image),
        ]
    );
}
