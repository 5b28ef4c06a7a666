#[cfg(test)]
mod tests {
    use crate::walk::{
        read_payload_info, BodyMode, Content, EntryWalker, PayloadInfo, RpmWalker, SevenZWalker,
        TarCompression, TarWalker, WalkItem, ZipWalker,
    };
    use archdiff_common::{ArchDiffError, EntryKind, FileMode};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs;
    use std::io::{self, Write};
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;
    use xz2::write::XzEncoder;

    fn collect(walker: &dyn EntryWalker) -> Vec<WalkItem> {
        let mut items = Vec::new();
        walker
            .walk(&mut |item| {
                items.push(item);
                Ok(())
            })
            .expect("walk failed");
        items
    }

    fn find<'a>(items: &'a [WalkItem], path: &str) -> &'a crate::walk::WalkEntry {
        items
            .iter()
            .filter_map(|item| item.as_ref().ok())
            .find(|entry| entry.meta.path == path)
            .unwrap_or_else(|| panic!("entry {} not found", path))
    }

    // ============================================================================
    // TAR Walker Tests
    // ============================================================================

    fn append(
        builder: &mut tar::Builder<impl Write>,
        path: &str,
        entry_type: tar::EntryType,
        mode: u32,
        data: &[u8],
    ) {
        let mut header = tar::Header::new_gnu();
        header.set_path(path).expect("set path");
        header.set_entry_type(entry_type);
        header.set_mode(mode);
        header.set_uid(1000);
        header.set_gid(100);
        header.set_username("alice").expect("set username");
        header.set_groupname("users").expect("set groupname");
        header.set_size(data.len() as u64);
        header.set_cksum();
        builder.append(&header, data).expect("append entry");
    }

    fn append_link(
        builder: &mut tar::Builder<impl Write>,
        path: &str,
        entry_type: tar::EntryType,
        target: &str,
    ) {
        let mut header = tar::Header::new_gnu();
        header.set_path(path).expect("set path");
        header.set_entry_type(entry_type);
        header.set_mode(0o777);
        header.set_link_name(target).expect("set link name");
        header.set_size(0);
        header.set_cksum();
        builder.append(&header, io::empty()).expect("append link");
    }

    fn write_sample_tar<W: Write>(writer: W) -> W {
        let mut builder = tar::Builder::new(writer);
        append(&mut builder, "pkg/", tar::EntryType::Directory, 0o755, b"");
        append(&mut builder, "pkg/orig.txt", tar::EntryType::Regular, 0o644, b"original");
        append(&mut builder, "pkg/run.sh", tar::EntryType::Regular, 0o4755, b"#!/bin/sh\n");
        append_link(&mut builder, "pkg/hard.txt", tar::EntryType::Link, "orig.txt");
        append_link(&mut builder, "pkg/soft.txt", tar::EntryType::Symlink, "../elsewhere");
        builder.into_inner().expect("finish tar")
    }

    fn sample_tar(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let file = fs::File::create(&path).expect("create tar");
        write_sample_tar(file);
        path
    }

    #[test]
    fn test_tar_walker_entries() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = sample_tar(temp_dir.path(), "sample.tar");

        let walker = TarWalker::new(path, TarCompression::None);
        let items = collect(&walker);
        assert_eq!(items.len(), 5);

        let dir = find(&items, "pkg");
        assert_eq!(dir.meta.kind, EntryKind::Dir);
        assert_eq!(dir.meta.mode, FileMode(0o040755));
        assert!(matches!(dir.content, Content::Empty));

        let file = find(&items, "pkg/orig.txt");
        assert_eq!(file.meta.kind, EntryKind::File);
        assert_eq!(file.meta.mode, FileMode(0o100644));
        assert_eq!(file.meta.uid, Some(1000));
        assert_eq!(file.meta.gid, Some(100));
        assert_eq!(file.meta.user_name.as_deref(), Some("alice"));
        assert_eq!(file.meta.group_name.as_deref(), Some("users"));
        assert_eq!(file.content.read_all().unwrap(), b"original");

        let script = find(&items, "pkg/run.sh");
        assert_eq!(script.meta.mode, FileMode(0o104755));
    }

    #[test]
    fn test_tar_hard_link_is_symlink_shaped() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = sample_tar(temp_dir.path(), "links.tar");

        let items = collect(&TarWalker::new(path, TarCompression::None));

        let hard = find(&items, "pkg/hard.txt");
        assert_eq!(hard.meta.kind, EntryKind::Symlink);
        assert_eq!(hard.content.link_target(), Some("orig.txt"));

        let soft = find(&items, "pkg/soft.txt");
        assert_eq!(soft.meta.kind, EntryKind::Symlink);
        assert_eq!(soft.content.link_target(), Some("../elsewhere"));
    }

    #[test]
    fn test_tar_gzip_and_xz() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let tgz = temp_dir.path().join("sample.tgz");
        let encoder = GzEncoder::new(fs::File::create(&tgz).unwrap(), Compression::default());
        write_sample_tar(encoder).finish().expect("finish gzip");

        let txz = temp_dir.path().join("sample.tar.xz");
        let encoder = XzEncoder::new(fs::File::create(&txz).unwrap(), 6);
        write_sample_tar(encoder).finish().expect("finish xz");

        for (path, compression) in [(tgz, TarCompression::Gzip), (txz, TarCompression::Xz)] {
            let items = collect(&TarWalker::new(path, compression));
            assert_eq!(items.len(), 5);
            assert_eq!(find(&items, "pkg/orig.txt").content.read_all().unwrap(), b"original");
        }
    }

    #[test]
    fn test_tar_wrong_compression_is_corrupt() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = sample_tar(temp_dir.path(), "plain.tgz");

        let result = TarWalker::new(path, TarCompression::Gzip).walk(&mut |_| Ok(()));
        assert!(matches!(result, Err(ArchDiffError::ContainerCorrupt { .. })));
    }

    #[test]
    fn test_tar_short_body_is_entry_failure() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("short.tar");

        let mut builder = tar::Builder::new(Vec::new());
        append(&mut builder, "big.bin", tar::EntryType::Regular, 0o644, &[7u8; 100]);
        let mut bytes = builder.into_inner().unwrap();
        // Header block plus 40 of the 100 body bytes
        bytes.truncate(512 + 40);
        fs::write(&path, bytes).unwrap();

        let mut failures = Vec::new();
        let result = TarWalker::new(path, TarCompression::None).walk(&mut |item| {
            if let Err(failure) = item {
                failures.push(failure);
            }
            Ok(())
        });

        // The walk itself may end with a corrupt-container error after the failed member
        assert!(
            matches!(result, Ok(()) | Err(ArchDiffError::ContainerCorrupt { .. })),
            "unexpected walk result: {:?}",
            result
        );
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path, "big.bin");
        assert!(failures[0].meta.is_some());
        match &failures[0].error {
            ArchDiffError::EntryRead { reason, .. } => {
                assert_eq!(reason, "size mismatch: expected 100, got 40")
            }
            other => panic!("expected EntryRead, got {:?}", other),
        }
    }

    #[test]
    fn test_tar_skip_bodies() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = sample_tar(temp_dir.path(), "skip.tar");

        let walker = TarWalker::new(path, TarCompression::None).with_body_mode(BodyMode::Skip);
        let items = collect(&walker);
        assert_eq!(items.len(), 5);
        let file = find(&items, "pkg/orig.txt");
        assert!(matches!(file.content, Content::Skipped { size: 8 }));
    }

    #[test]
    fn test_tar_visitor_abort_stops_walk() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = sample_tar(temp_dir.path(), "abort.tar");

        let mut visited = 0;
        let result = TarWalker::new(path, TarCompression::None).walk(&mut |_| {
            visited += 1;
            Err(ArchDiffError::Config("stop".to_string()))
        });

        assert_eq!(visited, 1);
        assert!(matches!(result, Err(ArchDiffError::Config(ref msg)) if msg == "stop"));
    }

    #[test]
    fn test_tar_missing_file() {
        let result = TarWalker::new(PathBuf::from("/nonexistent/a.tar"), TarCompression::None)
            .walk(&mut |_| Ok(()));
        assert!(matches!(result, Err(ArchDiffError::Open { .. })));
    }

    // ============================================================================
    // ZIP Walker Tests
    // ============================================================================

    fn sample_zip(path: &Path) {
        let file = fs::File::create(path).expect("Failed to create file");
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default();

        zip.add_directory("a/", options.unix_permissions(0o750))
            .expect("Failed to add directory");
        zip.start_file("a/f.txt", options.unix_permissions(0o755))
            .expect("Failed to start file");
        zip.write_all(b"Hello, ZIP!").expect("Failed to write");
        zip.start_file("a/./g.txt", options.unix_permissions(0o600))
            .expect("Failed to start file");
        zip.write_all(b"g").expect("Failed to write");
        zip.finish().expect("Failed to finish ZIP");
    }

    #[test]
    fn test_zip_walker_entries() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let zip_path = temp_dir.path().join("test.zip");
        sample_zip(&zip_path);

        let items = collect(&ZipWalker::new(zip_path));
        assert_eq!(items.len(), 3);

        let dir = find(&items, "a");
        assert_eq!(dir.meta.kind, EntryKind::Dir);
        assert_eq!(dir.meta.mode.permissions(), 0o750);

        let file = find(&items, "a/f.txt");
        assert_eq!(file.meta.kind, EntryKind::File);
        assert_eq!(file.meta.mode.permissions(), 0o755);
        assert_eq!(file.content.read_all().unwrap(), b"Hello, ZIP!");

        let g = find(&items, "a/g.txt");
        assert_eq!(g.meta.mode.permissions(), 0o600);
        assert_eq!(g.meta.uid, None);
    }

    #[test]
    fn test_zip_walker_garbage_is_corrupt() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let zip_path = temp_dir.path().join("broken.zip");
        fs::write(&zip_path, b"this is not a zip archive").unwrap();

        let mut visited = 0;
        let result = ZipWalker::new(zip_path).walk(&mut |_| {
            visited += 1;
            Ok(())
        });
        assert_eq!(visited, 0);
        assert!(matches!(result, Err(ArchDiffError::ContainerCorrupt { .. })));
    }

    #[test]
    fn test_zip_corrupt_member_is_entry_failure() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let zip_path = temp_dir.path().join("damaged.zip");

        let mut zip = zip::ZipWriter::new(io::Cursor::new(Vec::new()));
        let options =
            zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
        zip.start_file("first.txt", options).expect("Failed to start file");
        zip.write_all(b"FIRST-MEMBER-BODY").expect("Failed to write");
        zip.start_file("second.txt", options).expect("Failed to start file");
        zip.write_all(b"second").expect("Failed to write");
        let mut bytes = zip.finish().expect("Failed to finish ZIP").into_inner();

        let body = bytes
            .windows(b"FIRST-MEMBER-BODY".len())
            .position(|window| window == b"FIRST-MEMBER-BODY")
            .expect("stored body not found");
        bytes[body] ^= 0xff;
        fs::write(&zip_path, bytes).unwrap();

        let mut seen = Vec::new();
        let result = ZipWalker::new(zip_path).walk(&mut |item| {
            seen.push(item);
            Ok(())
        });

        assert!(result.is_ok(), "walk failed: {:?}", result);
        assert_eq!(seen.len(), 2);

        match &seen[0] {
            Err(failure) => {
                assert_eq!(failure.path, "first.txt");
                match &failure.error {
                    ArchDiffError::EntryRead { path, reason } => {
                        assert_eq!(path, "first.txt");
                        assert!(reason.contains("Invalid checksum"), "{}", reason);
                    }
                    other => panic!("expected EntryRead, got {:?}", other),
                }
            }
            Ok(entry) => panic!("expected failure, got {}", entry.meta.path),
        }

        let second = seen[1].as_ref().expect("second member should read");
        assert_eq!(second.meta.path, "second.txt");
        assert_eq!(second.content.read_all().unwrap(), b"second");
    }

    // ============================================================================
    // 7Z Walker Tests
    // ============================================================================

    #[test]
    fn test_sevenz_walker_entries() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(src.join("top.txt"), b"top").unwrap();
        fs::write(src.join("sub").join("inner.txt"), b"inner content").unwrap();

        let archive = temp_dir.path().join("test.7z");
        sevenz_rust::compress_to_path(&src, &archive).expect("Failed to create 7z");

        let items = collect(&SevenZWalker::new(archive));
        assert!(items.iter().all(|item| item.is_ok()));

        let inner = find(&items, "sub/inner.txt");
        assert_eq!(inner.meta.kind, EntryKind::File);
        assert_eq!(inner.meta.uid, None);
        assert_eq!(inner.content.read_all().unwrap(), b"inner content");

        assert_eq!(find(&items, "sub").meta.kind, EntryKind::Dir);
        assert_eq!(find(&items, "top.txt").content.read_all().unwrap(), b"top");
    }

    #[test]
    fn test_sevenz_visitor_abort_stops_walk() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        for i in 0..5 {
            fs::write(src.join(format!("file{}.txt", i)), format!("body {}", i)).unwrap();
        }

        let archive = temp_dir.path().join("abort.7z");
        sevenz_rust::compress_to_path(&src, &archive).expect("Failed to create 7z");

        let mut visited = 0;
        let result = SevenZWalker::new(archive).walk(&mut |_| {
            visited += 1;
            Err(ArchDiffError::Config(format!("stop {}", visited)))
        });

        assert_eq!(visited, 1);
        assert!(matches!(result, Err(ArchDiffError::Config(ref msg)) if msg == "stop 1"));
    }

    #[test]
    fn test_sevenz_walker_garbage_is_corrupt() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("broken.7z");
        fs::write(&path, b"not seven zip").unwrap();

        let result = SevenZWalker::new(path).walk(&mut |_| Ok(()));
        assert!(matches!(result, Err(ArchDiffError::ContainerCorrupt { .. })));
    }

    // ============================================================================
    // RPM Walker Tests
    // ============================================================================

    fn rpm_header(tags: &[(u32, &str)]) -> Vec<u8> {
        let mut index = Vec::new();
        let mut store = Vec::new();
        for (tag, value) in tags {
            index.extend_from_slice(&tag.to_be_bytes());
            index.extend_from_slice(&6u32.to_be_bytes());
            index.extend_from_slice(&(store.len() as u32).to_be_bytes());
            index.extend_from_slice(&1u32.to_be_bytes());
            store.extend_from_slice(value.as_bytes());
            store.push(0);
        }

        let mut out = vec![0x8e, 0xad, 0xe8, 0x01, 0, 0, 0, 0];
        out.extend_from_slice(&(tags.len() as u32).to_be_bytes());
        out.extend_from_slice(&(store.len() as u32).to_be_bytes());
        out.extend(index);
        out.extend(store);
        out
    }

    fn build_rpm(format: &str, compressor: &str, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; 96];
        out[..4].copy_from_slice(&[0xed, 0xab, 0xee, 0xdb]);
        out.extend(rpm_header(&[(1000, "sig")]));
        while out.len() % 8 != 0 {
            out.push(0);
        }
        out.extend(rpm_header(&[(1000, "pkg"), (1124, format), (1125, compressor)]));
        out.extend_from_slice(payload);
        out
    }

    fn cpio_payload() -> Vec<u8> {
        let entries: [(&str, u32, &[u8]); 4] = [
            ("./usr", 0o040755, b""),
            ("./usr/bin/tool", 0o100755, b"binary"),
            ("./usr/bin/alias", 0o120777, b"tool"),
            ("./etc/tool.conf", 0o100640, b"key=value\n"),
        ];

        let mut out = Vec::new();
        for (name, mode, data) in entries {
            let mut writer = cpio::NewcBuilder::new(name)
                .mode(mode)
                .uid(0)
                .gid(10)
                .write(&mut out, data.len() as u32);
            writer.write_all(data).expect("write cpio body");
            writer.finish().expect("finish cpio entry");
        }
        cpio::newc::trailer(&mut out).expect("write trailer");
        out
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn xz(data: &[u8]) -> Vec<u8> {
        let mut encoder = XzEncoder::new(Vec::new(), 6);
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_read_payload_info() {
        let bytes = build_rpm("cpio", "xz", b"");
        let info = read_payload_info(&mut bytes.as_slice()).expect("parse rpm headers");
        assert_eq!(
            info,
            PayloadInfo {
                format: Some("cpio".to_string()),
                compressor: Some("xz".to_string()),
            }
        );
    }

    #[test]
    fn test_read_payload_info_oversized_store_is_truncated() {
        let mut bytes = vec![0u8; 96];
        bytes[..4].copy_from_slice(&[0xed, 0xab, 0xee, 0xdb]);
        bytes.extend_from_slice(&[0x8e, 0xad, 0xe8, 0x01, 0, 0, 0, 0]);
        bytes.extend_from_slice(&0u32.to_be_bytes());
        // Claims a 200 MiB store backed by four bytes
        bytes.extend_from_slice(&(200u32 * 1024 * 1024).to_be_bytes());
        bytes.extend_from_slice(b"tiny");

        let err = read_payload_info(&mut bytes.as_slice()).expect_err("store should be short");
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(err.to_string().contains("expected 209715200 bytes, got 4"), "{}", err);
    }

    #[test]
    fn test_rpm_walker_gzip_and_xz_payloads() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let payload = cpio_payload();

        for (name, compressor, compressed) in [
            ("gz.rpm", "gzip", gzip(&payload)),
            ("xz.rpm", "xz", xz(&payload)),
        ] {
            let path = temp_dir.path().join(name);
            fs::write(&path, build_rpm("cpio", compressor, &compressed)).unwrap();

            let items = collect(&RpmWalker::new(path));
            assert_eq!(items.len(), 4, "{}", name);

            assert_eq!(find(&items, "usr").meta.kind, EntryKind::Dir);

            let tool = find(&items, "usr/bin/tool");
            assert_eq!(tool.meta.mode, FileMode(0o100755));
            assert_eq!(tool.meta.uid, Some(0));
            assert_eq!(tool.meta.gid, Some(10));
            assert_eq!(tool.content.read_all().unwrap(), b"binary");

            let alias = find(&items, "usr/bin/alias");
            assert_eq!(alias.meta.kind, EntryKind::Symlink);
            assert_eq!(alias.content.link_target(), Some("tool"));

            assert_eq!(find(&items, "etc/tool.conf").meta.mode.perm_string(), "0640");
        }
    }

    #[test]
    fn test_rpm_unsupported_compression_fails_before_visit() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("bz.rpm");
        fs::write(&path, build_rpm("cpio", "bzip2", b"BZh9")).unwrap();

        let mut visited = 0;
        let result = RpmWalker::new(path).walk(&mut |_| {
            visited += 1;
            Ok(())
        });

        assert_eq!(visited, 0);
        match result {
            Err(ArchDiffError::ContainerCorrupt { reason, .. }) => {
                assert_eq!(reason, "unsupported rpm compression format: bzip2")
            }
            other => panic!("expected ContainerCorrupt, got {:?}", other),
        }
    }

    #[test]
    fn test_rpm_unsupported_payload_format() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("drpm.rpm");
        fs::write(&path, build_rpm("drpm", "xz", b"")).unwrap();

        let result = RpmWalker::new(path).walk(&mut |_| Ok(()));
        match result {
            Err(ArchDiffError::ContainerCorrupt { reason, .. }) => {
                assert_eq!(reason, "unsupported payload format: drpm")
            }
            other => panic!("expected ContainerCorrupt, got {:?}", other),
        }
    }

    #[test]
    fn test_rpm_bad_lead() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("fake.rpm");
        fs::write(&path, vec![0u8; 200]).unwrap();

        let result = RpmWalker::new(path).walk(&mut |_| Ok(()));
        assert!(matches!(result, Err(ArchDiffError::ContainerCorrupt { .. })));
    }

    #[test]
    fn test_rpm_truncated_payload() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("cut.rpm");
        let mut payload = cpio_payload();
        payload.truncate(60);
        fs::write(&path, build_rpm("cpio", "gzip", &gzip(&payload))).unwrap();

        let result = RpmWalker::new(path).walk(&mut |_| Ok(()));
        assert!(matches!(result, Err(ArchDiffError::ContainerCorrupt { .. })));
    }
}
