use flate2::read::GzDecoder;
use logrotate::{compress_file, Compression, Error};
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use tempfile::tempdir;

fn sample_contents() -> Vec<u8> {
    (0..10_000u32)
        .flat_map(|i| format!("line {i}: the quick brown fox\n").into_bytes())
        .collect()
}

#[test]
fn test_gzip_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("app-1.log");
    let contents = sample_contents();
    fs::write(&path, &contents).unwrap();

    let dst = compress_file(&path, Compression::Gzip).unwrap();

    assert_eq!(dst, dir.path().join("app-1.log.gz"));
    assert!(!path.exists(), "original should be removed");

    let mut decoded = Vec::new();
    GzDecoder::new(fs::File::open(&dst).unwrap())
        .read_to_end(&mut decoded)
        .unwrap();
    assert_eq!(decoded, contents);
    assert!(fs::metadata(&dst).unwrap().len() < contents.len() as u64);
}

#[test]
fn test_zstd_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("app-1.log");
    let contents = sample_contents();
    fs::write(&path, &contents).unwrap();

    let dst = compress_file(&path, Compression::Zstd).unwrap();

    assert_eq!(dst, dir.path().join("app-1.log.zst"));
    assert!(!path.exists());
    let decoded = zstd::decode_all(fs::File::open(&dst).unwrap()).unwrap();
    assert_eq!(decoded, contents);
}

#[test]
fn test_empty_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.log");
    fs::write(&path, b"").unwrap();

    let dst = compress_file(&path, Compression::Gzip).unwrap();

    let mut decoded = Vec::new();
    GzDecoder::new(fs::File::open(&dst).unwrap())
        .read_to_end(&mut decoded)
        .unwrap();
    assert!(decoded.is_empty());
}

#[test]
fn test_replaces_stale_compressed_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("app-1.log");
    fs::write(&path, b"fresh").unwrap();
    fs::write(dir.path().join("app-1.log.gz"), b"not gzip at all, and longer than fresh").unwrap();

    let dst = compress_file(&path, Compression::Gzip).unwrap();

    let mut decoded = String::new();
    GzDecoder::new(fs::File::open(&dst).unwrap())
        .read_to_string(&mut decoded)
        .unwrap();
    assert_eq!(decoded, "fresh");
}

#[test]
fn test_failure_leaves_no_partial_output() {
    let dir = tempdir().unwrap();
    // Opening a directory succeeds but reading it fails mid-stream.
    let path = dir.path().join("app-1.log");
    fs::create_dir(&path).unwrap();
    fs::write(path.join("inner"), b"keep me").unwrap();

    let err = compress_file(&path, Compression::Gzip).unwrap_err();

    assert!(matches!(err, Error::Compress { .. }));
    assert!(!dir.path().join("app-1.log.gz").exists());
    assert_eq!(fs::read(path.join("inner")).unwrap(), b"keep me");
}

#[test]
fn test_missing_source() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("gone.log");

    let err = compress_file(&path, Compression::Gzip).unwrap_err();

    match err {
        Error::Compress { path: p, source } => {
            assert_eq!(p, path);
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!PathBuf::from(format!("{}.gz", path.display())).exists());
}

#[cfg(unix)]
#[test]
fn test_keeps_source_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let path = dir.path().join("app-1.log");
    fs::write(&path, b"secret").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();

    let dst = compress_file(&path, Compression::Gzip).unwrap();

    let mode = fs::metadata(&dst).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
}
