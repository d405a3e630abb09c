//! Emulated file-system tools.
//!
//! The agent asks its host to read and write text files
//! (`fs/read_text_file`, `fs/write_text_file`). The bridge services
//! both locally, constrained to the project root: a path whose
//! canonical form escapes the root is refused before any filesystem
//! access. Reads of missing files return empty content, not an error.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::fs;

use gb_protocol::{Frame, RequestId, RpcError};

#[derive(Debug, Deserialize)]
struct ReadParams {
    path: String,
}

#[derive(Debug, Deserialize)]
struct WriteParams {
    path: String,
    #[serde(default)]
    content: String,
}

/// Resolve a requested path against the canonical project root.
///
/// Relative paths are joined onto the root. The candidate is resolved
/// through its nearest existing ancestor so not-yet-created files can
/// still be checked, then verified to be contained in the root.
pub fn resolve_path(root: &Path, requested: &str) -> Result<PathBuf, String> {
    let requested_path = Path::new(requested);
    let candidate = if requested_path.is_absolute() {
        requested_path.to_path_buf()
    } else {
        root.join(requested_path)
    };

    let resolved = if candidate.exists() {
        candidate
            .canonicalize()
            .map_err(|e| format!("cannot resolve path '{}': {e}", candidate.display()))?
    } else {
        // Walk up to the nearest existing ancestor, canonicalize it, and
        // re-append the missing tail.
        let mut existing = candidate.as_path();
        let mut tail: Vec<&std::ffi::OsStr> = Vec::new();
        loop {
            if existing.exists() {
                break;
            }
            match existing.parent() {
                Some(parent) => {
                    if let Some(name) = existing.file_name() {
                        tail.push(name);
                    } else {
                        return Err(format!("path '{requested}' cannot be resolved"));
                    }
                    existing = parent;
                }
                None => return Err(format!("path '{requested}' has no existing ancestor")),
            }
        }
        let mut resolved = existing
            .canonicalize()
            .map_err(|e| format!("cannot resolve ancestor of '{}': {e}", candidate.display()))?;
        for name in tail.into_iter().rev() {
            resolved.push(name);
        }
        resolved
    };

    if !resolved.starts_with(root) {
        return Err(format!(
            "path '{}' resolves outside project root '{}'",
            requested,
            root.display()
        ));
    }

    Ok(resolved)
}

/// Service `fs/read_text_file`. A missing file is empty content.
pub async fn handle_read(root: &Path, id: RequestId, params: Option<Value>) -> Frame {
    let params: ReadParams = match parse_params(params) {
        Ok(p) => p,
        Err(e) => return Frame::response_err(id, RpcError::invalid_params(e)),
    };

    let path = match resolve_path(root, &params.path) {
        Ok(p) => p,
        Err(e) => return Frame::response_err(id, RpcError::invalid_params(e)),
    };

    match fs::read_to_string(&path).await {
        Ok(content) => Frame::response_ok(id, json!({ "content": content })),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Frame::response_ok(id, json!({ "content": "" }))
        }
        Err(e) => Frame::response_err(
            id,
            RpcError::file_io(format!("failed to read '{}': {e}", path.display())),
        ),
    }
}

/// Service `fs/write_text_file`. Returns the response frame plus the
/// written path on success, for the turn's modified-file tracking.
pub async fn handle_write(
    root: &Path,
    id: RequestId,
    params: Option<Value>,
) -> (Frame, Option<PathBuf>) {
    let params: WriteParams = match parse_params(params) {
        Ok(p) => p,
        Err(e) => return (Frame::response_err(id, RpcError::invalid_params(e)), None),
    };

    let path = match resolve_path(root, &params.path) {
        Ok(p) => p,
        Err(e) => return (Frame::response_err(id, RpcError::invalid_params(e)), None),
    };

    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent).await {
            return (
                Frame::response_err(
                    id,
                    RpcError::file_io(format!(
                        "failed to create '{}': {e}",
                        parent.display()
                    )),
                ),
                None,
            );
        }
    }

    match fs::write(&path, params.content.as_bytes()).await {
        Ok(()) => (Frame::response_ok(id, Value::Null), Some(path)),
        Err(e) => (
            Frame::response_err(
                id,
                RpcError::file_io(format!("failed to write '{}': {e}", path.display())),
            ),
            None,
        ),
    }
}

fn parse_params<T: for<'de> Deserialize<'de>>(params: Option<Value>) -> Result<T, String> {
    let params = params.ok_or_else(|| "missing params".to_owned())?;
    serde_json::from_value(params).map_err(|e| format!("invalid params: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gb_protocol::codes;

    fn canonical_root(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().canonicalize().unwrap()
    }

    #[test]
    fn relative_path_resolves_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = canonical_root(&dir);
        std::fs::write(root.join("a.txt"), "x").unwrap();
        let resolved = resolve_path(&root, "a.txt").unwrap();
        assert_eq!(resolved, root.join("a.txt"));
    }

    #[test]
    fn absolute_path_inside_root_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let root = canonical_root(&dir);
        let abs = root.join("sub/b.txt");
        let resolved = resolve_path(&root, abs.to_str().unwrap()).unwrap();
        assert_eq!(resolved, abs);
    }

    #[test]
    fn dotdot_escape_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let root = canonical_root(&dir);
        let err = resolve_path(&root, "../outside.txt").unwrap_err();
        assert!(err.contains("outside project root"));
    }

    #[test]
    fn absolute_escape_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let root = canonical_root(&dir);
        assert!(resolve_path(&root, "/etc/passwd").is_err());
    }

    #[test]
    fn symlink_escape_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let root = canonical_root(&dir);
        std::os::unix::fs::symlink(outside.path(), root.join("link")).unwrap();
        let err = resolve_path(&root, "link/secret.txt").unwrap_err();
        assert!(err.contains("outside project root"));
    }

    #[tokio::test]
    async fn read_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = canonical_root(&dir);
        std::fs::write(root.join("hello.txt"), "content here").unwrap();

        let frame = handle_read(
            &root,
            RequestId::Num(1),
            Some(json!({ "path": "hello.txt" })),
        )
        .await;
        match frame {
            Frame::Response { result: Some(r), error: None, .. } => {
                assert_eq!(r["content"], "content here");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn read_missing_file_is_empty_content() {
        let dir = tempfile::tempdir().unwrap();
        let root = canonical_root(&dir);
        let frame = handle_read(
            &root,
            RequestId::Num(2),
            Some(json!({ "path": "nope.txt" })),
        )
        .await;
        match frame {
            Frame::Response { result: Some(r), error: None, .. } => {
                assert_eq!(r["content"], "");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn read_escaping_path_is_invalid_params() {
        let dir = tempfile::tempdir().unwrap();
        let root = canonical_root(&dir);
        let frame = handle_read(
            &root,
            RequestId::Num(3),
            Some(json!({ "path": "../../x" })),
        )
        .await;
        match frame {
            Frame::Response { error: Some(e), .. } => {
                assert_eq!(e.code, codes::INVALID_PARAMS);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn write_creates_parents_and_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let root = canonical_root(&dir);
        let (frame, path) = handle_write(
            &root,
            RequestId::Num(4),
            Some(json!({ "path": "deep/nested/f.txt", "content": "data" })),
        )
        .await;
        match frame {
            Frame::Response { result, error: None, .. } => {
                // Writes answer with a null result.
                assert_eq!(result, Some(Value::Null));
            }
            other => panic!("unexpected {other:?}"),
        }
        let path = path.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "data");
        assert!(path.starts_with(&root));
    }

    #[tokio::test]
    async fn write_escaping_path_reports_no_path() {
        let dir = tempfile::tempdir().unwrap();
        let root = canonical_root(&dir);
        let (frame, path) = handle_write(
            &root,
            RequestId::Num(5),
            Some(json!({ "path": "/tmp/evil.txt", "content": "x" })),
        )
        .await;
        assert!(path.is_none());
        match frame {
            Frame::Response { error: Some(e), .. } => {
                assert_eq!(e.code, codes::INVALID_PARAMS);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_params_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let root = canonical_root(&dir);
        let frame = handle_read(&root, RequestId::Num(6), None).await;
        match frame {
            Frame::Response { error: Some(e), .. } => {
                assert_eq!(e.code, codes::INVALID_PARAMS);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
