use crate::error::{AppError, ErrorCode};

/// Normalizes a raw URL path segment: percent-decodes once, collapses
/// repeated slashes, ensures a leading slash, and strips a trailing slash
/// (unless the whole path is `/`). Rejects literal or percent-encoded `..`
/// segments before the caller ever resolves the path against storage.
pub fn normalize(raw: &str) -> Result<String, AppError> {
    let decoded = percent_decode(raw)?;

    if contains_parent_segment(&decoded) {
        return Err(AppError::new(ErrorCode::InvalidPath, "path traversal is not allowed"));
    }

    let mut collapsed = String::with_capacity(decoded.len() + 1);
    collapsed.push('/');
    let mut prev_was_slash = true;

    for ch in decoded.trim_start_matches('/').chars() {
        if ch == '/' {
            if prev_was_slash {
                continue;
            }
            prev_was_slash = true;
        } else {
            prev_was_slash = false;
        }
        collapsed.push(ch);
    }

    if collapsed.len() > 1 && collapsed.ends_with('/') {
        collapsed.pop();
    }

    Ok(collapsed)
}

fn contains_parent_segment(path: &str) -> bool {
    path.split('/').any(|segment| segment == "..")
}

fn percent_decode(raw: &str) -> Result<String, AppError> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok());

            match hex {
                Some(byte) => {
                    out.push(byte);
                    i += 3;
                }
                None => {
                    return Err(AppError::new(
                        ErrorCode::InvalidPath,
                        "malformed percent-encoding in path",
                    ))
                }
            }
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8(out)
        .map_err(|_| AppError::new(ErrorCode::InvalidPath, "path is not valid UTF-8"))
}

/// Whether `scope_path` contains `request_path`, treating scope as
/// recursive over descendants (see the folder-scope glossary entry).
pub fn is_descendant_or_equal(scope_path: &str, request_path: &str) -> bool {
    if scope_path == request_path {
        return true;
    }

    let prefix = if scope_path.ends_with('/') {
        scope_path.to_string()
    } else {
        format!("{scope_path}/")
    };

    request_path.starts_with(&prefix)
}
