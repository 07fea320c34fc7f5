use std::path::{Path, PathBuf};

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

use crate::error::{EngineError, Result};

const FILE_SCHEME: &str = "file://";

/// Characters escaped in the path component of a `file://` uri.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Resolves a `file://` uri, or a bare filesystem path, to a local path.
///
/// # Example
/// ```
/// use std::path::PathBuf;
///
/// use engine::uri_to_path;
///
/// let path = uri_to_path("file:///videos/My%20Clip.mp4").expect("valid uri");
/// assert_eq!(path, PathBuf::from("/videos/My Clip.mp4"));
/// ```
pub fn uri_to_path(uri: &str) -> Result<PathBuf> {
    if uri.is_empty() {
        return Err(EngineError::InvalidUri {
            uri: uri.to_string(),
        });
    }

    let Some(rest) = uri.strip_prefix(FILE_SCHEME) else {
        if has_scheme(uri) {
            return Err(EngineError::UnsupportedUriScheme {
                uri: uri.to_string(),
            });
        }
        return Ok(PathBuf::from(uri));
    };

    // `file://localhost/path` and `file:///path` both name a local file.
    let path = rest.strip_prefix("localhost").unwrap_or(rest);
    if !path.starts_with('/') {
        return Err(EngineError::InvalidUri {
            uri: uri.to_string(),
        });
    }

    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map_err(|_| EngineError::InvalidUri {
            uri: uri.to_string(),
        })?;
    Ok(PathBuf::from(decoded.as_ref()))
}

/// Builds a `file://` uri for an absolute path.
pub fn path_to_uri(path: &Path) -> String {
    let text = path.to_string_lossy();
    format!("{FILE_SCHEME}{}", utf8_percent_encode(&text, PATH_SEGMENT))
}

/// Final path segment of a uri, as shown in clip lists.
///
/// # Example
/// ```
/// use engine::display_name;
///
/// assert_eq!(display_name("file:///videos/beach.mp4"), "beach.mp4");
/// assert_eq!(display_name("beach.mp4"), "beach.mp4");
/// ```
pub fn display_name(uri: &str) -> &str {
    uri.rsplit('/').next().unwrap_or(uri)
}

fn has_scheme(value: &str) -> bool {
    let Some((scheme, _)) = value.split_once("://") else {
        return false;
    };
    !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::{display_name, path_to_uri, uri_to_path};
    use crate::error::EngineError;

    #[test]
    fn path_to_uri_escapes_spaces_and_hashes() {
        assert_eq!(
            path_to_uri(Path::new("/home/user/My Docs/take #2.mp4")),
            "file:///home/user/My%20Docs/take%20%232.mp4"
        );
    }

    #[test]
    fn uri_round_trips_through_path() {
        let path = PathBuf::from("/tmp/a b/c%d.mp4");
        assert_eq!(uri_to_path(&path_to_uri(&path)).expect("valid uri"), path);
    }

    #[test]
    fn localhost_authority_is_accepted() {
        assert_eq!(
            uri_to_path("file://localhost/tmp/x.mp4").expect("valid uri"),
            PathBuf::from("/tmp/x.mp4")
        );
    }

    #[test]
    fn remote_schemes_are_rejected() {
        assert!(matches!(
            uri_to_path("https://example.com/clip.mp4"),
            Err(EngineError::UnsupportedUriScheme { .. })
        ));
        assert!(matches!(
            uri_to_path("file://server/share/clip.mp4"),
            Err(EngineError::InvalidUri { .. })
        ));
    }

    #[test]
    fn display_name_of_directory_uri_is_empty() {
        assert_eq!(display_name("file:///videos/"), "");
    }
}
