mod directory;

pub use directory::DirectoryDocument;

use std::path::Path;

/// File extensions treated as image elements.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp", "gif"];

/// Inclusion rule for document candidates: a recognised image extension.
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_match_ignores_case() {
        assert!(is_image_file(Path::new("a/B.JPG")));
        assert!(is_image_file(Path::new("c.webp")));
        assert!(!is_image_file(Path::new("d.txt")));
        assert!(!is_image_file(Path::new("png")));
    }
}
