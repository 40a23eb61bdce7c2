//! Image selection in a remote directory listing.

use std::path::Path;

use hubpress_shared::{RemoteEntry, RepoLocation};

/// Extensions treated as images, compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "bmp", "svg", "webp"];

/// Whether `name`'s final extension is an image extension.
pub fn is_image(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Regular files of the listing whose name is an image.
pub fn image_entries(entries: &[RemoteEntry]) -> Vec<&RemoteEntry> {
    entries
        .iter()
        .filter(|entry| entry.is_file() && is_image(&entry.name))
        .collect()
}

/// Raw download URLs of the listing's images, in listing order.
pub fn image_urls(entries: &[RemoteEntry], location: &RepoLocation) -> Vec<String> {
    image_entries(entries)
        .into_iter()
        .map(|entry| location.raw_url(&entry.path))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, kind: &str) -> RemoteEntry {
        RemoteEntry {
            name: name.to_string(),
            path: format!("infolettre/infolettre_19/{name}"),
            kind: kind.to_string(),
        }
    }

    fn location() -> RepoLocation {
        RepoLocation {
            raw_base: "https://raw.githubusercontent.com".into(),
            api_base: "https://api.github.com".into(),
            owner: "InseeFrLab".into(),
            repo: "ssphub".into(),
            branch: "main".into(),
        }
    }

    #[test]
    fn image_extensions_are_case_insensitive() {
        assert!(is_image("cover.png"));
        assert!(is_image("COVER.JPG"));
        assert!(is_image("chart.Svg"));
        assert!(is_image("a.b.webp"));
        assert!(!is_image("index.qmd"));
        assert!(!is_image("png"));
        assert!(!is_image("archive.png.zip"));
    }

    #[test]
    fn only_image_files_are_kept() {
        let entries = vec![
            entry("index.qmd", "file"),
            entry("2025_09_back_school.png", "file"),
            entry("images.png", "dir"),
            entry("heatmap.JPEG", "file"),
        ];
        let names: Vec<_> = image_entries(&entries).iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["2025_09_back_school.png", "heatmap.JPEG"]);
    }

    #[test]
    fn urls_are_fully_qualified() {
        let entries = vec![entry("index.qmd", "file"), entry("cover.png", "file")];
        assert_eq!(
            image_urls(&entries, &location()),
            ["https://raw.githubusercontent.com/InseeFrLab/ssphub/refs/heads/main/infolettre/infolettre_19/cover.png"]
        );
    }

    #[test]
    fn empty_listing_yields_nothing() {
        assert!(image_urls(&[], &location()).is_empty());
    }
}
