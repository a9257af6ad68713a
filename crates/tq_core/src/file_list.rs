use thiserror::Error;

/// Prefix every submitted path must carry. A UI convention, not a security check.
pub const MEDIA_PREFIX: &str = "/media/";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathRejection {
    #[error("enter a file path")]
    Empty,
    #[error("path must start with /media/: {0}")]
    OutsideMedia(String),
    #[error("file already staged: {0}")]
    Duplicate(String),
}

/// Trims the input and checks the media prefix.
pub fn validate_media_path(raw: &str) -> Result<String, PathRejection> {
    let path = raw.trim();
    if path.is_empty() {
        return Err(PathRejection::Empty);
    }
    if !path.starts_with(MEDIA_PREFIX) {
        return Err(PathRejection::OutsideMedia(path.to_string()));
    }
    Ok(path.to_string())
}

/// Paths staged locally before they are submitted as tasks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StagedFiles {
    paths: Vec<String>,
}

impl StagedFiles {
    pub fn stage(&mut self, raw: &str) -> Result<&str, PathRejection> {
        let path = validate_media_path(raw)?;
        if self.paths.contains(&path) {
            return Err(PathRejection::Duplicate(path));
        }
        self.paths.push(path);
        Ok(self.paths.last().map(String::as_str).unwrap_or_default())
    }

    pub fn remove(&mut self, index: usize) -> Option<String> {
        (index < self.paths.len()).then(|| self.paths.remove(index))
    }

    pub fn take_all(&mut self) -> Vec<String> {
        std::mem::take(&mut self.paths)
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_outside_media_are_rejected() {
        assert_eq!(validate_media_path("   "), Err(PathRejection::Empty));
        assert_eq!(
            validate_media_path("/home/user/movie.mkv"),
            Err(PathRejection::OutsideMedia("/home/user/movie.mkv".into()))
        );
        assert_eq!(
            validate_media_path("  /media/films/a.mkv "),
            Ok("/media/films/a.mkv".to_string())
        );
    }

    #[test]
    fn staging_skips_duplicates_and_drains() {
        let mut staged = StagedFiles::default();
        assert_eq!(staged.stage("/media/a.mkv"), Ok("/media/a.mkv"));
        assert_eq!(
            staged.stage(" /media/a.mkv"),
            Err(PathRejection::Duplicate("/media/a.mkv".into()))
        );
        staged.stage("/media/b.mkv").unwrap();

        assert_eq!(staged.remove(5), None);
        assert_eq!(staged.remove(0), Some("/media/a.mkv".into()));
        assert_eq!(staged.take_all(), vec!["/media/b.mkv".to_string()]);
        assert!(staged.is_empty());
    }
}
