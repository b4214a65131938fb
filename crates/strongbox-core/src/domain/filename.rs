//! File name rules and helpers

use super::errors::FileError;

/// Longest accepted file name, in bytes
pub const MAX_FILENAME_LENGTH: usize = 230;

/// Checks a single path component
///
/// # Errors
/// - [`FileError::FileNameEmpty`] for an empty name
/// - [`FileError::FileNameContainsSlash`] if the name contains `/`
/// - [`FileError::FileNameTooLong`] past [`MAX_FILENAME_LENGTH`] bytes
pub fn validate_name(name: &str) -> Result<(), FileError> {
    if name.is_empty() {
        return Err(FileError::FileNameEmpty);
    }
    if name.contains('/') {
        return Err(FileError::FileNameContainsSlash);
    }
    if name.len() > MAX_FILENAME_LENGTH {
        return Err(FileError::FileNameTooLong);
    }
    Ok(())
}

/// Broad content category, decided by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentType {
    Text,
    Drawing,
    Other,
}

impl DocumentType {
    pub fn from_name(name: &str) -> Self {
        let ext = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
            _ => return DocumentType::Other,
        };
        match ext.as_str() {
            "md" | "txt" => DocumentType::Text,
            "draw" | "svg" => DocumentType::Drawing,
            _ => DocumentType::Other,
        }
    }
}

/// A name split into `stem`, optional `-N` variant, and extension
///
/// `notes-2.md` parses to stem `notes`, variant `2`, extension `md`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameComponents {
    pub stem: String,
    pub variant: Option<usize>,
    pub extension: Option<String>,
}

impl NameComponents {
    pub fn from(name: &str) -> Self {
        let (base, extension) = match name.rsplit_once('.') {
            Some((base, ext)) if !base.is_empty() && !ext.is_empty() => {
                (base, Some(ext.to_string()))
            }
            _ => (name, None),
        };

        let (stem, variant) = match base.rsplit_once('-') {
            Some((stem, n)) if !stem.is_empty() && !n.is_empty() => match n.parse::<usize>() {
                Ok(n) => (stem, Some(n)),
                Err(_) => (base, None),
            },
            _ => (base, None),
        };

        Self {
            stem: stem.to_string(),
            variant,
            extension,
        }
    }

    /// The same name with the next variant number
    pub fn generate_next(&self) -> Self {
        Self {
            stem: self.stem.clone(),
            variant: Some(self.variant.map_or(1, |n| n + 1)),
            extension: self.extension.clone(),
        }
    }

    /// Next variant not rejected by `taken`
    pub fn next_in(&self, mut taken: impl FnMut(&str) -> bool) -> String {
        let mut candidate = self.generate_next();
        while taken(&candidate.to_name()) {
            candidate = candidate.generate_next();
        }
        candidate.to_name()
    }

    pub fn to_name(&self) -> String {
        let mut name = self.stem.clone();
        if let Some(n) = self.variant {
            name.push_str(&format!("-{n}"));
        }
        if let Some(ext) = &self.extension {
            name.push('.');
            name.push_str(ext);
        }
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("todo.md").is_ok());
        assert_eq!(validate_name(""), Err(FileError::FileNameEmpty));
        assert_eq!(validate_name("a/b"), Err(FileError::FileNameContainsSlash));
        assert_eq!(
            validate_name(&"x".repeat(MAX_FILENAME_LENGTH + 1)),
            Err(FileError::FileNameTooLong)
        );
        assert!(validate_name(&"x".repeat(MAX_FILENAME_LENGTH)).is_ok());
    }

    #[test]
    fn test_document_type() {
        assert_eq!(DocumentType::from_name("notes.md"), DocumentType::Text);
        assert_eq!(DocumentType::from_name("NOTES.TXT"), DocumentType::Text);
        assert_eq!(DocumentType::from_name("sketch.draw"), DocumentType::Drawing);
        assert_eq!(DocumentType::from_name("photo.png"), DocumentType::Other);
        assert_eq!(DocumentType::from_name(".md"), DocumentType::Other);
        assert_eq!(DocumentType::from_name("Makefile"), DocumentType::Other);
    }

    #[test]
    fn test_components_parse() {
        let c = NameComponents::from("notes-2.md");
        assert_eq!(c.stem, "notes");
        assert_eq!(c.variant, Some(2));
        assert_eq!(c.extension.as_deref(), Some("md"));

        let c = NameComponents::from("my-notes");
        assert_eq!(c.stem, "my-notes");
        assert_eq!(c.variant, None);
        assert_eq!(c.extension, None);
    }

    #[test]
    fn test_generate_next() {
        assert_eq!(NameComponents::from("a.md").generate_next().to_name(), "a-1.md");
        assert_eq!(NameComponents::from("a-1.md").generate_next().to_name(), "a-2.md");
        assert_eq!(NameComponents::from("folder").generate_next().to_name(), "folder-1");
    }

    #[test]
    fn test_next_in_skips_taken() {
        let taken = ["a-1.md", "a-2.md"];
        let next = NameComponents::from("a.md").next_in(|n| taken.contains(&n));
        assert_eq!(next, "a-3.md");
    }

    #[test]
    fn test_roundtrip_plain_name() {
        for name in ["a.md", "a-1.md", "dotfile", "x-y-3.tar"] {
            assert_eq!(NameComponents::from(name).to_name(), name);
        }
    }
}
