use crate::parser::ast::SourceId;
use std::ops::Range;

/// A collection of source files for error reporting.
/// Maps a SourceId to its filename and content for multi-file diagnostics.
#[derive(Debug)]
pub struct FileSources {
    files: Vec<(String, String)>,
}

impl FileSources {
    pub fn new() -> Self {
        // Index 0 is the synthetic source so SourceId::SYNTHETIC always resolves.
        FileSources {
            files: vec![("<synthetic>".to_string(), String::new())],
        }
    }

    /// Register a file and return its SourceId.
    pub fn add(&mut self, name: impl Into<String>, source: impl Into<String>) -> SourceId {
        let id = SourceId(self.files.len());
        self.files.push((name.into(), source.into()));
        id
    }

    /// Create a FileSources holding a single file.
    pub fn single(name: impl Into<String>, source: impl Into<String>) -> (Self, SourceId) {
        let mut files = Self::new();
        let id = files.add(name, source);
        (files, id)
    }

    pub fn name_of(&self, id: SourceId) -> Option<&str> {
        self.files.get(id.0).map(|(name, _)| name.as_str())
    }
}

impl Default for FileSources {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> codespan_reporting::files::Files<'a> for FileSources {
    type FileId = SourceId;
    type Name = &'a str;
    type Source = &'a str;

    fn name(&'a self, id: Self::FileId) -> Result<Self::Name, codespan_reporting::files::Error> {
        self.files
            .get(id.0)
            .map(|(name, _)| name.as_str())
            .ok_or(codespan_reporting::files::Error::FileMissing)
    }

    fn source(
        &'a self,
        id: Self::FileId,
    ) -> Result<Self::Source, codespan_reporting::files::Error> {
        self.files
            .get(id.0)
            .map(|(_, source)| source.as_str())
            .ok_or(codespan_reporting::files::Error::FileMissing)
    }

    fn line_index(
        &'a self,
        id: Self::FileId,
        byte_index: usize,
    ) -> Result<usize, codespan_reporting::files::Error> {
        let source = self.source(id)?;
        let clamped = byte_index.min(source.len());
        Ok(source.as_bytes()[..clamped]
            .iter()
            .filter(|&&b| b == b'\n')
            .count())
    }

    fn line_range(
        &'a self,
        id: Self::FileId,
        line_index: usize,
    ) -> Result<Range<usize>, codespan_reporting::files::Error> {
        let source = self.source(id)?;
        let mut start = 0;
        for (current, line) in source.split_inclusive('\n').enumerate() {
            if current == line_index {
                return Ok(start..start + line.trim_end_matches('\n').len());
            }
            start += line.len();
        }
        if line_index == 0 {
            return Ok(0..source.len());
        }
        Err(codespan_reporting::files::Error::LineTooLarge {
            given: line_index,
            max: source.split_inclusive('\n').count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codespan_reporting::files::Files;

    #[test]
    fn test_line_index() {
        let (files, id) = FileSources::single("a.sld", "one\ntwo\nthree");
        assert_eq!(files.line_index(id, 0).unwrap(), 0);
        assert_eq!(files.line_index(id, 4).unwrap(), 1);
        assert_eq!(files.line_index(id, 9).unwrap(), 2);
    }

    #[test]
    fn test_line_range() {
        let (files, id) = FileSources::single("a.sld", "one\ntwo\nthree");
        assert_eq!(files.line_range(id, 0).unwrap(), 0..3);
        assert_eq!(files.line_range(id, 1).unwrap(), 4..7);
        assert_eq!(files.line_range(id, 2).unwrap(), 8..13);
    }

    #[test]
    fn test_ids_are_sequential() {
        let mut files = FileSources::new();
        let a = files.add("a.sld", "");
        let b = files.add("b.sld", "");
        assert_ne!(a, b);
        assert_eq!(files.name_of(b), Some("b.sld"));
    }
}
