//! Memory-mapped line cursor shared by the index, registry and scan readers

use crate::types::Result;
use memmap2::Mmap;
use std::borrow::Cow;
use std::fs::File;
use std::path::Path;

/// Read-only view of a whole file.
///
/// The file handle is closed as soon as the mapping exists; the mapping
/// itself lives only as long as this value.
pub struct MappedFile {
    map: Option<Mmap>,
}

impl MappedFile {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // Zero-length files cannot be mapped on every platform
        if file.metadata()?.len() == 0 {
            return Ok(Self { map: None });
        }
        let map = unsafe { Mmap::map(&file)? };
        Ok(Self { map: Some(map) })
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes().len()
    }
}

/// One line of the file, without its terminator
#[derive(Debug, Clone, Copy)]
pub struct Line<'a> {
    /// Absolute byte offset of the first byte of the line
    pub offset: u64,
    /// 1-based line number within the file
    pub number: usize,
    /// Line content without `\n` / `\r\n`
    pub bytes: &'a [u8],
    /// Line content including its terminator, if any
    pub raw: &'a [u8],
}

impl<'a> Line<'a> {
    #[inline]
    pub fn starts_with(&self, tag: &[u8]) -> bool {
        self.bytes.starts_with(tag)
    }

    #[inline]
    pub fn is_control(&self) -> bool {
        self.bytes.first() == Some(&crate::types::CONTROL_CHAR)
    }

    pub fn text(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.bytes)
    }

    pub fn raw_text(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.raw)
    }

    /// Text after the first `skip` bytes (the tag)
    pub fn after(&self, skip: usize) -> Cow<'a, str> {
        String::from_utf8_lossy(self.bytes.get(skip..).unwrap_or(&[]))
    }
}

/// Cursor yielding lines with their absolute offsets
pub struct LineCursor<'a> {
    data: &'a [u8],
    pos: usize,
    line_no: usize,
}

impl<'a> LineCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            line_no: 0,
        }
    }

    /// Start at an absolute byte offset, counting the lines before it so
    /// reported line numbers stay file-absolute.
    pub fn at(data: &'a [u8], offset: usize) -> Self {
        let pos = offset.min(data.len());
        let line_no = data[..pos].iter().filter(|&&b| b == b'\n').count();
        Self { data, pos, line_no }
    }

    /// Read the next line, or `None` at end of data
    pub fn next_line(&mut self) -> Option<Line<'a>> {
        if self.pos >= self.data.len() {
            return None;
        }

        let start = self.pos;
        let rest = &self.data[start..];
        let (raw, mut content) = match rest.iter().position(|&b| b == b'\n') {
            Some(nl) => (&rest[..=nl], &rest[..nl]),
            None => (rest, rest),
        };
        if let Some(stripped) = content.strip_suffix(b"\r") {
            content = stripped;
        }

        self.pos += raw.len();
        self.line_no += 1;

        Some(Line {
            offset: start as u64,
            number: self.line_no,
            bytes: content,
            raw,
        })
    }
}

impl<'a> Iterator for LineCursor<'a> {
    type Item = Line<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line()
    }
}
