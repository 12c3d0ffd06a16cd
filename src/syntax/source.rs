use std::fmt;

/// A position in the file set: 1-based byte offset across all files.
/// Zero means "no position".
pub type Pos = usize;

pub const NO_POS: Pos = 0;

/// A resolved source position.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilePos {
    pub name: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for FilePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            return f.write_str("-");
        }
        if self.name.is_empty() {
            write!(f, "{}:{}", self.line, self.column)
        } else {
            write!(f, "{}:{}:{}", self.name, self.line, self.column)
        }
    }
}

/// One source file registered in a [`SourceFileSet`].
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub name: String,
    /// Offset of the file's first byte within the set; always >= 1.
    pub base: Pos,
    pub size: usize,
    /// Byte offsets of line starts; `lines[0]` is always 0.
    pub lines: Vec<usize>,
}

impl SourceFile {
    /// Translates a byte offset within this file to a set-wide position.
    pub fn pos(&self, offset: usize) -> Pos {
        self.base + offset.min(self.size)
    }

    pub fn contains(&self, pos: Pos) -> bool {
        pos >= self.base && pos <= self.base + self.size
    }

    pub fn position(&self, pos: Pos) -> FilePos {
        let offset = pos.saturating_sub(self.base).min(self.size);
        let line = match self.lines.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        FilePos {
            name: self.name.clone(),
            line: line + 1,
            column: offset - self.lines[line] + 1,
        }
    }
}

/// An ordered collection of source files sharing one position space.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFileSet {
    base: Pos,
    pub files: Vec<SourceFile>,
}

impl Default for SourceFileSet {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceFileSet {
    pub fn new() -> Self {
        Self {
            base: 1,
            files: Vec::new(),
        }
    }

    /// Registers a file and computes its line table. Returns its index.
    pub fn add_file(&mut self, name: &str, src: &[u8]) -> usize {
        let mut lines = vec![0];
        for (i, b) in src.iter().enumerate() {
            if *b == b'\n' {
                lines.push(i + 1);
            }
        }
        self.add_file_raw(name, src.len(), lines)
    }

    /// Registers a file with a precomputed line table (used when decoding
    /// serialised bytecode, where the source text is gone).
    pub fn add_file_raw(&mut self, name: &str, size: usize, lines: Vec<usize>) -> usize {
        let file = SourceFile {
            name: name.to_string(),
            base: self.base,
            size,
            lines,
        };
        self.base += size + 1;
        self.files.push(file);
        self.files.len() - 1
    }

    /// Resolves a set-wide position to file, line and column.
    pub fn position(&self, pos: Pos) -> FilePos {
        if pos == NO_POS {
            return FilePos::default();
        }
        match self.files.iter().rev().find(|f| f.contains(pos)) {
            Some(file) => file.position(pos),
            None => FilePos::default(),
        }
    }
}
