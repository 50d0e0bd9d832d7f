//! Extraction of `markdown-script` code blocks from a Markdown document.
//!
//! Every line outside a script block is replaced by an empty line, so the
//! extracted source has the same line numbering as the document and error
//! positions point at document lines.

use std::path::Path;

/// Info string that marks a fenced block as script.
pub const SCRIPT_INFO: &str = "markdown-script";

/// One fenced script block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptBlock {
    /// 1-based document line of the first content line.
    pub start_line: usize,
    pub line_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub source: String,
    pub blocks: Vec<ScriptBlock>,
}

impl Extracted {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

struct Fence {
    ch: char,
    len: usize,
}

/// Parse a fence line: up to three spaces of indent, then three or more
/// backticks or tildes.  Returns the fence and the info string.
fn fence(line: &str) -> Option<(Fence, &str)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let rest = &line[indent..];
    let ch = rest.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = rest.chars().take_while(|c| *c == ch).count();
    if len < 3 {
        return None;
    }
    let info = rest[len..].trim();
    // Backtick fences may not carry backticks in their info string.
    if ch == '`' && info.contains('`') {
        return None;
    }
    Some((Fence { ch, len }, info))
}

fn closes(line: &str, open: &Fence) -> bool {
    match fence(line) {
        Some((f, info)) => f.ch == open.ch && f.len >= open.len && info.is_empty(),
        None => false,
    }
}

/// Pull the script blocks out of `doc`.  An unterminated block runs to the
/// end of the document.
pub fn extract_scripts(doc: &str) -> Extracted {
    let mut out = Extracted::default();
    let mut lines = Vec::new();
    // Open fence and whether it is a script block.
    let mut open: Option<(Fence, bool)> = None;

    for (i, line) in doc.lines().enumerate() {
        let line_no = i + 1;
        match open.take() {
            None => {
                if let Some((f, info)) = fence(line) {
                    let is_script = info.split_whitespace().next() == Some(SCRIPT_INFO);
                    if is_script {
                        out.blocks.push(ScriptBlock {
                            start_line: line_no + 1,
                            line_count: 0,
                        });
                    }
                    open = Some((f, is_script));
                }
                lines.push("");
            }
            Some((f, is_script)) => {
                if closes(line, &f) {
                    lines.push("");
                } else {
                    if is_script {
                        lines.push(line);
                        if let Some(block) = out.blocks.last_mut() {
                            block.line_count += 1;
                        }
                    } else {
                        lines.push("");
                    }
                    open = Some((f, is_script));
                }
            }
        }
    }

    out.source = lines.join("\n");
    out
}

/// True for `.md` and `.markdown` files.
pub fn is_markdown_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown"))
}
