/// Section document model.
///
/// A note is an ordered list of segments: literal text, or a named region
/// bracketed by marker lines:
///   <!-- SECTION:schedule:START -->
///   ...machine-maintained content...
///   <!-- SECTION:schedule:END -->
///
/// Parsing keeps every byte (including the original marker lines), so
/// `render(parse(text)) == text`. Regions written through `set_region` get
/// canonical marker lines.
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*<!--\s*SECTION:\s*([^:\r\n]+?)\s*:\s*(START|END)\s*-->\s*$").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkerKind {
    Start,
    End,
}

fn parse_marker(line: &str) -> Option<(String, MarkerKind)> {
    let caps = MARKER_RE.captures(line)?;
    let kind = if &caps[2] == "START" {
        MarkerKind::Start
    } else {
        MarkerKind::End
    };
    Some((caps[1].to_string(), kind))
}

/// Canonical start marker line (without line ending).
pub fn start_marker(name: &str) -> String {
    format!("<!-- SECTION:{}:START -->", name)
}

/// Canonical end marker line (without line ending).
pub fn end_marker(name: &str) -> String {
    format!("<!-- SECTION:{}:END -->", name)
}

/// An empty canonical marker pair, used to position regions in templates.
pub fn empty_region(name: &str) -> String {
    format!("{}\n{}", start_marker(name), end_marker(name))
}

/// Region names are embedded in marker lines: non-empty, trimmed, single-line, no `:`.
pub fn is_valid_region_name(name: &str) -> bool {
    !name.is_empty()
        && name.trim() == name
        && !name.contains(':')
        && !name.contains('\n')
        && !name.contains('\r')
        && !name.contains("-->")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub name: String,
    /// Start marker line as it appeared, line ending included.
    start_line: String,
    /// Text strictly between the marker lines, verbatim.
    content: String,
    /// End marker line as it appeared; `None` when the region was never closed.
    end_line: Option<String>,
}

impl Region {
    fn canonical(name: &str, content: &str, trailing_newline: bool) -> Self {
        let mut end_line = end_marker(name);
        if trailing_newline {
            end_line.push('\n');
        }
        Self {
            name: name.to_string(),
            start_line: format!("{}\n", start_marker(name)),
            content: normalize_content(content),
            end_line: Some(end_line),
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.end_line.is_some()
    }

    /// Region content; an unterminated region has no usable content.
    pub fn content(&self) -> &str {
        if self.is_terminated() {
            &self.content
        } else {
            ""
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Region(Region),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    segments: Vec<Segment>,
}

/// Content written into a region always ends with a newline so the end
/// marker stays on its own line.
fn normalize_content(content: &str) -> String {
    let mut out = content.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Parse note text into segments. A start marker opens a region only when a
/// matching end marker follows; everything between them is content. A start
/// marker with no matching end is an unterminated region with no content and
/// scanning resumes on the next line. Markers for a name already seen and end
/// markers without a start are literal text.
pub fn parse(text: &str) -> Document {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let markers: Vec<Option<(String, MarkerKind)>> = lines
        .iter()
        .map(|line| parse_marker(line.trim_end_matches(['\n', '\r'])))
        .collect();

    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut index = 0;

    while index < lines.len() {
        let line = lines[index];
        let name = match &markers[index] {
            Some((name, MarkerKind::Start)) if !seen.contains(name) => name.clone(),
            _ => {
                literal.push_str(line);
                index += 1;
                continue;
            }
        };

        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        seen.insert(name.clone());

        let end = (index + 1..lines.len()).find(|&i| {
            matches!(&markers[i], Some((n, MarkerKind::End)) if *n == name)
        });
        match end {
            Some(end) => {
                segments.push(Segment::Region(Region {
                    name,
                    start_line: line.to_string(),
                    content: lines[index + 1..end].concat(),
                    end_line: Some(lines[end].to_string()),
                }));
                index = end + 1;
            }
            None => {
                log::debug!("[vaultkeep.sections] Region '{}' is not terminated", name);
                segments.push(Segment::Region(Region {
                    name,
                    start_line: line.to_string(),
                    content: String::new(),
                    end_line: None,
                }));
                index += 1;
            }
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    Document { segments }
}

/// Concatenate segments in order.
pub fn render(doc: &Document) -> String {
    let mut out = String::new();
    for segment in &doc.segments {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Region(region) => {
                out.push_str(&region.start_line);
                out.push_str(&region.content);
                if let Some(end) = &region.end_line {
                    out.push_str(end);
                }
            }
        }
    }
    out
}

impl Document {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Region(r) => Some(r),
            Segment::Literal(_) => None,
        })
    }

    pub fn region(&self, name: &str) -> Option<&Region> {
        self.regions().find(|r| r.name == name)
    }

    pub fn has_region(&self, name: &str) -> bool {
        self.region(name).is_some()
    }

    /// Content of a region; unterminated regions read as empty.
    pub fn get_region(&self, name: &str) -> Option<&str> {
        self.region(name).map(Region::content)
    }

    /// Replace a region's content, or append a new region at the end.
    /// Writing an unterminated region closes it in place; the text after its
    /// dangling start marker is left alone.
    pub fn set_region(&mut self, name: &str, content: &str) {
        let position = self.segments.iter().position(|s| match s {
            Segment::Region(r) => r.name == name,
            Segment::Literal(_) => false,
        });

        let Some(index) = position else {
            self.append_region(name, content);
            return;
        };

        let Segment::Region(existing) = &mut self.segments[index] else {
            return;
        };
        // An unterminated region keeps no content; writing it adds the end marker.
        let trailing_newline = existing
            .end_line
            .as_ref()
            .map(|end| end.ends_with('\n'))
            .unwrap_or(true);
        *existing = Region::canonical(name, content, trailing_newline);
    }

    fn append_region(&mut self, name: &str, content: &str) {
        let rendered = render(self);
        if !rendered.is_empty() {
            let mut separator = String::new();
            if !rendered.ends_with('\n') {
                separator.push('\n');
            }
            if !rendered.ends_with("\n\n") {
                separator.push('\n');
            }
            if !separator.is_empty() {
                self.segments.push(Segment::Literal(separator));
            }
        }
        self.segments
            .push(Segment::Region(Region::canonical(name, content, true)));
    }
}
