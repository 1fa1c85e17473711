//! Document merger.
//!
//! Concatenates rendered PDFs into one book and pads each document with
//! blank pages so the next one starts on a page aligned to
//! [`MergeOptions::alignment`]. With the default alignment of 2 every
//! contribution after the first begins on an odd page.

use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};
use tracing::{debug, info, instrument};

use procbook_shared::{AssemblyConfig, MergeOutcome, ProcbookError, Result, SectionPlacement};

/// Default page alignment.
pub const DEFAULT_ALIGNMENT: u32 = 2;

/// A4 portrait, used for padding when no page size is known.
const A4_WIDTH_PT: i64 = 595;
const A4_HEIGHT_PT: i64 = 842;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guards the parent walk against cyclic page trees.
const MAX_TREE_DEPTH: usize = 64;

/// How the merger treats the output file and page alignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    /// Replace an existing output file.
    pub overwrite: bool,
    /// Page-count divisor each document is padded to. 1 disables padding.
    pub alignment: u32,
    /// Pad after the last document as well.
    pub pad_trailing: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            overwrite: true,
            alignment: DEFAULT_ALIGNMENT,
            pad_trailing: true,
        }
    }
}

impl From<&AssemblyConfig> for MergeOptions {
    fn from(config: &AssemblyConfig) -> Self {
        Self {
            overwrite: config.overwrite,
            alignment: config.alignment,
            pad_trailing: config.pad_trailing,
        }
    }
}

/// Merge `inputs` into `output`, in order.
///
/// Returns an outcome with `written == false` and leaves the file untouched
/// when `overwrite` is off and `output` already exists. Every input must
/// exist; an empty path counts as missing. Nothing is written unless all
/// inputs load.
#[instrument(skip_all, fields(output = %output.display(), inputs = inputs.len()))]
pub fn merge_documents<P: AsRef<Path>>(
    output: &Path,
    inputs: &[P],
    options: &MergeOptions,
) -> Result<MergeOutcome> {
    if options.alignment == 0 {
        return Err(ProcbookError::validation("page alignment must be at least 1"));
    }

    if !options.overwrite && output.exists() {
        info!("output exists and overwrite is off, leaving it untouched");
        return Ok(MergeOutcome::skipped());
    }

    if inputs.is_empty() {
        return Err(ProcbookError::validation("no documents to merge"));
    }

    let mut book = BookBuilder::new();
    let mut sections = Vec::with_capacity(inputs.len());

    for (index, input) in inputs.iter().enumerate() {
        let path = input.as_ref();
        if !path.exists() {
            return Err(ProcbookError::MissingInput {
                path: path.to_path_buf(),
            });
        }

        let document = Document::load(path).map_err(|e| ProcbookError::pdf(path, e))?;
        let first_page = book.page_count() + 1;
        let page_count = book.append(path, document)?;

        let is_last = index + 1 == inputs.len();
        let padding = if is_last && !options.pad_trailing {
            0
        } else {
            book.pad_to(options.alignment)
        };

        debug!(
            input = %path.display(),
            first_page,
            page_count,
            padding,
            "appended document"
        );

        sections.push(SectionPlacement {
            source: path.to_path_buf(),
            first_page,
            page_count,
            padding,
        });
    }

    let total_pages = book.page_count();
    let bytes = book.finish(output)?;
    write_atomically(output, &bytes)?;

    info!(total_pages, documents = sections.len(), "merged documents");

    Ok(MergeOutcome {
        written: true,
        sections,
        total_pages,
    })
}

// ---------------------------------------------------------------------------
// Book builder
// ---------------------------------------------------------------------------

/// Accumulates pages from several documents under a single page tree.
struct BookBuilder {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
    last_media_box: Option<Object>,
}

impl BookBuilder {
    fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
            last_media_box: None,
        }
    }

    fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Move every page of `source` into the book. Returns the number of pages added.
    fn append(&mut self, path: &Path, mut source: Document) -> Result<usize> {
        source.renumber_objects_with(self.doc.max_id + 1);

        let mut pages = Vec::new();
        for page_id in source.get_pages().into_values() {
            let mut page = source
                .get_dictionary(page_id)
                .map_err(|e| ProcbookError::pdf(path, e))?
                .clone();
            for key in INHERITABLE {
                if !page.has(key) {
                    if let Some(value) = inherited_attribute(&source, &page, key) {
                        page.set(key, value);
                    }
                }
            }
            page.set("Parent", self.pages_id);
            pages.push((page_id, page));
        }

        for (id, object) in std::mem::take(&mut source.objects) {
            if is_structural(&object) {
                continue;
            }
            self.doc.max_id = self.doc.max_id.max(id.0);
            self.doc.objects.insert(id, object);
        }

        let added = pages.len();
        for (page_id, page) in pages {
            if let Ok(media_box) = page.get(b"MediaBox") {
                self.last_media_box = Some(media_box.clone());
            }
            self.doc.objects.insert(page_id, Object::Dictionary(page));
            self.kids.push(Object::Reference(page_id));
        }

        Ok(added)
    }

    /// Append blank pages until the page count is a multiple of `alignment`.
    /// Returns the number of pages added.
    fn pad_to(&mut self, alignment: u32) -> usize {
        let alignment = alignment as usize;
        let mut added = 0;
        while self.kids.len() % alignment != 0 {
            self.push_blank();
            added += 1;
        }
        added
    }

    /// Blank pages take the size of the page before them.
    fn push_blank(&mut self) {
        let media_box = self.last_media_box.clone().unwrap_or_else(|| {
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(A4_WIDTH_PT),
                Object::Integer(A4_HEIGHT_PT),
            ])
        });
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => media_box,
            "Resources" => Dictionary::new(),
        });
        self.kids.push(Object::Reference(page_id));
    }

    /// Close the page tree and serialize the book.
    fn finish(mut self, output: &Path) -> Result<Vec<u8>> {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        // Source catalogs and info dictionaries are gone; drop what they referenced.
        self.doc.prune_objects();

        let mut bytes = Vec::new();
        self.doc
            .save_to(&mut bytes)
            .map_err(|e| ProcbookError::pdf(output, e))?;
        Ok(bytes)
    }
}

/// Look `key` up on the ancestors of `page`.
fn inherited_attribute(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;
    while let Some(id) = parent {
        let node = doc.get_dictionary(id).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        depth += 1;
        if depth > MAX_TREE_DEPTH {
            return None;
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

/// Document-level objects that must not be carried into the book.
fn is_structural(object: &Object) -> bool {
    let Object::Dictionary(dict) = object else {
        return false;
    };
    matches!(
        dict.get(b"Type"),
        Ok(Object::Name(name)) if matches!(name.as_slice(), b"Catalog" | b"Pages" | b"Outlines" | b"Outline")
    )
}

/// Write to a temporary sibling, then rename into place.
fn write_atomically(output: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ProcbookError::io(parent, e))?;
    }

    let file_name = output
        .file_name()
        .ok_or_else(|| ProcbookError::validation(format!("invalid output path {}", output.display())))?;
    let temp = output.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

    if let Err(e) = std::fs::write(&temp, bytes).and_then(|()| std::fs::rename(&temp, output)) {
        let _ = std::fs::remove_file(&temp);
        return Err(ProcbookError::io(output, e));
    }

    debug!(path = %output.display(), size = bytes.len(), "wrote merged document");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
