//! Test fixtures: in-memory PDFs and shell scripts standing in for pandoc.

use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document, Object, Stream, dictionary};

/// Write a PDF with `pages` pages whose media box is `width` x 842 pt.
///
/// The media box and resources sit on the page-tree root, so merged pages
/// only keep them if inherited attributes are resolved.
pub(crate) fn sample_pdf(path: &Path, pages: usize, width: i64) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids: Vec<Object> = Vec::with_capacity(pages);
    for i in 0..pages {
        let content = format!("% page {}\n", i + 1).into_bytes();
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(width),
                Object::Integer(842),
            ],
            "Resources" => Dictionary::new(),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).expect("save sample pdf");
}

/// Page dictionaries of a PDF on disk, in page order.
pub(crate) fn read_pages(path: &Path) -> Vec<Dictionary> {
    let doc = Document::load(path).expect("load merged pdf");
    doc.get_pages()
        .values()
        .map(|id| doc.get_dictionary(*id).expect("page dictionary").clone())
        .collect()
}

/// Content stream of every page, trimmed. Padding pages yield an empty string.
pub(crate) fn page_markers(path: &Path) -> Vec<String> {
    let doc = Document::load(path).expect("load merged pdf");
    doc.get_pages()
        .values()
        .map(|id| {
            let content = doc.get_page_content(*id).expect("page content");
            String::from_utf8_lossy(&content).trim().to_string()
        })
        .collect()
}

/// Whether a page was inserted as padding.
pub(crate) fn is_blank(page: &Dictionary) -> bool {
    !page.has(b"Contents")
}

/// Width of a page's media box.
pub(crate) fn media_width(page: &Dictionary) -> i64 {
    page.get(b"MediaBox")
        .and_then(Object::as_array)
        .map(|mb| mb[2].as_i64().expect("integer media box"))
        .expect("media box")
}

/// A `sh` script that mimics the conversion tool's command line.
///
/// Run it as `sh <script> -o <out> ...` by putting the script path in the
/// renderer's extra arguments.
pub(crate) struct FakeTool {
    pub script: PathBuf,
}

impl FakeTool {
    /// Copy `fixture` to the `-o` target and record the working directory in `<out>.cwd`.
    pub fn copying(dir: &Path, fixture: &Path) -> Self {
        Self::routing(dir, &[], fixture)
    }

    /// Like [`FakeTool::copying`], but outputs whose file name matches a
    /// route get that route's fixture instead.
    pub fn routing(dir: &Path, routes: &[(&str, &Path)], fallback: &Path) -> Self {
        let mut cases = String::new();
        for (name, fixture) in routes {
            cases.push_str(&format!("  {name}) cp '{}' \"$out\" ;;\n", fixture.display()));
        }
        cases.push_str(&format!("  *) cp '{}' \"$out\" ;;\n", fallback.display()));

        let body = format!(
            r#"out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; shift; fi
  shift
done
pwd > "$out.cwd"
case "$(basename "$out")" in
{cases}esac
"#
        );
        Self::write(dir, "copy.sh", &body)
    }

    /// Print an error and exit with `code`.
    pub fn failing(dir: &Path, code: i32) -> Self {
        let body = format!("echo 'pandoc: template not found' >&2\nexit {code}\n");
        Self::write(dir, "fail.sh", &body)
    }

    /// Sleep for `secs` seconds.
    pub fn sleeping(dir: &Path, secs: u64) -> Self {
        Self::write(dir, "sleep.sh", &format!("exec sleep {secs}\n"))
    }

    fn write(dir: &Path, name: &str, body: &str) -> Self {
        let script = dir.join(name);
        std::fs::write(&script, body).expect("write fake tool");
        Self { script }
    }
}
