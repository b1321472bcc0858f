// document-toolkit/src/merge.rs

//! Page-level PDF concatenation.

use crate::error::{DocumentError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, instrument};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Copies objects from one document into another, giving each a fresh id.
struct ObjectCopier<'a> {
    source: &'a Document,
    target: &'a mut Document,
    id_map: HashMap<ObjectId, ObjectId>,
}

impl<'a> ObjectCopier<'a> {
    fn new(source: &'a Document, target: &'a mut Document) -> Self {
        Self {
            source,
            target,
            id_map: HashMap::new(),
        }
    }

    fn copy_object(&mut self, source_id: ObjectId) -> Result<ObjectId> {
        if let Some(target_id) = self.id_map.get(&source_id) {
            return Ok(*target_id);
        }

        // Reserve the id before recursing so reference cycles terminate.
        let new_id = self.target.add_object(Object::Null);
        self.id_map.insert(source_id, new_id);

        let obj = self.source.get_object(source_id)?.clone();
        let new_obj = self.remap_references(obj)?;
        self.target.objects.insert(new_id, new_obj);

        Ok(new_id)
    }

    fn remap_references(&mut self, obj: Object) -> Result<Object> {
        match obj {
            Object::Reference(id) => Ok(Object::Reference(self.copy_object(id)?)),
            Object::Array(items) => Ok(Object::Array(
                items
                    .into_iter()
                    .map(|o| self.remap_references(o))
                    .collect::<Result<Vec<_>>>()?,
            )),
            Object::Dictionary(mut dict) => {
                for (_, value) in dict.iter_mut() {
                    *value = self.remap_references(value.clone())?;
                }
                Ok(Object::Dictionary(dict))
            }
            Object::Stream(mut stream) => {
                for (_, value) in stream.dict.iter_mut() {
                    *value = self.remap_references(value.clone())?;
                }
                Ok(Object::Stream(stream))
            }
            other => Ok(other),
        }
    }
}

fn load(bytes: &[u8], label: &str) -> Result<Document> {
    let doc = Document::load_mem(bytes).map_err(|e| {
        DocumentError::InvalidFormat(format!("{} is not a readable PDF: {}", label, e))
    })?;
    if doc.is_encrypted() {
        return Err(DocumentError::InvalidFormat(format!("{} is encrypted", label)));
    }
    page_tree(&doc, label)?;
    Ok(doc)
}

fn broken_page_tree(label: &str) -> impl Fn(lopdf::Error) -> DocumentError + '_ {
    move |e| DocumentError::InvalidFormat(format!("{} has a broken page tree: {}", label, e))
}

fn pages_root(doc: &Document, label: &str) -> Result<ObjectId> {
    doc.trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .and_then(|root_id| doc.get_dictionary(root_id))
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(broken_page_tree(label))
}

/// Root `Pages` node plus its `Kids` and `Count`, following indirect values.
fn page_tree(doc: &Document, label: &str) -> Result<(ObjectId, Vec<Object>, i64)> {
    let invalid = broken_page_tree(label);
    let root_pages = pages_root(doc, label)?;
    let pages = doc.get_dictionary(root_pages).map_err(&invalid)?;
    let kids = pages
        .get(b"Kids")
        .and_then(|kids| doc.dereference(kids))
        .and_then(|(_, kids)| kids.as_array())
        .map_err(&invalid)?
        .clone();
    let count = pages
        .get(b"Count")
        .and_then(|count| doc.dereference(count))
        .and_then(|(_, count)| count.as_i64())
        .map_err(&invalid)?;
    Ok((root_pages, kids, count))
}

/// Page dictionary with inherited attributes pulled down and `Parent` dropped,
/// so it can be re-parented without dragging the source page tree along.
fn flattened_page(source: &Document, page_id: ObjectId) -> Result<Dictionary> {
    let mut page = source.get_dictionary(page_id)?.clone();
    let mut visited = HashSet::new();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();

    while let Some(parent_id) = parent {
        if !visited.insert(parent_id) {
            return Err(DocumentError::InvalidFormat(format!(
                "page tree cycle at object {:?}",
                parent_id
            )));
        }
        let node = source.get_dictionary(parent_id)?;
        for key in INHERITABLE {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key.to_vec(), value.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    page.remove(b"Parent");
    Ok(page)
}

/// Appends every page of `source` to the end of `target`'s page tree.
fn append_pages(target: &mut Document, source: &Document) -> Result<usize> {
    let (root_pages, mut kids, count) = page_tree(target, "primary document")?;
    let source_pages: Vec<ObjectId> = source.get_pages().into_values().collect();
    if source_pages.is_empty() {
        return Ok(0);
    }

    let mut copier = ObjectCopier::new(source, target);
    let mut new_kids = Vec::with_capacity(source_pages.len());

    // Pre-map page ids so annotations pointing back at their page land on the copy.
    for page_id in &source_pages {
        let reserved = copier.target.add_object(Object::Null);
        copier.id_map.insert(*page_id, reserved);
        new_kids.push(reserved);
    }

    for (page_id, new_id) in source_pages.iter().zip(&new_kids) {
        let page = flattened_page(source, *page_id)?;
        let mut remapped = match copier.remap_references(Object::Dictionary(page))? {
            Object::Dictionary(dict) => dict,
            _ => unreachable!("dictionaries remap to dictionaries"),
        };
        remapped.set("Parent", root_pages);
        copier.target.objects.insert(*new_id, Object::Dictionary(remapped));
    }
    debug!(copied_objects = copier.id_map.len(), "Copied page objects");

    let pages = target
        .get_object_mut(root_pages)
        .and_then(Object::as_dict_mut)
        .map_err(broken_page_tree("primary document"))?;
    kids.extend(new_kids.iter().map(|id| Object::Reference(*id)));
    pages.set("Kids", Object::Array(kids));
    pages.set("Count", count + new_kids.len() as i64);

    Ok(new_kids.len())
}

/// Concatenates `primary` and every buffer in `extras`, page by page, in order.
///
/// Fails with [`DocumentError::InvalidFormat`] if any input is not a PDF; no
/// output is produced in that case.
#[instrument(skip(primary, extras), fields(extras = extras.len()))]
pub fn merge(primary: &[u8], extras: &[Vec<u8>]) -> Result<Vec<u8>> {
    let mut target = load(primary, "primary document")?;
    let sources = extras
        .iter()
        .enumerate()
        .map(|(i, bytes)| load(bytes, &format!("extra document #{}", i + 1)))
        .collect::<Result<Vec<_>>>()?;

    let mut appended = 0;
    for source in &sources {
        appended += append_pages(&mut target, source)?;
    }

    let mut buffer = Vec::new();
    target.save_to(&mut buffer)?;

    info!(
        appended_pages = appended,
        total_pages = target.get_pages().len(),
        size_kb = buffer.len() / 1024,
        "Merged PDF documents"
    );

    Ok(buffer)
}

/// Number of pages in a PDF buffer.
pub fn page_count(bytes: &[u8]) -> Result<usize> {
    Ok(load(bytes, "document")?.get_pages().len())
}
