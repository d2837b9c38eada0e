use crate::error::{ExtractError, MenuPdfError, lopdf_err};
use lopdf::{Dictionary, Document as LoDocument, Object as LoObject, ObjectId, Stream as LoStream, dictionary};
use relmenu_document::{
    ATTACHMENT_MIME, ATTACHMENT_NAME, Document, canonical_bytes_sha256, from_canonical_json,
    to_canonical_json,
};

/// A PDF after the attachment step. On failure `bytes` is the unattached PDF
/// and `warning` says why.
#[derive(Debug, Clone)]
pub struct Packaged {
    pub bytes: Vec<u8>,
    pub warning: Option<String>,
    pub sha256: Option<String>,
}

/// Embeds `document` as canonical JSON into a serialized PDF.
pub fn attach_document(pdf: &[u8], document: &Document) -> Packaged {
    let attached = LoDocument::load_mem(pdf).map_err(lopdf_err).and_then(|mut doc| {
        let sha256 = attach_to(&mut doc, document)?;
        let bytes = crate::pdf::save_pdf(&mut doc)?;
        Ok((bytes, sha256))
    });
    match attached {
        Ok((bytes, sha256)) => Packaged {
            bytes,
            warning: None,
            sha256: Some(sha256),
        },
        Err(err) => {
            let warning = format!("{ATTACHMENT_NAME} not attached: {err}");
            log::warn!("{warning}");
            Packaged {
                bytes: pdf.to_vec(),
                warning: Some(warning),
                sha256: None,
            }
        }
    }
}

/// Adds the canonical JSON of `document` to an in-memory PDF and returns its
/// SHA-256.
pub(crate) fn attach_to(doc: &mut LoDocument, document: &Document) -> Result<String, MenuPdfError> {
    let json = to_canonical_json(document)
        .map_err(|err| MenuPdfError::Pdf(format!("serialize document: {err}")))?;
    attach_bytes(doc, json.into_bytes())
}

fn attach_bytes(doc: &mut LoDocument, payload: Vec<u8>) -> Result<String, MenuPdfError> {
    let sha256 = canonical_bytes_sha256(&payload);
    let size = payload.len() as i64;
    let file_id = doc.add_object(LoStream::new(
        dictionary! {
            "Type" => "EmbeddedFile",
            "Subtype" => ATTACHMENT_MIME,
            "Params" => dictionary! { "Size" => size },
        },
        payload,
    ));
    let filespec_id = doc.add_object(dictionary! {
        "Type" => "Filespec",
        "F" => LoObject::string_literal(ATTACHMENT_NAME),
        "UF" => LoObject::string_literal(ATTACHMENT_NAME),
        "Desc" => LoObject::string_literal(format!("Relationship menu source document, sha256 {sha256}")),
        "AFRelationship" => "Source",
        "EF" => dictionary! { "F" => file_id, "UF" => file_id },
    });

    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(LoObject::as_reference)
        .map_err(lopdf_err)?;
    let mut names = {
        let view: &LoDocument = doc;
        view.get_dictionary(catalog_id)
            .ok()
            .and_then(|catalog| catalog.get(b"Names").ok())
            .and_then(|names| resolve_dict(view, names).cloned())
            .unwrap_or_default()
    };
    names.set(
        "EmbeddedFiles",
        dictionary! {
            "Names" => vec![LoObject::string_literal(ATTACHMENT_NAME), filespec_id.into()],
        },
    );
    let catalog = doc
        .get_object_mut(catalog_id)
        .and_then(LoObject::as_dict_mut)
        .map_err(lopdf_err)?;
    catalog.set("Names", names);
    catalog.set("AF", vec![LoObject::Reference(filespec_id)]);
    catalog.set("PageMode", "UseAttachments");
    Ok(sha256)
}

fn resolve<'a>(doc: &'a LoDocument, object: &'a LoObject) -> &'a LoObject {
    match object {
        LoObject::Reference(id) => doc.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

fn resolve_dict<'a>(doc: &'a LoDocument, object: &'a LoObject) -> Option<&'a Dictionary> {
    resolve(doc, object).as_dict().ok()
}

/// Depth-first search of a name tree for `key`.
fn name_tree_lookup<'a>(
    doc: &'a LoDocument,
    node: &'a Dictionary,
    key: &[u8],
    depth: usize,
) -> Option<&'a LoObject> {
    if depth > 32 {
        return None;
    }
    if let Ok(names) = node.get(b"Names").and_then(LoObject::as_array) {
        for pair in names.chunks(2) {
            if let [LoObject::String(name, _), value] = pair {
                if name.as_slice() == key {
                    return Some(value);
                }
            }
        }
    }
    let kids = node.get(b"Kids").and_then(LoObject::as_array).ok()?;
    kids.iter()
        .filter_map(|kid| resolve_dict(doc, kid))
        .find_map(|kid| name_tree_lookup(doc, kid, key, depth + 1))
}

fn filespec_name(filespec: &Dictionary) -> Option<&[u8]> {
    filespec.get(b"UF")
        .or_else(|_| filespec.get(b"F"))
        .and_then(LoObject::as_str)
        .ok()
}

fn find_filespec(doc: &LoDocument) -> Option<&Dictionary> {
    let catalog = doc
        .trailer
        .get(b"Root")
        .ok()
        .and_then(|root| resolve_dict(doc, root))?;
    let from_names = catalog
        .get(b"Names")
        .ok()
        .and_then(|names| resolve_dict(doc, names))
        .and_then(|names| names.get(b"EmbeddedFiles").ok())
        .and_then(|tree| resolve_dict(doc, tree))
        .and_then(|tree| name_tree_lookup(doc, tree, ATTACHMENT_NAME.as_bytes(), 0))
        .and_then(|filespec| resolve_dict(doc, filespec));
    from_names.or_else(|| {
        catalog
            .get(b"AF")
            .and_then(LoObject::as_array)
            .ok()?
            .iter()
            .filter_map(|filespec| resolve_dict(doc, filespec))
            .find(|filespec| filespec_name(filespec) == Some(ATTACHMENT_NAME.as_bytes()))
    })
}

fn embedded_payload(doc: &LoDocument, filespec: &Dictionary) -> Result<Vec<u8>, ExtractError> {
    let ef = filespec
        .get(b"EF")
        .ok()
        .and_then(|ef| resolve_dict(doc, ef))
        .ok_or_else(|| ExtractError::Missing("file specification has no /EF".to_string()))?;
    let stream = ef
        .get(b"UF")
        .or_else(|_| ef.get(b"F"))
        .ok()
        .and_then(|file| resolve(doc, file).as_stream().ok())
        .ok_or_else(|| ExtractError::Missing("embedded file stream not found".to_string()))?;
    if stream.dict.has(b"Filter") {
        stream
            .decompressed_content()
            .map_err(|err| ExtractError::Missing(format!("embedded file stream unreadable: {err}")))
    } else {
        Ok(stream.content.clone())
    }
}

/// Recovers the document embedded by `attach_document`. A buffer that is not a
/// readable PDF reports `Missing`.
pub fn extract_embedded_document(pdf: &[u8]) -> Result<Document, ExtractError> {
    let doc = LoDocument::load_mem(pdf)
        .map_err(|err| ExtractError::Missing(format!("not a readable pdf: {err}")))?;
    let filespec = find_filespec(&doc)
        .ok_or_else(|| ExtractError::Missing(format!("{ATTACHMENT_NAME} is not attached")))?;
    let payload = embedded_payload(&doc, filespec)?;
    Ok(from_canonical_json(&payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use crate::error::ExtractErrorKind;
    use crate::pdf::{PdfMetadata, build_pdf, save_pdf};
    use crate::types::Size;
    use pretty_assertions::assert_eq;
    use relmenu_document::{Item, Note, Rgb, Run, Section, Status};

    fn sample() -> Document {
        Document {
            timestamp: 1_700_000_000_000,
            participants: vec!["Alex".to_string(), "Sam".to_string()],
            language: "en".to_string(),
            sections: vec![Section::new(
                "Communication \u{1F4AC}",
                vec![
                    Item::new("Daily check-ins", Status::Must).with_note(Note::new(vec![
                        Run::plain("Every ").bold(),
                        Run::plain("evening").color(Rgb::new(0x12, 0x34, 0x56)),
                    ])),
                    Item::new("Silence", Status::Unset),
                ],
            )],
        }
    }

    fn blank_pdf() -> LoDocument {
        let rendered = Canvas::new(Size::a4()).finish();
        let meta = PdfMetadata {
            title: "t",
            language: "en",
            created_ms: 0,
        };
        build_pdf(&rendered, &meta).unwrap().document
    }

    fn with_payload(payload: &[u8]) -> Vec<u8> {
        let mut doc = blank_pdf();
        attach_bytes(&mut doc, payload.to_vec()).unwrap();
        save_pdf(&mut doc).unwrap()
    }

    #[test]
    fn attached_document_round_trips() {
        let doc = sample();
        let mut pdf = blank_pdf();
        let sha = attach_to(&mut pdf, &doc).unwrap();
        assert_eq!(sha, relmenu_document::fingerprint_sha256(&doc).unwrap());
        let bytes = save_pdf(&mut pdf).unwrap();
        assert_eq!(extract_embedded_document(&bytes).unwrap(), doc);
    }

    #[test]
    fn attachment_is_declared_as_json_source() {
        let mut pdf = blank_pdf();
        attach_to(&mut pdf, &sample()).unwrap();
        let bytes = save_pdf(&mut pdf).unwrap();
        let loaded = LoDocument::load_mem(&bytes).unwrap();
        let filespec = find_filespec(&loaded).unwrap();
        assert_eq!(filespec.get(b"AFRelationship").unwrap().as_name().unwrap(), b"Source");
        assert!(
            filespec.get(b"Desc")
                .unwrap()
                .as_str()
                .unwrap()
                .ends_with(relmenu_document::fingerprint_sha256(&sample()).unwrap().as_bytes())
        );
        let ef = resolve_dict(&loaded, filespec.get(b"EF").unwrap()).unwrap();
        let stream = resolve(&loaded, ef.get(b"F").unwrap()).as_stream().unwrap();
        assert_eq!(stream.dict.get(b"Subtype").unwrap().as_name().unwrap(), b"application/json");
    }

    #[test]
    fn attach_document_works_on_serialized_pdfs() {
        let mut pdf = blank_pdf();
        let bytes = save_pdf(&mut pdf).unwrap();
        let packaged = attach_document(&bytes, &sample());
        assert!(packaged.warning.is_none());
        assert_eq!(extract_embedded_document(&packaged.bytes).unwrap(), sample());
    }

    #[test]
    fn attach_failure_returns_original_bytes_with_warning() {
        let garbage = b"definitely not a pdf".to_vec();
        let packaged = attach_document(&garbage, &sample());
        assert_eq!(packaged.bytes, garbage);
        assert!(packaged.warning.unwrap().contains(ATTACHMENT_NAME));
        assert!(packaged.sha256.is_none());
    }

    #[test]
    fn extraction_reports_each_error_kind() {
        let mut plain = blank_pdf();
        let no_attachment = save_pdf(&mut plain).unwrap();
        let kind = |bytes: &[u8]| extract_embedded_document(bytes).unwrap_err().kind();

        assert_eq!(kind(&no_attachment), ExtractErrorKind::Missing);
        assert_eq!(kind(b"%PDF-1.7 truncated"), ExtractErrorKind::Missing);
        assert_eq!(kind(&with_payload(b"{not json")), ExtractErrorKind::MalformedJson);
        assert_eq!(
            kind(&with_payload(br#"{"timestamp": 1, "sections": []}"#)),
            ExtractErrorKind::MalformedJson
        );
        assert_eq!(
            kind(&with_payload(br#"{"schemaVersion": 99, "timestamp": 1}"#)),
            ExtractErrorKind::SchemaTooNew
        );
        assert_eq!(ExtractErrorKind::SchemaTooNew.as_str(), "schema-too-new");
    }

    #[test]
    fn name_tree_kids_are_searched() {
        let mut doc = blank_pdf();
        let json = to_canonical_json(&sample()).unwrap();
        attach_bytes(&mut doc, json.into_bytes()).unwrap();
        // Move the leaf under an intermediate /Kids node and drop /AF.
        let catalog_id = doc.trailer.get(b"Root").unwrap().as_reference().unwrap();
        let catalog = doc.get_dictionary(catalog_id).unwrap().clone();
        let leaf = catalog
            .get(b"Names")
            .unwrap()
            .as_dict()
            .unwrap()
            .get(b"EmbeddedFiles")
            .unwrap()
            .as_dict()
            .unwrap()
            .clone();
        let leaf_id: ObjectId = doc.add_object(leaf);
        let catalog = doc.get_object_mut(catalog_id).unwrap().as_dict_mut().unwrap();
        catalog.set(
            "Names",
            dictionary! { "EmbeddedFiles" => dictionary! { "Kids" => vec![leaf_id.into()] } },
        );
        catalog.remove(b"AF");
        let bytes = save_pdf(&mut doc).unwrap();
        assert_eq!(extract_embedded_document(&bytes).unwrap(), sample());
    }
}
