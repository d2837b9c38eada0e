use crate::canvas::{Command, Page, RasterImage, RenderedDocument};
use crate::error::MenuPdfError;
use crate::font::{FontFace, winansi_byte};
use crate::types::{Color, Pt, Rect};
use chrono::{DateTime, Utc};
use lopdf::{Dictionary, Document as LoDocument, Object as LoObject, ObjectId, Stream as LoStream, dictionary};

pub const PRODUCER: &str = concat!("relmenu ", env!("CARGO_PKG_VERSION"));

/// Document-level entries written alongside the pages.
#[derive(Debug, Clone, Copy)]
pub struct PdfMetadata<'a> {
    pub title: &'a str,
    pub language: &'a str,
    /// Milliseconds since the Unix epoch; becomes the Info creation date.
    pub created_ms: i64,
}

/// An assembled but not yet serialized PDF.
pub struct PdfOutput {
    pub document: LoDocument,
    pub content_bytes: Vec<usize>,
}

struct PageStream {
    content: String,
    links: Vec<(Rect, String)>,
}

#[derive(Debug, Clone, Copy)]
struct TextState {
    face: FontFace,
    size: Pt,
}

/// Builds the lopdf object graph for recorded pages: Helvetica base-14 fonts,
/// one image XObject (with soft mask) per registered bitmap, link annotations
/// and the Info dictionary.
pub fn build_pdf(rendered: &RenderedDocument, meta: &PdfMetadata<'_>) -> Result<PdfOutput, MenuPdfError> {
    let mut doc = LoDocument::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut fonts = Dictionary::new();
    for face in FontFace::ALL {
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => face.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        fonts.set(face.resource_name(), font_id);
    }
    let mut xobjects = Dictionary::new();
    for (resource_id, image) in &rendered.images {
        let image_id = add_image(&mut doc, image)?;
        xobjects.set(resource_id.as_bytes().to_vec(), image_id);
    }
    let resources_id = doc.add_object(dictionary! {
        "Font" => fonts,
        "XObject" => xobjects,
    });

    let page_size = rendered.page_size;
    let media_box: Vec<LoObject> = vec![
        0.into(),
        0.into(),
        page_size.width.to_f32().into(),
        page_size.height.to_f32().into(),
    ];
    let mut kids: Vec<LoObject> = Vec::with_capacity(rendered.pages.len());
    let mut content_bytes = Vec::with_capacity(rendered.pages.len());
    for page in &rendered.pages {
        let stream = render_page(page, page_size.height, rendered);
        content_bytes.push(stream.content.len());
        let content_id = doc.add_object(LoStream::new(dictionary! {}, stream.content.into_bytes()));
        let mut page_dict = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => media_box.clone(),
            "Resources" => resources_id,
            "Contents" => content_id,
        };
        if !stream.links.is_empty() {
            let annots: Vec<LoObject> = stream
                .links
                .iter()
                .map(|(rect, uri)| doc.add_object(link_annotation(*rect, uri, page_size.height)).into())
                .collect();
            page_dict.set("Annots", annots);
        }
        kids.push(doc.add_object(page_dict).into());
    }
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        LoObject::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    };
    if !meta.language.trim().is_empty() {
        catalog.set("Lang", LoObject::string_literal(meta.language.trim()));
    }
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", catalog_id);

    let mut info = dictionary! {
        "Title" => LoObject::string_literal(meta.title),
        "Producer" => LoObject::string_literal(PRODUCER),
    };
    if let Some(date) = pdf_date(meta.created_ms) {
        info.set("CreationDate", LoObject::string_literal(date.clone()));
        info.set("ModDate", LoObject::string_literal(date));
    }
    let info_id = doc.add_object(info);
    doc.trailer.set("Info", info_id);

    Ok(PdfOutput {
        document: doc,
        content_bytes,
    })
}

/// Compresses every stream and serializes the document.
pub fn save_pdf(doc: &mut LoDocument) -> Result<Vec<u8>, MenuPdfError> {
    doc.compress();
    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|err| MenuPdfError::Pdf(format!("serialize: {err}")))?;
    Ok(out)
}

fn add_image(doc: &mut LoDocument, image: &RasterImage) -> Result<ObjectId, MenuPdfError> {
    let pixels = image.width as usize * image.height as usize;
    if image.rgba.len() != pixels * 4 {
        return Err(MenuPdfError::Pdf(format!(
            "image {}x{} has {} bytes of rgba",
            image.width,
            image.height,
            image.rgba.len()
        )));
    }
    let mut rgb = Vec::with_capacity(pixels * 3);
    let mut alpha = Vec::with_capacity(pixels);
    for px in image.rgba.chunks_exact(4) {
        rgb.extend_from_slice(&px[..3]);
        alpha.push(px[3]);
    }
    let width = image.width as i64;
    let height = image.height as i64;
    let smask_id = doc.add_object(LoStream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        alpha,
    ));
    Ok(doc.add_object(LoStream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "SMask" => smask_id,
        },
        rgb,
    )))
}

fn link_annotation(rect: Rect, uri: &str, page_height: Pt) -> Dictionary {
    let bottom = page_height - rect.bottom();
    let top = page_height - rect.y;
    dictionary! {
        "Type" => "Annot",
        "Subtype" => "Link",
        "Rect" => vec![
            rect.x.to_f32().into(),
            bottom.to_f32().into(),
            rect.right().to_f32().into(),
            top.to_f32().into(),
        ],
        "Border" => vec![0.into(), 0.into(), 0.into()],
        "A" => dictionary! {
            "S" => "URI",
            "URI" => LoObject::string_literal(uri),
        },
    }
}

fn pdf_date(timestamp_ms: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .map(|dt| dt.format("D:%Y%m%d%H%M%SZ").to_string())
}

fn render_page(page: &Page, page_height: Pt, rendered: &RenderedDocument) -> PageStream {
    let mut out = String::new();
    let mut links = Vec::new();
    let mut text = TextState {
        face: FontFace::Regular,
        size: Pt::from_f32(12.0),
    };
    let mut saved: Vec<TextState> = Vec::new();
    let flip = |y: Pt| fmt_pt(page_height - y);

    for cmd in &page.commands {
        match cmd {
            Command::SaveState => {
                saved.push(text);
                out.push_str("q\n");
            }
            Command::RestoreState => {
                if let Some(state) = saved.pop() {
                    text = state;
                }
                out.push_str("Q\n");
            }
            Command::Meta { .. } => {}
            Command::SetFillColor(color) => {
                out.push_str(&format!("{} rg\n", fmt_color(*color)));
            }
            Command::SetStrokeColor(color) => {
                out.push_str(&format!("{} RG\n", fmt_color(*color)));
            }
            Command::SetLineWidth(width) => {
                out.push_str(&format!("{} w\n", fmt_pt(*width)));
            }
            Command::SetFontFace(face) => text.face = *face,
            Command::SetFontSize(size) => text.size = *size,
            Command::MoveTo { x, y } => {
                out.push_str(&format!("{} {} m\n", fmt_pt(*x), flip(*y)));
            }
            Command::LineTo { x, y } => {
                out.push_str(&format!("{} {} l\n", fmt_pt(*x), flip(*y)));
            }
            Command::CurveTo {
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} {} {} c\n",
                    fmt_pt(*x1),
                    flip(*y1),
                    fmt_pt(*x2),
                    flip(*y2),
                    fmt_pt(*x),
                    flip(*y)
                ));
            }
            Command::ClosePath => out.push_str("h\n"),
            Command::Fill => out.push_str("f\n"),
            Command::Stroke => out.push_str("S\n"),
            Command::FillStroke => out.push_str("B\n"),
            Command::DrawString { x, y, text: value } => {
                if value.is_empty() {
                    continue;
                }
                out.push_str(&format!(
                    "BT /{} {} Tf {} {} Td ({}) Tj ET\n",
                    text.face.resource_name(),
                    fmt_pt(text.size),
                    fmt_pt(*x),
                    flip(*y + text.size),
                    encode_winansi_pdf_string(value)
                ));
            }
            Command::DrawRect {
                x,
                y,
                width,
                height,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} re\n",
                    fmt_pt(*x),
                    flip(*y + *height),
                    fmt_pt(*width),
                    fmt_pt(*height)
                ));
            }
            Command::DrawImage {
                x,
                y,
                width,
                height,
                resource_id,
            } => {
                if !rendered.images.contains_key(resource_id) {
                    log::warn!("image resource {resource_id} is not registered; skipped");
                    continue;
                }
                out.push_str(&format!(
                    "q {} 0 0 {} {} {} cm /{} Do Q\n",
                    fmt_pt(*width),
                    fmt_pt(*height),
                    fmt_pt(*x),
                    flip(*y + *height),
                    resource_id
                ));
            }
            Command::LinkArea { rect, uri } => links.push((*rect, uri.clone())),
        }
    }
    PageStream {
        content: out,
        links,
    }
}

/// Literal-string body for base-14 text: WinAnsi bytes, with delimiters escaped
/// and non-ASCII bytes written as octal escapes.
fn encode_winansi_pdf_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        let byte = match ch {
            '\t' => b' ',
            _ => winansi_byte(ch).unwrap_or(b'?'),
        };
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b if !(0x20..0x7f).contains(&b) => out.push_str(&format!("\\{b:03o}")),
            b => out.push(b as char),
        }
    }
    out
}

fn fmt_color(color: Color) -> String {
    let unit = |value: f32| format_milli((value.clamp(0.0, 1.0) * 1000.0).round() as i64);
    format!("{} {} {}", unit(color.r), unit(color.g), unit(color.b))
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        format!("{sign}{int_part}")
    } else {
        let mut s = format!("{sign}{int_part}.{frac_part:03}");
        while s.ends_with('0') {
            s.pop();
        }
        s
    }
}

fn fmt_pt(value: Pt) -> String {
    format_milli(value.to_milli_i64())
}

/// Text shown on each page, decoded from the content streams. Used by tests to
/// check what actually reached the file.
#[cfg(test)]
pub(crate) fn page_texts(bytes: &[u8]) -> Vec<String> {
    let doc = LoDocument::load_mem(bytes).unwrap();
    doc.get_pages()
        .values()
        .map(|page_id| {
            let content = doc.get_page_content(*page_id).unwrap();
            let ops = lopdf::content::Content::decode(&content).unwrap();
            let mut text = String::new();
            for op in ops.operations {
                if op.operator == "Tj" {
                    if let Some(LoObject::String(raw, _)) = op.operands.first() {
                        text.extend(raw.iter().map(|b| *b as char));
                        text.push('\n');
                    }
                }
            }
            text
        })
        .collect()
}
