//! Page assembly: captured page images in, a single PDF byte stream out.
//!
//! Output page N is always input page N; recompression changes bytes, never
//! order or count. Each PNG screenshot is decoded, re-encoded as JPEG at the
//! configured quality to keep decks of large screenshots to a sane file size,
//! and embedded as a `DCTDecode` image XObject on its own page. Screenshots
//! come in at CSS-pixel density, so the page box maps pixels to points at
//! 96 px/inch.
//!
//! CPU-bound; the worker runs it inside `tokio::task::spawn_blocking`.

use image::codecs::jpeg::JpegEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::io::Cursor;
use tracing::debug;

use crate::error::ConvertError;
use crate::pipeline::capture::CapturedPage;

/// Points per captured pixel (96 px/inch on a 72 pt/inch page).
const PT_PER_PX: f32 = 72.0 / 96.0;

/// Build a PDF from captured pages, preserving order exactly.
///
/// # Errors
/// [`ConvertError::Assembly`] when `pages` is empty or any page image fails
/// to decode.
pub fn build_pdf(pages: &[CapturedPage], jpeg_quality: u8) -> Result<Vec<u8>, ConvertError> {
    if pages.is_empty() {
        return Err(ConvertError::Assembly {
            detail: "no pages were captured".into(),
        });
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());

    for page in pages {
        let (jpeg, width, height) = recompress(page, jpeg_quality)?;

        // Already DCT-compressed; lopdf must not deflate it again.
        let image_stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        )
        .with_compression(false);
        let image_id = doc.add_object(image_stream);

        let width_pt = width as f32 * PT_PER_PX;
        let height_pt = height as f32 * PT_PER_PX;

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Real(width_pt),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Real(height_pt),
                        Object::Integer(0),
                        Object::Integer(0),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().map_err(|e| ConvertError::Assembly {
                detail: format!("content stream for page {}: {e}", page.index),
            })?,
        ));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(width_pt),
                Object::Real(height_pt),
            ],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut Cursor::new(&mut out))
        .map_err(|e| ConvertError::Assembly {
            detail: format!("PDF serialisation failed: {e}"),
        })?;

    debug!(
        pages = pages.len(),
        bytes = out.len(),
        "assembled PDF document"
    );
    Ok(out)
}

/// Decode one captured PNG and re-encode it as RGB JPEG.
fn recompress(page: &CapturedPage, quality: u8) -> Result<(Vec<u8>, u32, u32), ConvertError> {
    let decoded =
        image::load_from_memory(&page.png).map_err(|e| ConvertError::Assembly {
            detail: format!("page {} image could not be decoded: {e}", page.index),
        })?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut Cursor::new(&mut jpeg), quality)
        .encode_image(&rgb)
        .map_err(|e| ConvertError::Assembly {
            detail: format!("page {} could not be recompressed: {e}", page.index),
        })?;
    Ok((jpeg, width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn png_page(index: usize, w: u32, h: u32, fill: [u8; 3]) -> CapturedPage {
        let img = RgbImage::from_pixel(w, h, Rgb(fill));
        let mut png = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .expect("encode test png");
        CapturedPage { index, png }
    }

    #[test]
    fn empty_input_is_an_assembly_error() {
        let err = build_pdf(&[], 85).unwrap_err();
        assert!(matches!(err, ConvertError::Assembly { .. }));
    }

    #[test]
    fn output_is_a_pdf_with_one_page_per_input() {
        let pages = vec![
            png_page(1, 40, 30, [255, 0, 0]),
            png_page(2, 40, 30, [0, 255, 0]),
            png_page(3, 40, 30, [0, 0, 255]),
        ];
        let bytes = build_pdf(&pages, 85).expect("assembly succeeds");
        assert!(bytes.starts_with(b"%PDF"));

        let doc = Document::load_mem(&bytes).expect("output parses");
        assert_eq!(doc.get_pages().len(), 3);
    }

    #[test]
    fn page_order_is_input_order() {
        // Distinct dimensions per page let us trace output pages back to
        // their inputs through the image XObject sizes.
        let pages = vec![
            png_page(1, 10, 10, [1, 2, 3]),
            png_page(2, 20, 10, [4, 5, 6]),
            png_page(3, 30, 10, [7, 8, 9]),
        ];
        let bytes = build_pdf(&pages, 85).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();

        let mut widths = Vec::new();
        for (_num, page_id) in doc.get_pages() {
            let resources = doc
                .get_page_resources(page_id)
                .unwrap()
                .0
                .expect("page has resources");
            let xobjects = resources
                .get(b"XObject")
                .and_then(Object::as_dict)
                .expect("xobject dict");
            let image_ref = xobjects
                .get(b"Im0")
                .and_then(Object::as_reference)
                .expect("image ref");
            let stream = doc
                .get_object(image_ref)
                .and_then(Object::as_stream)
                .expect("image stream");
            let width = stream
                .dict
                .get(b"Width")
                .and_then(Object::as_i64)
                .expect("width");
            widths.push(width);
        }
        assert_eq!(widths, vec![10, 20, 30]);
    }

    #[test]
    fn undecodable_page_fails_with_its_index() {
        let pages = vec![
            png_page(1, 8, 8, [0, 0, 0]),
            CapturedPage {
                index: 2,
                png: vec![0xde, 0xad, 0xbe, 0xef],
            },
        ];
        let err = build_pdf(&pages, 85).unwrap_err();
        match err {
            ConvertError::Assembly { detail } => assert!(detail.contains("page 2")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
