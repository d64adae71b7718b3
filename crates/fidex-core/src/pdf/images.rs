//! Embedded raster images of a page, for scanned documents.

use std::collections::HashSet;

use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, trace};

/// Decode every image XObject referenced from the page's resources.
///
/// Images in formats the `image` crate cannot read (JPEG 2000, CCITT fax,
/// JBIG2, non-8-bit samples) are skipped.
pub fn page_images(doc: &Document, page_id: ObjectId) -> Vec<DynamicImage> {
    let Some(resources) = page_resources(doc, page_id) else {
        return Vec::new();
    };

    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|obj| doc.dereference(obj).ok())
        .and_then(|(_, obj)| obj.as_dict().ok())
    else {
        return Vec::new();
    };

    let images: Vec<DynamicImage> = xobjects
        .iter()
        .filter_map(|(_, obj)| doc.dereference(obj).ok())
        .filter_map(|(_, obj)| obj.as_stream().ok())
        .filter_map(|stream| decode_image(doc, stream))
        .collect();

    debug!("Decoded {} images on page object {:?}", images.len(), page_id);
    images
}

fn decode_image(doc: &Document, stream: &Stream) -> Option<DynamicImage> {
    let dict = &stream.dict;
    if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
        return None;
    }

    let width = u32::try_from(dict.get(b"Width").ok()?.as_i64().ok()?).ok()?;
    let height = u32::try_from(dict.get(b"Height").ok()?.as_i64().ok()?).ok()?;
    trace!("Image XObject {}x{}", width, height);

    let filter = dict.get(b"Filter").ok().and_then(|f| match f {
        Object::Name(name) => Some(name.as_slice()),
        Object::Array(arr) => arr.last().and_then(|o| o.as_name().ok()),
        _ => None,
    });

    match filter {
        Some(b"DCTDecode") => {
            return image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg).ok();
        }
        Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
            trace!("Skipping image with unsupported filter {:?}", filter.map(String::from_utf8_lossy));
            return None;
        }
        _ => {}
    }

    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8);
    if bits != 8 {
        trace!("Skipping {}-bit image", bits);
        return None;
    }

    let color_space = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| match o {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            Object::Reference(r) => doc.get_object(*r).ok().and_then(|o| o.as_name().ok()),
            _ => None,
        })
        .unwrap_or(b"DeviceRGB");

    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    raw_samples(data, width, height, color_space)
}

/// Build an image from uncompressed 8-bit samples.
fn raw_samples(mut data: Vec<u8>, width: u32, height: u32, color_space: &[u8]) -> Option<DynamicImage> {
    let pixels = (width as usize).checked_mul(height as usize)?;

    match color_space {
        b"DeviceRGB" | b"RGB" | b"CalRGB" => {
            data.truncate(pixels.checked_mul(3)?);
            RgbImage::from_raw(width, height, data).map(DynamicImage::ImageRgb8)
        }
        b"DeviceGray" | b"G" | b"CalGray" => {
            data.truncate(pixels);
            GrayImage::from_raw(width, height, data).map(DynamicImage::ImageLuma8)
        }
        other => {
            trace!("Unsupported color space {}", String::from_utf8_lossy(other));
            None
        }
    }
}

/// Page resources, following `Parent` links for inherited dictionaries.
/// Stops at the first node seen twice.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<Dictionary> {
    let mut visited = HashSet::from([page_id]);
    let mut node = doc.get_object(page_id).ok()?.as_dict().ok()?;

    loop {
        if let Ok(resources) = node.get(b"Resources") {
            if let Ok((_, Object::Dictionary(dict))) = doc.dereference(resources) {
                return Some(dict.clone());
            }
        }

        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        if !visited.insert(parent) {
            debug!("Page tree cycle at {:?}", parent);
            return None;
        }
        node = doc.get_object(parent).ok()?.as_dict().ok()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn test_raw_gray_samples() {
        let img = raw_samples(vec![0, 64, 128, 255, 9, 9], 2, 2, b"DeviceGray").unwrap();
        assert_eq!((img.width(), img.height()), (2, 2));
        assert_eq!(img.to_luma8().get_pixel(1, 1).0, [255]);
    }

    #[test]
    fn test_short_samples_rejected() {
        assert!(raw_samples(vec![0; 5], 2, 2, b"DeviceRGB").is_none());
        assert!(raw_samples(vec![0; 16], 2, 2, b"DeviceCMYK").is_none());
    }

    #[test]
    fn test_parent_cycle_terminates() {
        let mut doc = Document::with_version("1.5");
        let page_id = doc.new_object_id();
        let node_id = doc.new_object_id();
        doc.objects.insert(
            page_id,
            Object::Dictionary(lopdf::dictionary! { "Type" => "Page", "Parent" => node_id }),
        );
        doc.objects.insert(
            node_id,
            Object::Dictionary(lopdf::dictionary! { "Type" => "Pages", "Parent" => page_id }),
        );

        assert!(page_resources(&doc, page_id).is_none());
        assert!(page_images(&doc, page_id).is_empty());
    }

    #[test]
    fn test_inherited_resources() {
        let mut doc = Document::with_version("1.5");
        let page_id = doc.new_object_id();
        let node_id = doc.new_object_id();
        doc.objects.insert(
            page_id,
            Object::Dictionary(lopdf::dictionary! { "Type" => "Page", "Parent" => node_id }),
        );
        doc.objects.insert(
            node_id,
            Object::Dictionary(lopdf::dictionary! {
                "Type" => "Pages",
                "Resources" => lopdf::dictionary! { "ProcSet" => vec![Object::Name(b"PDF".to_vec())] },
            }),
        );

        let resources = page_resources(&doc, page_id).unwrap();
        assert!(resources.has(b"ProcSet"));
    }
}
