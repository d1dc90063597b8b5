//! Template bundles: a ZIP holding one HTML file and the images it uses.
//!
//! Images are inlined into the markup as `data:` URIs so the stored template
//! is self-contained.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::LazyLock;

use crate::error::{AppError, AppResult};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg"];

static REFERENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)((?:src|href)\s*=\s*)(["'])([^"']+)(["'])"#).expect("valid regex"));

#[derive(Debug)]
pub struct Bundle {
    pub html: String,
    pub image_count: u32,
}

fn extension(path: &str) -> Option<String> {
    path.rsplit_once('.').map(|(_, ext)| ext.to_lowercase())
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Reads one entry while charging it against the remaining uncompressed budget.
fn read_limited(entry: impl Read, name: &str, budget: &mut u64) -> AppResult<Vec<u8>> {
    let mut data = Vec::new();
    entry
        .take(*budget + 1)
        .read_to_end(&mut data)
        .map_err(|e| AppError::Validation(format!("cannot read {name}: {e}")))?;
    let read = data.len() as u64;
    if read > *budget {
        return Err(AppError::Validation(
            "ZIP contents exceed the upload size limit".to_string(),
        ));
    }
    *budget -= read;
    Ok(data)
}

/// Unpacks a bundle. `max_bytes` bounds the total uncompressed size of the
/// entries that are read.
pub fn unpack(bytes: &[u8], max_bytes: usize) -> AppResult<Bundle> {
    let invalid = |e: zip::result::ZipError| AppError::Validation(format!("Invalid ZIP archive: {e}"));
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(invalid)?;

    let mut html: Option<String> = None;
    // Both the full entry path and the bare file name point at the data URI.
    let mut images: HashMap<String, String> = HashMap::new();
    let mut image_count = 0u32;
    let mut budget = max_bytes as u64;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(invalid)?;
        let name = entry.name().replace('\\', "/");
        if entry.is_dir() || name.starts_with("__MACOSX/") {
            continue;
        }
        let Some(ext) = extension(&name) else { continue };

        if (ext == "html" || ext == "htm") && html.is_none() {
            let data = read_limited(&mut entry, &name, &mut budget)?;
            let text =
                String::from_utf8(data).map_err(|_| AppError::Validation(format!("{name} is not UTF-8 text")))?;
            html = Some(text);
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            let data = read_limited(&mut entry, &name, &mut budget)?;
            let mime = mime_guess::from_path(&name).first_or_octet_stream();
            let uri = format!("data:{};base64,{}", mime.essence_str(), BASE64.encode(&data));
            images.entry(file_name(&name).to_string()).or_insert_with(|| uri.clone());
            images.insert(name, uri);
            image_count += 1;
        }
    }

    let html = html.ok_or_else(|| AppError::Validation("ZIP contains no HTML file".to_string()))?;
    log::debug!("template bundle with {} images", image_count);
    Ok(Bundle {
        html: inline_images(&html, &images),
        image_count,
    })
}

fn inline_images(html: &str, images: &HashMap<String, String>) -> String {
    REFERENCE_RE
        .replace_all(html, |caps: &Captures| {
            let target = caps[3].trim_start_matches("./");
            match images.get(target).or_else(|| images.get(file_name(target))) {
                Some(uri) => format!("{}{}{}{}", &caps[1], &caps[2], uri, &caps[4]),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
