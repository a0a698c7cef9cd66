//! Matching rules deciding which element attributes get rewritten.
//!
//! Rules are pure: they look at one element's local name, resolved namespace
//! and attributes, and never at the surrounding document.

use crate::models::TargetKind;

const AUDIO_EXTENSIONS: [&str; 6] = ["mp3", "m4a", "aac", "wav", "flac", "ogg"];
const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "webp", "bmp", "svg"];

/// An attribute to replace with a proxied link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeRewrite {
    pub attribute: &'static str,
    pub kind: TargetKind,
}

/// Namespace of an element as seen by the rules.
///
/// `None` means the element is in no namespace. For a prefix that was never
/// declared the prefix itself is used, so sloppy feeds using `itunes:` or
/// `media:` without an `xmlns` declaration are still recognised.
pub type Namespace<'a> = Option<&'a str>;

fn is_itunes(ns: Namespace<'_>) -> bool {
    ns.map_or(true, |uri| uri.to_ascii_lowercase().contains("itunes"))
}

fn is_media(ns: Namespace<'_>) -> bool {
    ns.is_some_and(|uri| {
        let uri = uri.to_ascii_lowercase();
        uri.contains("media") || uri.contains("mrss")
    })
}

/// Look up a (non-empty) attribute value by name
fn attribute<'a>(attributes: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
        .filter(|value| !value.trim().is_empty())
}

/// Cheap pre-check on the local name before attributes are decoded
pub fn is_candidate(local_name: &str) -> bool {
    matches!(local_name, "enclosure" | "image" | "content" | "thumbnail")
}

/// Decide whether an element carries a link to rewrite.
///
/// Returns `None` when no rule matches or the targeted attribute is absent or empty.
pub fn match_element(
    local_name: &str,
    namespace: Namespace<'_>,
    attributes: &[(String, String)],
) -> Option<AttributeRewrite> {
    let rewrite = match local_name {
        "enclosure" => AttributeRewrite {
            attribute: "url",
            kind: TargetKind::Audio,
        },
        "image" if is_itunes(namespace) => AttributeRewrite {
            attribute: "href",
            kind: TargetKind::Image,
        },
        "content" if is_media(namespace) => {
            let url = attribute(attributes, "url")?;
            AttributeRewrite {
                attribute: "url",
                kind: classify_media(attribute(attributes, "type"), url),
            }
        }
        "thumbnail" if is_media(namespace) => AttributeRewrite {
            attribute: "url",
            kind: TargetKind::Image,
        },
        _ => return None,
    };

    attribute(attributes, rewrite.attribute).map(|_| rewrite)
}

/// Whether a text node at this position is an `<image><url>` body
pub fn is_image_url_text(parent: Option<&str>, grandparent: Option<&str>) -> bool {
    parent == Some("url") && grandparent == Some("image")
}

/// Classify a media attachment: declared MIME type first, then file extension,
/// then audio.
pub fn classify_media(mime_type: Option<&str>, url: &str) -> TargetKind {
    if let Some(kind) = mime_type.and_then(kind_from_mime) {
        return kind;
    }
    kind_from_extension(url).unwrap_or(TargetKind::Audio)
}

fn kind_from_mime(mime_type: &str) -> Option<TargetKind> {
    let mime_type = mime_type.trim().to_ascii_lowercase();
    if mime_type.starts_with("audio/") {
        Some(TargetKind::Audio)
    } else if mime_type.starts_with("image/") {
        Some(TargetKind::Image)
    } else {
        None
    }
}

fn kind_from_extension(url: &str) -> Option<TargetKind> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').next().unwrap_or(path);
    let (_, extension) = file.rsplit_once('.')?;
    let extension = extension.to_ascii_lowercase();

    if AUDIO_EXTENSIONS.contains(&extension.as_str()) {
        Some(TargetKind::Audio)
    } else if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        Some(TargetKind::Image)
    } else {
        None
    }
}
