//! Streaming feed rewriter.
//!
//! The document is read as a flat sequence of XML events and written straight
//! back out. Only the events picked by [`crate::rules`] are replaced, so unknown
//! namespaces, vendor extensions, comments and processing instructions survive
//! untouched. Output is assembled in memory and only handed back once the whole
//! input has been consumed without error.

use quick_xml::events::{BytesCData, BytesDecl, BytesStart, BytesText, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use quick_xml::Writer;

use crate::error::RewriteError;
use crate::link::build_proxy_url;
use crate::models::{ProxyContext, TargetKind};
use crate::rules;

/// Rewrite every media and image link in a feed to go through the proxy.
///
/// # Arguments
/// * `xml` - Raw feed bytes as fetched from upstream
/// * `ctx` - Public scheme/host and token used to build the proxied links
///
/// # Returns
/// The complete rewritten document, or an error if the input is not well-formed.
/// Nothing is returned for a document that fails part way through.
pub fn rewrite_feed(xml: &[u8], ctx: &ProxyContext) -> Result<Vec<u8>, RewriteError> {
    let mut reader = NsReader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + xml.len() / 4));
    let mut buf = Vec::new();

    // Local names of the currently open elements, innermost last
    let mut open: Vec<String> = Vec::new();
    let mut seen_root = false;
    let mut first_event = true;

    loop {
        let (ns, event) = match reader.read_resolved_event_into(&mut buf) {
            Ok(resolved) => resolved,
            Err(source) => {
                return Err(RewriteError::Xml {
                    position: reader.buffer_position() as u64,
                    source,
                })
            }
        };

        // Whitespace ahead of the prolog is dropped so an existing
        // declaration is still seen as the first event.
        let leading_blank = first_event
            && matches!(&event, Event::Text(t) if t.iter().all(u8::is_ascii_whitespace));
        if leading_blank {
            drop(event);
            buf.clear();
            continue;
        }

        if first_event {
            first_event = false;
            if !matches!(event, Event::Decl(_)) {
                writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
                writer.get_mut().push(b'\n');
            }
        }

        match event {
            Event::Start(e) => {
                let local = std::str::from_utf8(e.local_name().as_ref())?.to_string();
                match rewrite_element(&e, namespace_of(&ns)?, ctx)? {
                    Some(rewritten) => writer.write_event(Event::Start(rewritten))?,
                    None => writer.write_event(Event::Start(e))?,
                }
                open.push(local);
                seen_root = true;
            }
            Event::Empty(e) => {
                match rewrite_element(&e, namespace_of(&ns)?, ctx)? {
                    Some(rewritten) => writer.write_event(Event::Empty(rewritten))?,
                    None => writer.write_event(Event::Empty(e))?,
                }
                seen_root = true;
            }
            Event::End(e) => {
                open.pop();
                writer.write_event(Event::End(e))?;
            }
            Event::Text(t) => {
                let replacement = if at_image_url(&open) {
                    proxied_body(&t.unescape()?, ctx)
                } else {
                    None
                };
                match replacement {
                    Some(url) => writer.write_event(Event::Text(BytesText::new(&url)))?,
                    None => writer.write_event(Event::Text(t))?,
                }
            }
            Event::CData(c) => {
                let replacement = if at_image_url(&open) {
                    proxied_body(std::str::from_utf8(&c)?, ctx)
                } else {
                    None
                };
                match replacement {
                    Some(url) => writer.write_event(Event::CData(BytesCData::new(url)))?,
                    None => writer.write_event(Event::CData(c))?,
                }
            }
            Event::Eof => {
                if let Some(unclosed) = open.pop() {
                    return Err(RewriteError::Truncated(unclosed));
                }
                if !seen_root {
                    return Err(RewriteError::NoRootElement);
                }
                break;
            }
            other => writer.write_event(other)?,
        }

        buf.clear();
    }

    Ok(writer.into_inner())
}

/// Namespace URI of an element, or the raw prefix if it was never declared
fn namespace_of<'a>(ns: &'a ResolveResult<'_>) -> Result<Option<&'a str>, RewriteError> {
    Ok(match ns {
        ResolveResult::Bound(uri) => Some(std::str::from_utf8(uri.0)?),
        ResolveResult::Unknown(prefix) => Some(std::str::from_utf8(prefix)?),
        ResolveResult::Unbound => None,
    })
}

fn at_image_url(open: &[String]) -> bool {
    let mut ancestors = open.iter().rev().map(String::as_str);
    let parent = ancestors.next();
    let grandparent = ancestors.next();
    rules::is_image_url_text(parent, grandparent)
}

/// Proxied image link for an `<image><url>` body, `None` for blank bodies
fn proxied_body(text: &str, ctx: &ProxyContext) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(build_proxy_url(ctx, trimmed, TargetKind::Image))
}

/// Rebuild a start tag with its link attribute replaced.
///
/// Returns `None` when no rule applies, in which case the caller writes the
/// original bytes.
fn rewrite_element(
    element: &BytesStart<'_>,
    namespace: Option<&str>,
    ctx: &ProxyContext,
) -> Result<Option<BytesStart<'static>>, RewriteError> {
    let local_name = element.local_name();
    let local = std::str::from_utf8(local_name.as_ref())?;
    if !rules::is_candidate(local) {
        return Ok(None);
    }

    let mut attributes = Vec::new();
    for attr in element.attributes().with_checks(false) {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let value = attr.unescape_value()?.into_owned();
        attributes.push((key, value));
    }

    let Some(rewrite) = rules::match_element(local, namespace, &attributes) else {
        return Ok(None);
    };

    let name = std::str::from_utf8(element.name().as_ref())?.to_string();
    let mut rewritten = BytesStart::new(name);
    for (key, value) in &attributes {
        if key == rewrite.attribute {
            let proxied = build_proxy_url(ctx, value, rewrite.kind);
            rewritten.push_attribute((key.as_str(), proxied.as_str()));
        } else {
            rewritten.push_attribute((key.as_str(), value.as_str()));
        }
    }

    tracing::trace!(element = local, kind = %rewrite.kind, "Rewrote feed link");
    Ok(Some(rewritten))
}
