//! WebDAV multistatus parsing
//!
//! Turns the body of a `PROPFIND` (`Depth: 1`) response into [`RemoteResource`]
//! entries. Element matching is done on local names so any namespace prefix the
//! server picks for `DAV:` works.

use percent_encoding::percent_decode_str;
use quick_xml::Reader;
use quick_xml::events::Event;
use url::Url;

use crate::remote::RemoteResource;

/// Request body asking for the properties the harvester needs
pub const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:">
  <d:prop>
    <d:displayname/>
    <d:resourcetype/>
    <d:getcontenttype/>
    <d:getcontentlength/>
  </d:prop>
</d:propfind>"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Href,
    DisplayName,
    ContentType,
    ContentLength,
}

#[derive(Debug, Default)]
struct Entry {
    href: String,
    display_name: String,
    content_type: String,
    content_length: String,
    is_directory: bool,
}

/// Parse a multistatus body listed from `folder_url`.
///
/// The entry describing the folder itself is dropped. Hrefs are resolved against
/// `folder_url`, so both absolute paths and full URLs are accepted.
pub fn parse_multistatus(
    body: &str,
    folder: &str,
    folder_url: &Url,
) -> Result<Vec<RemoteResource>, String> {
    let mut reader = Reader::from_str(body);
    reader.trim_text(true);

    let mut resources = Vec::new();
    let mut current: Option<Entry> = None;
    let mut field: Option<Field> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"response" => current = Some(Entry::default()),
                b"href" => field = Some(Field::Href),
                b"displayname" => field = Some(Field::DisplayName),
                b"getcontenttype" => field = Some(Field::ContentType),
                b"getcontentlength" => field = Some(Field::ContentLength),
                b"collection" => mark_directory(&mut current),
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"collection" {
                    mark_directory(&mut current);
                }
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(|e| {
                    format!("invalid text at byte {}: {}", reader.buffer_position(), e)
                })?;
                append_text(&mut current, field, &text);
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(e.as_ref()).to_string();
                append_text(&mut current, field, &text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"response" => {
                    if let Some(entry) = current.take()
                        && let Some(resource) = into_resource(entry, folder, folder_url)?
                    {
                        resources.push(resource);
                    }
                }
                b"href" | b"displayname" | b"getcontenttype" | b"getcontentlength" => {
                    field = None
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "malformed multistatus at byte {}: {}",
                    reader.buffer_position(),
                    e
                ));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(resources)
}

fn mark_directory(current: &mut Option<Entry>) {
    if let Some(entry) = current.as_mut() {
        entry.is_directory = true;
    }
}

fn append_text(current: &mut Option<Entry>, field: Option<Field>, text: &str) {
    let (Some(entry), Some(field)) = (current.as_mut(), field) else {
        return;
    };
    let target = match field {
        Field::Href => &mut entry.href,
        Field::DisplayName => &mut entry.display_name,
        Field::ContentType => &mut entry.content_type,
        Field::ContentLength => &mut entry.content_length,
    };
    target.push_str(text);
}

fn into_resource(
    entry: Entry,
    folder: &str,
    folder_url: &Url,
) -> Result<Option<RemoteResource>, String> {
    let href = entry.href.trim();
    if href.is_empty() {
        return Err("response entry without href".to_string());
    }

    let url = folder_url
        .join(href)
        .map_err(|e| format!("invalid href '{}': {}", href, e))?;

    if same_location(&url, folder_url) {
        return Ok(None);
    }

    let name = last_segment(&url);
    let display_name = Some(entry.display_name.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let content_type = Some(entry.content_type.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let content_length = entry.content_length.trim().parse().ok();

    Ok(Some(RemoteResource {
        name,
        display_name,
        href: url.to_string(),
        content_type,
        content_length,
        is_directory: entry.is_directory,
        folder: folder.to_string(),
    }))
}

fn same_location(a: &Url, b: &Url) -> bool {
    a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
        && a.path().trim_end_matches('/') == b.path().trim_end_matches('/')
}

/// Decoded last non-empty path segment
fn last_segment(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
        .unwrap_or_default();
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}
