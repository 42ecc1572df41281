use super::ResponseParser;
use crate::core::ent::{Status, StatusMap};
use crate::core::error::ParseError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Atom feed with one `<entry>` per entity: name in `<title>`, severity in the
/// first `<category term="...">`.
pub struct AtomFeed;

#[derive(Default)]
struct Entry {
    title: String,
    term: Option<String>,
}

fn xml_err(e: quick_xml::Error) -> ParseError {
    ParseError::new(format!("malformed feed: {}", e))
}

fn category_term(e: &BytesStart) -> Result<Option<String>, ParseError> {
    match e.try_get_attribute("term").map_err(|e| xml_err(e.into()))? {
        Some(attr) => Ok(Some(attr.unescape_value().map_err(xml_err)?.into_owned())),
        None => Ok(None),
    }
}

impl ResponseParser for AtomFeed {
    fn parse(&self, body: &str) -> Result<StatusMap, ParseError> {
        let mut reader = Reader::from_str(body);
        reader.trim_text(true);

        let mut saw_feed = false;
        let mut entry: Option<Entry> = None;
        let mut in_title = false;
        let mut statuses = StatusMap::new();

        loop {
            match reader.read_event().map_err(xml_err)? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"feed" => saw_feed = true,
                    b"entry" => entry = Some(Entry::default()),
                    b"title" => in_title = entry.is_some(),
                    b"category" => {
                        if let Some(entry) = entry.as_mut() {
                            if entry.term.is_none() {
                                entry.term = category_term(&e)?;
                            }
                        }
                    }
                    _ => {}
                },
                Event::Empty(e) => {
                    if e.local_name().as_ref() == b"category" {
                        if let Some(entry) = entry.as_mut() {
                            if entry.term.is_none() {
                                entry.term = category_term(&e)?;
                            }
                        }
                    }
                }
                Event::Text(t) if in_title => {
                    if let Some(entry) = entry.as_mut() {
                        entry.title.push_str(&t.unescape().map_err(xml_err)?);
                    }
                }
                Event::CData(t) if in_title => {
                    if let Some(entry) = entry.as_mut() {
                        entry.title.push_str(&String::from_utf8_lossy(&t));
                    }
                }
                Event::End(e) => match e.local_name().as_ref() {
                    b"title" => in_title = false,
                    b"entry" => {
                        if let Some(done) = entry.take() {
                            let name = done.title.trim().to_string();
                            if !name.is_empty() {
                                let status = done
                                    .term
                                    .as_deref()
                                    .map(Status::from_indicator)
                                    .unwrap_or(Status::Undetermined);
                                statuses.insert(name, status);
                            }
                        }
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }

        if !saw_feed {
            return Err(ParseError::new("no atom feed element"));
        }
        Ok(statuses)
    }
}
