use log::warn;
use std::io::BufReader;
use xml::reader::{EventReader, XmlEvent};

/// Collects the text content of every `element_to_find` in an XML reply.
/// When `parent` is given, matching only starts once that element opened.
/// Malformed input stops the scan and returns what was found so far.
pub fn find_elements(
    body: &[u8],
    element_to_find: &str,
    parent: Option<&str>,
    only_once: bool,
) -> Vec<String> {
    let mut element_found = false;
    let mut result = Vec::new();

    let buffer = BufReader::new(body);
    let parser = EventReader::new(buffer);

    let mut parent_found = parent.is_none();

    for e in parser {
        match e {
            Ok(XmlEvent::StartElement { name, .. }) => {
                let element = name.local_name;

                if let Some(parent) = parent {
                    if !parent_found && element == parent {
                        parent_found = true;
                    }
                }

                if parent_found && element == element_to_find {
                    element_found = true;
                }
            }
            Ok(XmlEvent::EndElement { name, .. }) => {
                if element_found && name.local_name == element_to_find {
                    element_found = false;
                }
            }
            Ok(XmlEvent::Characters(chars)) => {
                if element_found {
                    result.push(chars);

                    if only_once {
                        break;
                    }
                }
            }
            Err(e) => {
                warn!("[Utils][find_elements] Malformed XML: {e}");
                break;
            }
            _ => {}
        }
    }

    result
}

/// First match of `element_to_find`, if any.
pub fn find_element(body: &[u8], element_to_find: &str) -> Option<String> {
    find_elements(body, element_to_find, None, true).into_iter().next()
}
