//! Single-pass converters for OCS XML envelopes (sharing API).
//!
//! OCS responses wrap payloads in an `<ocs><meta/><data/></ocs>` envelope;
//! the meta block carries the API-level status independent of the HTTP
//! status code.

use std::collections::HashMap;
use std::str;

use chrono::{DateTime, TimeZone, Utc};
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::errors::ClientError;
use crate::models::{ShareEntry, ShareType};

#[derive(Debug, Clone, Default)]
pub struct OcsMeta {
    pub status: String,
    pub status_code: i32,
    pub message: String,
}

impl OcsMeta {
    /// OCS v1 reports success as 100, v2 as 200.
    pub fn is_ok(&self) -> bool {
        self.status_code == 100 || self.status_code == 200
    }

    pub fn ensure_ok(&self) -> Result<(), ClientError> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(ClientError::ocs(self.status_code, self.message.clone()))
        }
    }
}

struct OcsDocument {
    meta: OcsMeta,
    /// One field map per `<element>`; a bare `<data>` payload yields one map.
    records: Vec<HashMap<String, String>>,
}

fn local_name(name: quick_xml::name::QName) -> Result<String, ClientError> {
    str::from_utf8(name.local_name().as_ref())
        .map(|s| s.to_string())
        .map_err(|e| ClientError::xml(format!("Invalid UTF-8 in element name: {}", e)))
}

fn collect_ocs(xml_text: &str) -> Result<OcsDocument, ClientError> {
    let mut reader = Reader::from_str(xml_text);
    reader.config_mut().trim_text(true);

    let mut meta = OcsMeta::default();
    let mut records: Vec<HashMap<String, String>> = Vec::new();
    let mut data_fields: HashMap<String, String> = HashMap::new();
    let mut saw_element = false;
    let mut stack: Vec<String> = Vec::new();

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(e.name())?;
                if name == "element" && stack.last().map(String::as_str) == Some("data") {
                    saw_element = true;
                    records.push(HashMap::new());
                }
                stack.push(name);
            }
            Ok(Event::Text(e)) => {
                let text = match e.unescape() {
                    Ok(text) => text.trim().to_string(),
                    Err(err) => return Err(ClientError::xml(err.to_string())),
                };
                if text.is_empty() {
                    continue;
                }
                let Some(element) = stack.last() else { continue };

                if stack.iter().any(|s| s == "meta") {
                    match element.as_str() {
                        "status" => meta.status = text,
                        "statuscode" => meta.status_code = text.parse().unwrap_or(0),
                        "message" => meta.message = text,
                        _ => {}
                    }
                } else if stack.iter().any(|s| s == "element") {
                    if let Some(record) = records.last_mut() {
                        record.insert(element.clone(), text);
                    }
                } else if stack.iter().any(|s| s == "data") {
                    data_fields.insert(element.clone(), text);
                }
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ClientError::xml(format!("XML parsing error: {}", e))),
            _ => {}
        }

        buf.clear();
    }

    // A single-share response carries its fields directly under <data>.
    if !saw_element && !data_fields.is_empty() {
        records.push(data_fields);
    }

    Ok(OcsDocument { meta, records })
}

/// Parse just the OCS meta envelope.
pub fn parse_ocs_meta(xml_text: &str) -> Result<OcsMeta, ClientError> {
    Ok(collect_ocs(xml_text)?.meta)
}

fn share_from_fields(fields: &HashMap<String, String>) -> ShareEntry {
    let opt = |key: &str| -> Option<String> {
        fields.get(key).filter(|v| !v.is_empty()).cloned()
    };

    ShareEntry {
        id: fields
            .get("id")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        share_type: ShareType::from_raw(
            fields
                .get("share_type")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        ),
        path: fields.get("path").cloned().unwrap_or_default(),
        item_type: fields.get("item_type").cloned().unwrap_or_default(),
        permissions: fields
            .get("permissions")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        password: opt("password"),
        expiration: fields.get("expiration").and_then(|v| parse_ocs_datetime(v)),
        note: opt("note"),
        label: opt("label"),
        uid_owner: fields.get("uid_owner").cloned().unwrap_or_default(),
        displayname_owner: fields
            .get("displayname_owner")
            .cloned()
            .unwrap_or_default(),
        uid_file_owner: fields.get("uid_file_owner").cloned().unwrap_or_default(),
        share_with: opt("share_with"),
        share_with_displayname: opt("share_with_displayname"),
        token: opt("token"),
        url: opt("url"),
        created_at: fields
            .get("stime")
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|secs| *secs > 0)
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
    }
}

/// Share expirations arrive as `YYYY-MM-DD HH:MM:SS` in server-local time;
/// they are treated as UTC for lack of a zone in the payload.
fn parse_ocs_datetime(value: &str) -> Option<DateTime<Utc>> {
    chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|ndt| DateTime::from_naive_utc_and_offset(ndt, Utc))
}

/// Parse a share list (or single-share) OCS response.
pub fn parse_share_list(xml_text: &str) -> Result<Vec<ShareEntry>, ClientError> {
    let document = collect_ocs(xml_text)?;
    document.meta.ensure_ok()?;
    Ok(document.records.iter().map(share_from_fields).collect())
}

/// Parse a create/update share response carrying exactly one share.
pub fn parse_single_share(xml_text: &str) -> Result<ShareEntry, ClientError> {
    parse_share_list(xml_text)?
        .into_iter()
        .next()
        .ok_or_else(|| ClientError::xml("OCS response contained no share record"))
}
