use std::collections::HashMap;
use std::str;

use chrono::{DateTime, TimeZone, Utc};
use quick_xml::events::Event;
use quick_xml::name::QName;
use quick_xml::reader::Reader;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::config::{ListingOptions, SessionConfig};
use crate::errors::ClientError;
use crate::models::{
    ClassFile, CommentEntry, DownloadLimit, FileEntry, FileLock, LockOwnerType, TrashEntry,
};
use crate::type_classifier::{classify, TypeRegistry};

/// One multistatus response element, accumulated as a flat key→value map
/// plus the few repeated child groups that need their own collections.
/// Property keys are namespace-qualified (`oc:favorite`, not `favorite`)
/// because the two sharing extensions collide on local name.
#[derive(Debug, Default)]
struct RawResponse {
    href: String,
    is_collection: bool,
    props: HashMap<String, String>,
    share_types: Vec<i32>,
    tags: Vec<String>,
    download_limits: Vec<DownloadLimit>,
}

fn qualified_key(name: QName) -> Result<String, ClientError> {
    let local = str::from_utf8(name.local_name().as_ref())
        .map_err(|e| ClientError::xml(format!("Invalid UTF-8 in element name: {}", e)))?
        .to_string();
    match name.prefix() {
        Some(prefix) => {
            let prefix = str::from_utf8(prefix.as_ref())
                .map_err(|e| ClientError::xml(format!("Invalid UTF-8 in prefix: {}", e)))?;
            Ok(format!("{}:{}", prefix, local))
        }
        None => Ok(local),
    }
}

/// Walk a multistatus document and collect one `RawResponse` per repeated
/// response element. Not-well-formed XML is the only failure mode.
fn collect_responses(xml_text: &str) -> Result<Vec<RawResponse>, ClientError> {
    let mut reader = Reader::from_str(xml_text);
    reader.config_mut().trim_text(true);

    let mut responses = Vec::new();
    let mut current: Option<RawResponse> = None;
    let mut pending_limit: Option<DownloadLimit> = None;
    let mut stack: Vec<String> = Vec::new();

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let key = qualified_key(e.name())?;
                match key.as_str() {
                    "d:response" => current = Some(RawResponse::default()),
                    "d:collection" => {
                        if stack.last().map(String::as_str) == Some("d:resourcetype") {
                            if let Some(ref mut resp) = current {
                                resp.is_collection = true;
                            }
                        }
                    }
                    "nc:download-limit" => pending_limit = Some(DownloadLimit::default()),
                    _ => {}
                }
                stack.push(key);
            }
            Ok(Event::Empty(e)) => {
                let key = qualified_key(e.name())?;
                if key == "d:collection"
                    && stack.last().map(String::as_str) == Some("d:resourcetype")
                {
                    if let Some(ref mut resp) = current {
                        resp.is_collection = true;
                    }
                }
            }
            Ok(Event::Text(e)) => {
                let text = match e.unescape() {
                    Ok(text) => text.trim().to_string(),
                    Err(err) => return Err(ClientError::xml(err.to_string())),
                };
                if text.is_empty() {
                    continue;
                }
                let Some(resp) = current.as_mut() else { continue };
                let Some(element) = stack.last() else { continue };

                match element.as_str() {
                    "d:href" => resp.href = text,
                    "oc:share-type" => {
                        if let Ok(share_type) = text.parse::<i32>() {
                            resp.share_types.push(share_type);
                        }
                    }
                    "nc:system-tag" => resp.tags.push(text),
                    "nc:token" | "nc:limit" | "nc:count" => {
                        if let Some(limit) = pending_limit.as_mut() {
                            match element.as_str() {
                                "nc:token" => limit.token = text,
                                "nc:limit" => limit.limit = text.parse().unwrap_or(0),
                                _ => limit.count = text.parse().unwrap_or(0),
                            }
                        }
                    }
                    "d:status" | "d:collection" => {}
                    _ if stack.iter().any(|s| s == "d:prop") => {
                        resp.props.insert(element.clone(), text);
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                let key = qualified_key(e.name())?;
                stack.pop();
                match key.as_str() {
                    "d:response" => {
                        if let Some(resp) = current.take() {
                            if !resp.href.is_empty() {
                                responses.push(resp);
                            }
                        }
                    }
                    "nc:download-limit" => {
                        if let (Some(limit), Some(resp)) = (pending_limit.take(), current.as_mut())
                        {
                            resp.download_limits.push(limit);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ClientError::xml(format!("XML parsing error: {}", e))),
            _ => {}
        }

        buf.clear();
    }

    Ok(responses)
}

fn percent_decode(component: &str) -> String {
    urlencoding::decode(component)
        .map(|cow| cow.to_string())
        .unwrap_or_else(|_| component.to_string())
}

/// Legacy server encodings send booleans as free-form strings; anything
/// non-empty that isn't "0" or "false" counts as true.
fn parse_truthy(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    !(value.is_empty() || value == "0" || value == "false")
}

fn parse_epoch_seconds(value: &str) -> Option<DateTime<Utc>> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|secs| *secs > 0)
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

pub fn parse_http_date(date_str: &str) -> Option<DateTime<Utc>> {
    if date_str.is_empty() {
        return None;
    }

    DateTime::parse_from_rfc2822(date_str)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            DateTime::parse_from_rfc3339(date_str)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(date_str, "%a, %d %b %Y %H:%M:%S GMT")
                .ok()
                .map(|ndt| DateTime::from_naive_utc_and_offset(ndt, Utc))
        })
}

/// Hidden-file rule: a dot-prefixed path component excludes the item unless
/// one of its components appears in the allowlist. The allowlisted component
/// rescues the item even when sibling components are also dot-prefixed.
fn is_visible(components: &[String], show_hidden: bool, allowlist: &[String]) -> bool {
    if show_hidden {
        return true;
    }
    let hidden = components.iter().any(|c| c.starts_with('.'));
    if !hidden {
        return true;
    }
    !allowlist.is_empty() && components.iter().any(|c| allowlist.contains(c))
}

fn strip_surrounding_quotes(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}

/// Parse a PROPFIND/REPORT/SEARCH multistatus body into file entries.
///
/// The only hard precondition is a resolvable base URL: when no host can be
/// derived from the session's server URL the call returns an empty list.
/// Malformed individual property values degrade to defaults; only XML that
/// is not well-formed fails the whole call.
pub fn parse_file_listing(
    xml_text: &str,
    config: &SessionConfig,
    options: &ListingOptions,
    registry: &TypeRegistry,
) -> Result<Vec<FileEntry>, ClientError> {
    // A host-less base URL is the sole hard precondition failure here.
    match Url::parse(config.server_url_trimmed()) {
        Ok(url) if url.host_str().is_some() => {}
        _ => {
            warn!(
                "Cannot derive host from base URL '{}', returning empty listing",
                config.server_url
            );
            return Ok(Vec::new());
        }
    }
    let base_url = config.server_url_trimmed();

    let files_root = config.files_root();
    let responses = collect_responses(xml_text)?;
    let mut entries = Vec::with_capacity(responses.len());

    for raw in responses {
        let canonical_href = raw.href.trim_end_matches('/');

        let components: Vec<String> = canonical_href
            .split('/')
            .filter(|c| !c.is_empty())
            .map(percent_decode)
            .collect();
        if !is_visible(&components, options.show_hidden, &options.hidden_allowlist) {
            debug!("Skipping hidden entry {}", raw.href);
            continue;
        }

        let (parent, leaf) = match canonical_href.rsplit_once('/') {
            Some(split) => split,
            None => continue,
        };

        let mut entry = FileEntry {
            path: format!("{}/", percent_decode(parent)),
            file_name: percent_decode(leaf),
            ..Default::default()
        };

        if canonical_href == files_root {
            // Listing root: caller-supplied label, server URL is the root
            // itself rather than derived from the parent path.
            entry.file_name = options.root_label.clone();
            entry.server_url = format!("{}{}", base_url, files_root);
        } else {
            entry.server_url = format!("{}{}", base_url, percent_decode(parent));
        }

        apply_file_props(&mut entry, &raw);

        let classification = classify(
            &entry.file_name,
            &entry.content_type,
            raw.is_collection,
            registry,
        );
        entry.directory = raw.is_collection;
        entry.content_type = classification.mime_type;
        entry.class_file = classification.class_file;
        entry.icon_name = classification.icon_name;
        entry.type_identifier = classification.type_identifier;
        entry.file_name_without_ext = classification.base_name;
        entry.extension = classification.extension;

        entry.base_url = config.server_url_trimmed().to_string();
        entry.user = config.username.clone();
        entry.user_id = config.user_id.clone();

        entries.push(entry);
    }

    link_live_photos(&mut entries);

    debug!("Parsed {} entries from multistatus listing", entries.len());
    Ok(entries)
}

/// Fixed property-to-field assignment table; a missing key leaves the
/// field's default untouched.
fn apply_file_props(entry: &mut FileEntry, raw: &RawResponse) {
    let props = &raw.props;

    if let Some(v) = props.get("oc:fileid") {
        entry.file_id = v.clone();
    }
    if let Some(v) = props.get("oc:id") {
        entry.oc_id = v.clone();
    }
    entry.etag = props
        .get("d:getetag")
        .map(|v| strip_surrounding_quotes(v))
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    if let Some(v) = props.get("d:getcontenttype") {
        entry.content_type = v.clone();
    }
    if !raw.is_collection {
        if let Some(v) = props.get("d:resourcetype") {
            entry.resource_type = v.clone();
        }
    }
    if let Some(v) = props.get("d:getlastmodified") {
        entry.date = parse_http_date(v);
    }
    if let Some(v) = props.get("nc:creation_time") {
        entry.creation_date = parse_epoch_seconds(v);
    }
    if let Some(v) = props.get("nc:upload_time") {
        entry.upload_date = parse_epoch_seconds(v);
    }
    entry.size = props
        .get("oc:size")
        .or_else(|| props.get("d:getcontentlength"))
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0);
    if let Some(v) = props.get("oc:permissions") {
        entry.permissions = v.clone();
    }
    if let Some(v) = props.get("oc:favorite") {
        entry.favorite = parse_truthy(v);
    }
    if let Some(v) = props.get("oc:owner-id") {
        entry.owner_id = v.clone();
    }
    if let Some(v) = props.get("oc:owner-display-name") {
        entry.owner_display_name = v.clone();
    }
    if let Some(v) = props.get("nc:is-encrypted") {
        entry.e2e_encrypted = parse_truthy(v);
    }
    if let Some(v) = props.get("nc:has-preview") {
        entry.has_preview = parse_truthy(v);
    }
    if let Some(v) = props.get("nc:hidden") {
        entry.hidden = parse_truthy(v);
    }
    if let Some(v) = props.get("nc:mount-type") {
        entry.mount_type = v.clone();
    }
    if let Some(v) = props.get("nc:rich-workspace") {
        entry.rich_workspace = Some(v.clone());
    }
    if let Some(v) = props.get("nc:note") {
        entry.note = v.clone();
    }
    // Servers nest the value as <oc:checksums><oc:checksum>..</oc:checksum>;
    // accept the nested shape as well as a flat one.
    if let Some(v) = props
        .get("oc:checksum")
        .or_else(|| props.get("oc:checksums"))
    {
        entry.checksums = v.clone();
    }
    if let Some(v) = props.get("oc:data-fingerprint") {
        entry.data_fingerprint = v.clone();
    }
    entry.quota_used_bytes = props
        .get("d:quota-used-bytes")
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0);
    entry.quota_available_bytes = props
        .get("d:quota-available-bytes")
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0);
    // The two sharing extensions use the same local name in different
    // namespaces: oc: carries the collaboration bitmask, ocs: the
    // cloud-mesh payload.
    entry.share_permissions_collaboration = props
        .get("oc:share-permissions")
        .and_then(|v| v.trim().parse().ok());
    entry.share_permissions_cloud_mesh = props.get("ocs:share-permissions").cloned();
    if let Some(v) = props.get("nc:metadata-photos-gps") {
        entry.metadata_gps = serde_json::from_str(v).ok();
    }
    if let Some(v) = props.get("nc:metadata-photos-exif") {
        entry.metadata_photos = serde_json::from_str(v).ok();
    }

    entry.share_types = raw.share_types.clone();
    entry.tags = raw.tags.clone();
    entry.download_limits = raw.download_limits.clone();

    // Lock fields exist only when the lock flag is present and positive.
    let locked = props
        .get("nc:lock")
        .and_then(|v| v.trim().parse::<i64>().ok())
        .map(|v| v > 0)
        .unwrap_or(false);
    if locked {
        let lock_time = props.get("nc:lock-time").and_then(|v| parse_epoch_seconds(v));
        // The server sends a relative timeout; the absolute expiry is
        // lock_time + timeout, None meaning the lock never expires.
        let timeout = match (
            lock_time,
            props
                .get("nc:lock-timeout")
                .and_then(|v| v.trim().parse::<i64>().ok()),
        ) {
            (Some(time), Some(seconds)) => Some(time + chrono::Duration::seconds(seconds)),
            _ => None,
        };
        entry.lock = Some(FileLock {
            owner: props.get("nc:lock-owner").cloned().unwrap_or_default(),
            owner_display_name: props
                .get("nc:lock-owner-displayname")
                .cloned()
                .unwrap_or_default(),
            owner_type: LockOwnerType::from_raw(
                props
                    .get("nc:lock-owner-type")
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(0),
            ),
            owner_editor: props
                .get("nc:lock-owner-editor")
                .cloned()
                .unwrap_or_default(),
            time: lock_time,
            timeout,
        });
    }
}

/// Pair adjacent image/video entries sharing a base name into live photos.
///
/// Greedy single pass over the `(server_url, base_name, class_file)` sort
/// order; with three or more same-named candidates only the first adjacent
/// image/video pair is linked. Callers depend on this first-match-wins
/// behavior, so it is not a full partition.
fn link_live_photos(entries: &mut [FileEntry]) {
    let mut order: Vec<usize> = (0..entries.len()).collect();
    order.sort_by(|&a, &b| {
        let ka = (
            &entries[a].server_url,
            &entries[a].file_name_without_ext,
            entries[a].class_file.as_str(),
        );
        let kb = (
            &entries[b].server_url,
            &entries[b].file_name_without_ext,
            entries[b].class_file.as_str(),
        );
        ka.cmp(&kb)
    });

    for window in 0..order.len().saturating_sub(1) {
        let i = order[window];
        let j = order[window + 1];
        let matched = {
            let first = &entries[i];
            let second = &entries[j];
            !first.directory
                && !second.directory
                && first.live_photo_file.is_empty()
                && second.live_photo_file.is_empty()
                && first.file_name_without_ext == second.file_name_without_ext
                && first.class_file == ClassFile::Image
                && second.class_file == ClassFile::Video
        };
        if matched {
            let image_id = entries[i].file_id.clone();
            let video_id = entries[j].file_id.clone();
            entries[i].live_photo_file = video_id;
            entries[j].live_photo_file = image_id;
        }
    }
}

/// Parse a trash-bin multistatus listing.
pub fn parse_trash_listing(
    xml_text: &str,
    registry: &TypeRegistry,
) -> Result<Vec<TrashEntry>, ClientError> {
    let responses = collect_responses(xml_text)?;
    let mut entries = Vec::with_capacity(responses.len());

    for raw in responses {
        let canonical_href = raw.href.trim_end_matches('/');
        let leaf = canonical_href.rsplit('/').next().unwrap_or_default();

        let mut entry = TrashEntry {
            trash_path: raw.href.clone(),
            file_name: raw
                .props
                .get("nc:trashbin-filename")
                .cloned()
                .unwrap_or_else(|| percent_decode(leaf)),
            original_location: raw
                .props
                .get("nc:trashbin-original-location")
                .map(|v| percent_decode(v))
                .unwrap_or_default(),
            deletion_time: raw
                .props
                .get("nc:trashbin-deletion-time")
                .and_then(|v| parse_epoch_seconds(v)),
            file_id: raw.props.get("oc:fileid").cloned().unwrap_or_default(),
            size: raw
                .props
                .get("oc:size")
                .or_else(|| raw.props.get("d:getcontentlength"))
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0),
            directory: raw.is_collection,
            ..Default::default()
        };

        let server_type = raw
            .props
            .get("d:getcontenttype")
            .cloned()
            .unwrap_or_default();
        let classification = classify(&entry.file_name, &server_type, raw.is_collection, registry);
        entry.content_type = classification.mime_type;
        entry.class_file = classification.class_file;
        entry.icon_name = classification.icon_name;

        entries.push(entry);
    }

    Ok(entries)
}

/// Parse a comments multistatus listing.
pub fn parse_comments(xml_text: &str) -> Result<Vec<CommentEntry>, ClientError> {
    let responses = collect_responses(xml_text)?;
    let mut comments = Vec::with_capacity(responses.len());

    for raw in responses {
        let props = &raw.props;
        // The comments endpoint lists the collection itself first; skip
        // responses without a message id.
        let Some(message_id) = props.get("oc:id") else { continue };

        comments.push(CommentEntry {
            message_id: message_id.clone(),
            actor_id: props.get("oc:actorId").cloned().unwrap_or_default(),
            actor_type: props.get("oc:actorType").cloned().unwrap_or_default(),
            actor_display_name: props
                .get("oc:actorDisplayName")
                .cloned()
                .unwrap_or_default(),
            message: props.get("oc:message").cloned().unwrap_or_default(),
            verb: props.get("oc:verb").cloned().unwrap_or_default(),
            creation_date: props
                .get("oc:creationDateTime")
                .and_then(|v| parse_http_date(v)),
            is_unread: props
                .get("oc:isUnread")
                .map(|v| parse_truthy(v))
                .unwrap_or(false),
            object_id: props.get("oc:objectId").cloned().unwrap_or_default(),
            object_type: props.get("oc:objectType").cloned().unwrap_or_default(),
        });
    }

    Ok(comments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SessionConfig {
        SessionConfig::new("https://cloud.example.com", "alice", "alice", "secret").unwrap()
    }

    fn options() -> ListingOptions {
        ListingOptions {
            show_hidden: true,
            ..Default::default()
        }
    }

    fn wrap_multistatus(responses: &str) -> String {
        format!(
            r#"<?xml version="1.0"?>
            <d:multistatus xmlns:d="DAV:" xmlns:s="http://sabredav.org/ns"
                           xmlns:oc="http://owncloud.org/ns" xmlns:nc="http://nextcloud.org/ns"
                           xmlns:ocs="http://open-collaboration-services.org/ns">
                {}
            </d:multistatus>"#,
            responses
        )
    }

    fn file_response(href: &str, props: &str) -> String {
        format!(
            r#"<d:response>
                <d:href>{}</d:href>
                <d:propstat>
                    <d:prop>
                        {}
                        <d:resourcetype/>
                    </d:prop>
                    <d:status>HTTP/1.1 200 OK</d:status>
                </d:propstat>
            </d:response>"#,
            href, props
        )
    }

    fn dir_response(href: &str, props: &str) -> String {
        format!(
            r#"<d:response>
                <d:href>{}</d:href>
                <d:propstat>
                    <d:prop>
                        {}
                        <d:resourcetype><d:collection/></d:resourcetype>
                    </d:prop>
                    <d:status>HTTP/1.1 200 OK</d:status>
                </d:propstat>
            </d:response>"#,
            href, props
        )
    }

    #[test]
    fn test_directory_and_file_scenario() {
        let xml = wrap_multistatus(&format!(
            "{}{}",
            dir_response("/remote.php/dav/files/alice/Photos/", "<oc:fileid>10</oc:fileid>"),
            file_response(
                "/remote.php/dav/files/alice/Photos/a.jpg",
                r#"<oc:fileid>11</oc:fileid>
                   <d:getcontentlength>1024</d:getcontentlength>
                   <d:getcontenttype>image/jpeg</d:getcontenttype>
                   <oc:favorite>1</oc:favorite>"#
            ),
        ));

        let entries =
            parse_file_listing(&xml, &session(), &options(), &TypeRegistry::new()).unwrap();
        assert_eq!(entries.len(), 2);

        let dir = &entries[0];
        assert!(dir.directory);
        assert_eq!(dir.class_file, ClassFile::Directory);
        assert_eq!(dir.content_type, "httpd/unix-directory");

        let file = &entries[1];
        assert_eq!(file.file_name, "a.jpg");
        assert_eq!(file.size, 1024);
        assert!(file.favorite);
        assert_eq!(file.class_file, ClassFile::Image);
        assert_eq!(file.server_url, "https://cloud.example.com/remote.php/dav/files/alice/Photos");
        assert_eq!(file.user, "alice");
    }

    #[test]
    fn test_directory_overrides_literal_content_type() {
        let xml = wrap_multistatus(&dir_response(
            "/remote.php/dav/files/alice/Odd/",
            "<d:getcontenttype>application/zip</d:getcontenttype>",
        ));
        let entries =
            parse_file_listing(&xml, &session(), &options(), &TypeRegistry::new()).unwrap();
        assert!(entries[0].directory);
        assert_eq!(entries[0].content_type, "httpd/unix-directory");
    }

    #[test]
    fn test_hidden_entries_filtered() {
        let xml = wrap_multistatus(&format!(
            "{}{}",
            file_response("/remote.php/dav/files/alice/.config/state.json", ""),
            file_response("/remote.php/dav/files/alice/visible.txt", ""),
        ));

        let opts = ListingOptions {
            show_hidden: false,
            ..Default::default()
        };
        let entries = parse_file_listing(&xml, &session(), &opts, &TypeRegistry::new()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_name, "visible.txt");
    }

    #[test]
    fn test_allowlist_rescues_hidden_entry() {
        // The allowlisted component rescues the item even though a sibling
        // component is also dot-prefixed.
        let xml = wrap_multistatus(&file_response(
            "/remote.php/dav/files/alice/.hidden/Keep/file.txt",
            "",
        ));

        let mut opts = ListingOptions {
            show_hidden: false,
            ..Default::default()
        };
        let dropped = parse_file_listing(&xml, &session(), &opts, &TypeRegistry::new()).unwrap();
        assert!(dropped.is_empty());

        opts.hidden_allowlist = vec!["Keep".to_string()];
        let kept = parse_file_listing(&xml, &session(), &opts, &TypeRegistry::new()).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].file_name, "file.txt");
    }

    #[test]
    fn test_root_relabeling() {
        let xml = wrap_multistatus(&dir_response("/remote.php/dav/files/alice/", ""));
        let entries =
            parse_file_listing(&xml, &session(), &options(), &TypeRegistry::new()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_name, ".");
        assert_eq!(
            entries[0].server_url,
            "https://cloud.example.com/remote.php/dav/files/alice"
        );
    }

    #[test]
    fn test_unresolvable_base_url_yields_empty_list() {
        let mut config = session();
        config.server_url = "https://".to_string();
        let xml = wrap_multistatus(&file_response("/remote.php/dav/files/alice/a.txt", ""));
        let entries =
            parse_file_listing(&xml, &config, &options(), &TypeRegistry::new()).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        let result = parse_file_listing(
            "<d:multistatus><unterminated",
            &session(),
            &options(),
            &TypeRegistry::new(),
        );
        assert!(matches!(result, Err(ClientError::Xml(_))));
    }

    #[test]
    fn test_boolean_coercion() {
        for (value, expected) in [
            ("1", true),
            ("true", true),
            ("yes", true),
            ("", false),
            ("0", false),
            ("false", false),
        ] {
            assert_eq!(parse_truthy(value), expected, "value {:?}", value);
        }

        let xml = wrap_multistatus(&file_response(
            "/remote.php/dav/files/alice/a.txt",
            r#"<oc:favorite>yes</oc:favorite>
               <nc:is-encrypted>0</nc:is-encrypted>
               <nc:has-preview>true</nc:has-preview>"#,
        ));
        let entries =
            parse_file_listing(&xml, &session(), &options(), &TypeRegistry::new()).unwrap();
        assert!(entries[0].favorite);
        assert!(!entries[0].e2e_encrypted);
        assert!(entries[0].has_preview);
    }

    #[test]
    fn test_lock_timeout_derivation() {
        let xml = wrap_multistatus(&file_response(
            "/remote.php/dav/files/alice/locked.docx",
            r#"<nc:lock>1</nc:lock>
               <nc:lock-owner>bob</nc:lock-owner>
               <nc:lock-owner-displayname>Bob</nc:lock-owner-displayname>
               <nc:lock-owner-type>1</nc:lock-owner-type>
               <nc:lock-owner-editor>text</nc:lock-owner-editor>
               <nc:lock-time>1700000000</nc:lock-time>
               <nc:lock-timeout>1800</nc:lock-timeout>"#,
        ));
        let entries =
            parse_file_listing(&xml, &session(), &options(), &TypeRegistry::new()).unwrap();
        let lock = entries[0].lock.as_ref().expect("lock should be populated");
        assert_eq!(lock.owner, "bob");
        assert_eq!(lock.owner_type, LockOwnerType::App);
        assert_eq!(
            lock.timeout.unwrap().timestamp(),
            1_700_000_000 + 1800
        );

        // Missing relative timeout means the lock never expires.
        let xml = wrap_multistatus(&file_response(
            "/remote.php/dav/files/alice/locked.docx",
            r#"<nc:lock>1</nc:lock>
               <nc:lock-time>1700000000</nc:lock-time>"#,
        ));
        let entries =
            parse_file_listing(&xml, &session(), &options(), &TypeRegistry::new()).unwrap();
        assert!(entries[0].lock.as_ref().unwrap().timeout.is_none());
    }

    #[test]
    fn test_lock_flag_zero_leaves_no_lock() {
        let xml = wrap_multistatus(&file_response(
            "/remote.php/dav/files/alice/free.docx",
            r#"<nc:lock>0</nc:lock>
               <nc:lock-owner>bob</nc:lock-owner>"#,
        ));
        let entries =
            parse_file_listing(&xml, &session(), &options(), &TypeRegistry::new()).unwrap();
        assert!(entries[0].lock.is_none());
    }

    #[test]
    fn test_share_permission_namespaces_kept_apart() {
        let xml = wrap_multistatus(&file_response(
            "/remote.php/dav/files/alice/shared.txt",
            r#"<oc:share-permissions>19</oc:share-permissions>
               <ocs:share-permissions>{"federated":true}</ocs:share-permissions>"#,
        ));
        let entries =
            parse_file_listing(&xml, &session(), &options(), &TypeRegistry::new()).unwrap();
        assert_eq!(entries[0].share_permissions_collaboration, Some(19));
        assert_eq!(
            entries[0].share_permissions_cloud_mesh.as_deref(),
            Some(r#"{"federated":true}"#)
        );
    }

    #[test]
    fn test_live_photo_pairing() {
        let xml = wrap_multistatus(&format!(
            "{}{}{}",
            file_response(
                "/remote.php/dav/files/alice/Photos/IMG_001.jpg",
                r#"<oc:fileid>100</oc:fileid>
                   <d:getcontenttype>image/jpeg</d:getcontenttype>"#
            ),
            file_response(
                "/remote.php/dav/files/alice/Photos/IMG_001.mov",
                r#"<oc:fileid>101</oc:fileid>
                   <d:getcontenttype>video/quicktime</d:getcontenttype>"#
            ),
            file_response(
                "/remote.php/dav/files/alice/Photos/IMG_002.jpg",
                r#"<oc:fileid>102</oc:fileid>
                   <d:getcontenttype>image/jpeg</d:getcontenttype>"#
            ),
        ));

        let entries =
            parse_file_listing(&xml, &session(), &options(), &TypeRegistry::new()).unwrap();
        let by_id = |id: &str| entries.iter().find(|e| e.file_id == id).unwrap();
        assert_eq!(by_id("100").live_photo_file, "101");
        assert_eq!(by_id("101").live_photo_file, "100");
        // Lone image without a matching video stays unpaired.
        assert_eq!(by_id("102").live_photo_file, "");
    }

    #[test]
    fn test_live_photo_first_match_wins() {
        // Two images and one video share a base name: only the first
        // adjacent image/video pair in sort order is linked.
        let mut entries = vec![
            FileEntry {
                file_id: "1".into(),
                server_url: "https://c/s".into(),
                file_name_without_ext: "IMG".into(),
                class_file: ClassFile::Image,
                extension: "heic".into(),
                ..Default::default()
            },
            FileEntry {
                file_id: "2".into(),
                server_url: "https://c/s".into(),
                file_name_without_ext: "IMG".into(),
                class_file: ClassFile::Image,
                extension: "jpg".into(),
                ..Default::default()
            },
            FileEntry {
                file_id: "3".into(),
                server_url: "https://c/s".into(),
                file_name_without_ext: "IMG".into(),
                class_file: ClassFile::Video,
                extension: "mov".into(),
                ..Default::default()
            },
        ];
        link_live_photos(&mut entries);
        let linked: Vec<_> = entries
            .iter()
            .filter(|e| !e.live_photo_file.is_empty())
            .collect();
        assert_eq!(linked.len(), 2);
        // Exactly one image stays unpaired.
        assert!(entries
            .iter()
            .any(|e| e.class_file == ClassFile::Image && e.live_photo_file.is_empty()));
    }

    #[test]
    fn test_directories_never_pair() {
        let mut entries = vec![
            FileEntry {
                file_id: "1".into(),
                file_name_without_ext: "IMG".into(),
                class_file: ClassFile::Image,
                directory: true,
                ..Default::default()
            },
            FileEntry {
                file_id: "2".into(),
                file_name_without_ext: "IMG".into(),
                class_file: ClassFile::Video,
                ..Default::default()
            },
        ];
        link_live_photos(&mut entries);
        assert!(entries.iter().all(|e| e.live_photo_file.is_empty()));
    }

    #[test]
    fn test_url_encoded_names_decoded() {
        let xml = wrap_multistatus(&file_response(
            "/remote.php/dav/files/alice/My%20Folder/File%20with%20spaces.pdf",
            "",
        ));
        let entries =
            parse_file_listing(&xml, &session(), &options(), &TypeRegistry::new()).unwrap();
        assert_eq!(entries[0].file_name, "File with spaces.pdf");
        assert_eq!(entries[0].path, "/remote.php/dav/files/alice/My Folder/");
    }

    #[test]
    fn test_share_types_and_tags_collected() {
        let xml = wrap_multistatus(&file_response(
            "/remote.php/dav/files/alice/shared.txt",
            r#"<oc:share-types>
                   <oc:share-type>0</oc:share-type>
                   <oc:share-type>3</oc:share-type>
               </oc:share-types>
               <nc:system-tags>
                   <nc:system-tag>invoices</nc:system-tag>
               </nc:system-tags>"#,
        ));
        let entries =
            parse_file_listing(&xml, &session(), &options(), &TypeRegistry::new()).unwrap();
        assert_eq!(entries[0].share_types, vec![0, 3]);
        assert_eq!(entries[0].tags, vec!["invoices".to_string()]);
    }

    #[test]
    fn test_nested_checksum_captured() {
        let xml = wrap_multistatus(&file_response(
            "/remote.php/dav/files/alice/report.pdf",
            r#"<oc:checksums>
                   <oc:checksum>SHA1:AAFE3B</oc:checksum>
               </oc:checksums>"#,
        ));
        let entries =
            parse_file_listing(&xml, &session(), &options(), &TypeRegistry::new()).unwrap();
        assert_eq!(entries[0].checksums, "SHA1:AAFE3B");
    }

    #[test]
    fn test_download_limit_sub_entries() {
        let xml = wrap_multistatus(&file_response(
            "/remote.php/dav/files/alice/shared.txt",
            r#"<nc:download-limits>
                   <nc:download-limit>
                       <nc:token>AbCdEf</nc:token>
                       <nc:limit>5</nc:limit>
                       <nc:count>2</nc:count>
                   </nc:download-limit>
               </nc:download-limits>"#,
        ));
        let entries =
            parse_file_listing(&xml, &session(), &options(), &TypeRegistry::new()).unwrap();
        assert_eq!(entries[0].download_limits.len(), 1);
        let limit = &entries[0].download_limits[0];
        assert_eq!(limit.token, "AbCdEf");
        assert_eq!(limit.limit, 5);
        assert_eq!(limit.count, 2);
    }

    #[test]
    fn test_trash_listing() {
        let xml = wrap_multistatus(&format!(
            r#"<d:response>
                <d:href>/remote.php/dav/trashbin/alice/trash/report.pdf.d1700000000</d:href>
                <d:propstat>
                    <d:prop>
                        <oc:fileid>55</oc:fileid>
                        <nc:trashbin-filename>report.pdf</nc:trashbin-filename>
                        <nc:trashbin-original-location>Documents/report.pdf</nc:trashbin-original-location>
                        <nc:trashbin-deletion-time>1700000000</nc:trashbin-deletion-time>
                        <oc:size>2048</oc:size>
                        <d:resourcetype/>
                    </d:prop>
                    <d:status>HTTP/1.1 200 OK</d:status>
                </d:propstat>
            </d:response>"#
        ));

        let entries = parse_trash_listing(&xml, &TypeRegistry::new()).unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.file_name, "report.pdf");
        assert_eq!(entry.original_location, "Documents/report.pdf");
        assert_eq!(entry.deletion_time.unwrap().timestamp(), 1_700_000_000);
        assert_eq!(entry.size, 2048);
        assert_eq!(entry.class_file, ClassFile::Document);
    }

    #[test]
    fn test_comments_listing() {
        let xml = wrap_multistatus(
            r#"<d:response>
                <d:href>/remote.php/dav/comments/files/55/</d:href>
                <d:propstat><d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop>
                <d:status>HTTP/1.1 200 OK</d:status></d:propstat>
            </d:response>
            <d:response>
                <d:href>/remote.php/dav/comments/files/55/7</d:href>
                <d:propstat>
                    <d:prop>
                        <oc:id>7</oc:id>
                        <oc:actorId>bob</oc:actorId>
                        <oc:actorType>users</oc:actorType>
                        <oc:actorDisplayName>Bob</oc:actorDisplayName>
                        <oc:message>Looks good</oc:message>
                        <oc:verb>comment</oc:verb>
                        <oc:creationDateTime>Mon, 01 Jan 2024 12:00:00 GMT</oc:creationDateTime>
                        <oc:isUnread>true</oc:isUnread>
                        <oc:objectId>55</oc:objectId>
                        <oc:objectType>files</oc:objectType>
                    </d:prop>
                    <d:status>HTTP/1.1 200 OK</d:status>
                </d:propstat>
            </d:response>"#,
        );

        let comments = parse_comments(&xml).unwrap();
        assert_eq!(comments.len(), 1);
        let comment = &comments[0];
        assert_eq!(comment.message_id, "7");
        assert_eq!(comment.actor_display_name, "Bob");
        assert!(comment.is_unread);
        assert!(comment.creation_date.is_some());
    }

    #[test]
    fn test_http_date_formats() {
        assert!(parse_http_date("Mon, 01 Jan 2024 12:00:00 GMT").is_some());
        assert!(parse_http_date("2024-01-01T12:00:00Z").is_some());
        assert!(parse_http_date("").is_none());
        assert!(parse_http_date("not a date").is_none());
    }
}
