use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Semantic class of a listed resource, derived by the type classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassFile {
    Image,
    Video,
    Audio,
    Document,
    Archive,
    Directory,
    Unknown,
}

impl ClassFile {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassFile::Image => "image",
            ClassFile::Video => "video",
            ClassFile::Audio => "audio",
            ClassFile::Document => "document",
            ClassFile::Archive => "archive",
            ClassFile::Directory => "directory",
            ClassFile::Unknown => "unknown",
        }
    }
}

impl Default for ClassFile {
    fn default() -> Self {
        ClassFile::Unknown
    }
}

impl std::fmt::Display for ClassFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// WebDAV Depth header value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    Zero,
    One,
    Infinity,
}

impl Depth {
    pub fn as_str(self) -> &'static str {
        match self {
            Depth::Zero => "0",
            Depth::One => "1",
            Depth::Infinity => "infinity",
        }
    }
}

/// Who holds a WebDAV lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockOwnerType {
    User,
    App,
    Token,
}

impl LockOwnerType {
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            1 => LockOwnerType::App,
            2 => LockOwnerType::Token,
            _ => LockOwnerType::User,
        }
    }
}

impl Default for LockOwnerType {
    fn default() -> Self {
        LockOwnerType::User
    }
}

/// Lock descriptor attached to a locked file.
///
/// `timeout` is the absolute instant the lock expires, derived from the
/// server's relative timeout; `None` means the lock never expires.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileLock {
    pub owner: String,
    pub owner_display_name: String,
    pub owner_type: LockOwnerType,
    pub owner_editor: String,
    pub time: Option<DateTime<Utc>>,
    pub timeout: Option<DateTime<Utc>>,
}

/// Per-link download limit reported for a shared file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadLimit {
    pub token: String,
    pub limit: i64,
    pub count: i64,
}

/// One resource from a WebDAV multistatus listing.
///
/// Entries are value records built fresh by a single parse call; the only
/// mutation after construction is the live-photo reconciliation pass, which
/// links paired image/video entries by `file_id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileEntry {
    /// Server-assigned numeric id, stable across renames.
    pub file_id: String,
    /// Opaque instance-qualified id.
    pub oc_id: String,
    pub etag: String,
    /// Parent directory path, percent-decoded, trailing slash retained.
    pub path: String,
    /// Leaf name, percent-decoded.
    pub file_name: String,
    /// Leaf name with the extension stripped.
    pub file_name_without_ext: String,
    /// Absolute URL of the parent collection.
    pub server_url: String,
    pub content_type: String,
    pub class_file: ClassFile,
    pub icon_name: String,
    pub type_identifier: String,
    pub extension: String,
    pub directory: bool,
    /// Literal resourcetype text for non-collection custom resource types.
    pub resource_type: String,
    pub size: i64,
    /// Last-modified instant.
    pub date: Option<DateTime<Utc>>,
    pub creation_date: Option<DateTime<Utc>>,
    pub upload_date: Option<DateTime<Utc>>,
    pub favorite: bool,
    pub has_preview: bool,
    pub hidden: bool,
    pub e2e_encrypted: bool,
    /// Raw permission string as sent by the server (e.g. "RGDNVW").
    pub permissions: String,
    pub checksums: String,
    pub data_fingerprint: String,
    pub owner_id: String,
    pub owner_display_name: String,
    pub mount_type: String,
    pub note: String,
    pub rich_workspace: Option<String>,
    pub lock: Option<FileLock>,
    pub share_types: Vec<i32>,
    /// Collaboration share permissions (oc namespace).
    pub share_permissions_collaboration: Option<i32>,
    /// Cloud-mesh share permissions (ocs namespace), serialized as sent.
    pub share_permissions_cloud_mesh: Option<String>,
    pub tags: Vec<String>,
    pub download_limits: Vec<DownloadLimit>,
    pub quota_used_bytes: i64,
    pub quota_available_bytes: i64,
    /// Photo GPS metadata blob, passed through verbatim.
    pub metadata_gps: Option<serde_json::Value>,
    /// Photo EXIF/size metadata blob, passed through verbatim.
    pub metadata_photos: Option<serde_json::Value>,
    /// Paired live-photo partner's `file_id`; empty when unpaired.
    pub live_photo_file: String,
    // Stamped from the invoking session, not from per-item server data.
    pub base_url: String,
    pub user: String,
    pub user_id: String,
}

/// One resource from the trash-bin listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrashEntry {
    pub trash_path: String,
    pub file_id: String,
    /// Name the file had before deletion.
    pub file_name: String,
    /// Path the file had before deletion, relative to the files root.
    pub original_location: String,
    pub deletion_time: Option<DateTime<Utc>>,
    pub directory: bool,
    pub content_type: String,
    pub class_file: ClassFile,
    pub icon_name: String,
    pub size: i64,
}

/// One comment attached to a file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentEntry {
    pub message_id: String,
    pub actor_id: String,
    pub actor_type: String,
    pub actor_display_name: String,
    pub message: String,
    pub verb: String,
    pub creation_date: Option<DateTime<Utc>>,
    pub is_unread: bool,
    pub object_id: String,
    pub object_type: String,
}

/// Recipient category of a share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShareType {
    User,
    Group,
    PublicLink,
    Email,
    FederatedCloud,
    Circle,
    TalkConversation,
    Other(i32),
}

impl ShareType {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => ShareType::User,
            1 => ShareType::Group,
            3 => ShareType::PublicLink,
            4 => ShareType::Email,
            6 => ShareType::FederatedCloud,
            7 => ShareType::Circle,
            10 => ShareType::TalkConversation,
            other => ShareType::Other(other),
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            ShareType::User => 0,
            ShareType::Group => 1,
            ShareType::PublicLink => 3,
            ShareType::Email => 4,
            ShareType::FederatedCloud => 6,
            ShareType::Circle => 7,
            ShareType::TalkConversation => 10,
            ShareType::Other(other) => other,
        }
    }
}

impl Default for ShareType {
    fn default() -> Self {
        ShareType::User
    }
}

/// One share record from the OCS sharing API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShareEntry {
    pub id: i64,
    pub share_type: ShareType,
    pub path: String,
    pub item_type: String,
    /// OCS permission bitmask (1 read, 2 update, 4 create, 8 delete, 16 share).
    pub permissions: i32,
    pub password: Option<String>,
    pub expiration: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub label: Option<String>,
    pub uid_owner: String,
    pub displayname_owner: String,
    pub uid_file_owner: String,
    pub share_with: Option<String>,
    pub share_with_displayname: Option<String>,
    pub token: Option<String>,
    pub url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Fields for creating a new share.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateShareRequest {
    pub path: String,
    pub share_type: i32,
    pub share_with: Option<String>,
    pub permissions: Option<i32>,
    pub password: Option<String>,
    pub expire_date: Option<String>,
    pub note: Option<String>,
    pub label: Option<String>,
    pub public_upload: Option<bool>,
}

/// Fields for updating an existing share; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateShareRequest {
    pub permissions: Option<i32>,
    pub password: Option<String>,
    pub expire_date: Option<String>,
    pub note: Option<String>,
    pub label: Option<String>,
}

/// Outcome of a connectivity probe against the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionResult {
    pub success: bool,
    pub message: String,
    pub server_version: Option<String>,
    pub server_product: Option<String>,
}

/// Version/product pair reported by the capabilities endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerInfo {
    pub version: Option<String>,
    pub product: Option<String>,
}
