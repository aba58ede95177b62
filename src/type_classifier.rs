/// Semantic type classification for listed resources.
///
/// Maps a file name plus an optional server-provided MIME type to a semantic
/// class and icon tag. The server MIME type is never overridden when present;
/// it is only inferred (from the extension) when the caller passed an empty
/// string. Directory classification always wins regardless of any MIME type.
use std::collections::HashMap;

use tracing::debug;

use crate::models::ClassFile;

pub const DIRECTORY_MIME_TYPE: &str = "httpd/unix-directory";

/// Host-extensible table of custom type mappings, keyed by type identifier.
///
/// Extensions unknown to the MIME registry resolve to a synthetic
/// `x-ext/<extension>` identifier, so an application can claim them:
///
/// ```
/// use nimbusdav::type_classifier::TypeRegistry;
/// use nimbusdav::models::ClassFile;
///
/// let mut registry = TypeRegistry::new();
/// registry.add_internal_type("x-ext/gpx", ClassFile::Document, "file_location", "gpx track");
/// ```
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    entries: HashMap<String, RegisteredType>,
}

#[derive(Debug, Clone)]
pub struct RegisteredType {
    pub class_file: ClassFile,
    pub icon_name: String,
    pub name: String,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_internal_type(
        &mut self,
        type_identifier: impl Into<String>,
        class_file: ClassFile,
        icon_name: impl Into<String>,
        name: impl Into<String>,
    ) {
        self.entries.insert(
            type_identifier.into(),
            RegisteredType {
                class_file,
                icon_name: icon_name.into(),
                name: name.into(),
            },
        );
    }

    pub fn get_internal_type(&self, type_identifier: &str) -> Option<&RegisteredType> {
        self.entries.get(type_identifier)
    }
}

/// Output of a classification call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub mime_type: String,
    pub class_file: ClassFile,
    pub icon_name: String,
    pub type_identifier: String,
    pub type_name: String,
    pub base_name: String,
    pub extension: String,
}

/// Resolve a file name's extension to a type identifier.
///
/// Known extensions map to their canonical MIME type; unknown ones get a
/// synthetic `x-ext/` identifier so they stay addressable via the registry.
fn extension_to_type_identifier(extension: &str) -> Option<String> {
    if extension.is_empty() {
        return None;
    }
    mime_guess::from_ext(extension)
        .first()
        .map(|m| m.essence_str().to_string())
        .or_else(|| Some(format!("x-ext/{}", extension)))
}

fn split_base_and_extension(file_name: &str) -> (String, String) {
    match file_name.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() => (base.to_string(), ext.to_lowercase()),
        _ => (file_name.to_string(), String::new()),
    }
}

fn is_archive_identifier(identifier: &str) -> bool {
    matches!(
        identifier,
        "application/zip"
            | "application/x-zip-compressed"
            | "application/x-tar"
            | "application/gzip"
            | "application/x-gzip"
            | "application/x-7z-compressed"
            | "application/x-rar-compressed"
            | "application/vnd.rar"
            | "application/x-bzip2"
            | "application/x-xz"
    )
}

/// Office and generic text formats that classify as plain documents.
fn is_generic_document_identifier(identifier: &str) -> bool {
    identifier.starts_with("text/")
        || matches!(
            identifier,
            "application/msword"
                | "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
                | "application/vnd.ms-excel"
                | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
                | "application/vnd.ms-powerpoint"
                | "application/vnd.openxmlformats-officedocument.presentationml.presentation"
                | "application/vnd.oasis.opendocument.text"
                | "application/vnd.oasis.opendocument.spreadsheet"
                | "application/vnd.oasis.opendocument.presentation"
        )
}

/// Classify a resource from its name, MIME type, and directory flag.
pub fn classify(
    file_name: &str,
    mime_type: &str,
    is_directory: bool,
    registry: &TypeRegistry,
) -> Classification {
    let (base_name, mut extension) = split_base_and_extension(file_name);

    let type_identifier = extension_to_type_identifier(&extension)
        .or_else(|| {
            if mime_type.is_empty() {
                None
            } else {
                Some(mime_type.to_string())
            }
        })
        .unwrap_or_default();

    // The server's MIME type is authoritative when present. Synthetic
    // x-ext identifiers are registry keys, not MIME types, and must not
    // surface as one.
    let resolved_mime = if !mime_type.is_empty() {
        mime_type.to_string()
    } else if type_identifier.starts_with("x-ext/") {
        "application/octet-stream".to_string()
    } else {
        type_identifier.clone()
    };

    if is_directory {
        return Classification {
            mime_type: DIRECTORY_MIME_TYPE.to_string(),
            class_file: ClassFile::Directory,
            icon_name: "directory".to_string(),
            type_identifier: DIRECTORY_MIME_TYPE.to_string(),
            type_name: "directory".to_string(),
            base_name: file_name.to_string(),
            extension: String::new(),
        };
    }

    let (class_file, icon_name, type_name) = if type_identifier.starts_with("image/") {
        (ClassFile::Image, "file_image", "image")
    } else if type_identifier.starts_with("video/") {
        (ClassFile::Video, "file_video", "video")
    } else if type_identifier.starts_with("audio/") {
        (ClassFile::Audio, "file_audio", "audio")
    } else if is_archive_identifier(&type_identifier) {
        (ClassFile::Archive, "file_compress", "archive")
    } else if type_identifier == "text/html" {
        (ClassFile::Document, "file_code", "html")
    } else if type_identifier == "application/pdf" {
        (ClassFile::Document, "file_pdf", "pdf")
    } else if type_identifier == "application/rtf" || type_identifier == "text/rtf" {
        (ClassFile::Document, "file_txt", "rtf")
    } else if type_identifier == "text/plain" {
        if extension.is_empty() {
            extension = "txt".to_string();
        }
        (ClassFile::Document, "file_txt", "text")
    } else if is_generic_document_identifier(&type_identifier) {
        (ClassFile::Document, "file_document", "document")
    } else if let Some(registered) = registry.get_internal_type(&type_identifier) {
        debug!(
            "Classified {} via registered type {}",
            file_name, type_identifier
        );
        return Classification {
            mime_type: resolved_mime,
            class_file: registered.class_file,
            icon_name: registered.icon_name.clone(),
            type_identifier,
            type_name: registered.name.clone(),
            base_name,
            extension,
        };
    } else {
        (ClassFile::Unknown, "file", "unknown")
    };

    Classification {
        mime_type: resolved_mime,
        class_file,
        icon_name: icon_name.to_string(),
        type_identifier,
        type_name: type_name.to_string(),
        base_name,
        extension,
    }
}
