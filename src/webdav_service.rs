use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::{ListingOptions, RetryConfig, SessionConfig};
use crate::errors::ClientError;
use crate::models::{ClassFile, CommentEntry, ConnectionResult, Depth, FileEntry, TrashEntry};
use crate::type_classifier::TypeRegistry;
use crate::webdav_xml_parser::{parse_comments, parse_file_listing, parse_trash_listing};

/// Property set requested for every file listing; one fixed template per
/// operation, as the server ignores unknown properties.
const PROPFIND_BODY: &str = r#"<?xml version="1.0"?>
<d:propfind xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns" xmlns:nc="http://nextcloud.org/ns"
            xmlns:ocs="http://open-collaboration-services.org/ns">
    <d:prop>
        <d:getlastmodified/>
        <d:getetag/>
        <d:getcontenttype/>
        <d:getcontentlength/>
        <d:resourcetype/>
        <d:quota-used-bytes/>
        <d:quota-available-bytes/>
        <oc:id/>
        <oc:fileid/>
        <oc:size/>
        <oc:permissions/>
        <oc:favorite/>
        <oc:owner-id/>
        <oc:owner-display-name/>
        <oc:share-types/>
        <oc:share-permissions/>
        <ocs:share-permissions/>
        <oc:checksums/>
        <oc:data-fingerprint/>
        <nc:is-encrypted/>
        <nc:has-preview/>
        <nc:hidden/>
        <nc:mount-type/>
        <nc:rich-workspace/>
        <nc:note/>
        <nc:creation_time/>
        <nc:upload_time/>
        <nc:lock/>
        <nc:lock-owner/>
        <nc:lock-owner-displayname/>
        <nc:lock-owner-type/>
        <nc:lock-owner-editor/>
        <nc:lock-time/>
        <nc:lock-timeout/>
        <nc:system-tags/>
        <nc:metadata-photos-gps/>
        <nc:metadata-photos-exif/>
        <nc:download-limits/>
    </d:prop>
</d:propfind>"#;

const TRASH_PROPFIND_BODY: &str = r#"<?xml version="1.0"?>
<d:propfind xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns" xmlns:nc="http://nextcloud.org/ns">
    <d:prop>
        <d:getcontenttype/>
        <d:resourcetype/>
        <oc:fileid/>
        <oc:size/>
        <nc:trashbin-filename/>
        <nc:trashbin-original-location/>
        <nc:trashbin-deletion-time/>
    </d:prop>
</d:propfind>"#;

const COMMENTS_PROPFIND_BODY: &str = r#"<?xml version="1.0"?>
<d:propfind xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns">
    <d:prop>
        <oc:id/>
        <oc:verb/>
        <oc:actorType/>
        <oc:actorId/>
        <oc:actorDisplayName/>
        <oc:creationDateTime/>
        <oc:objectId/>
        <oc:objectType/>
        <oc:isUnread/>
        <oc:message/>
    </d:prop>
</d:propfind>"#;

const FAVORITES_REPORT_BODY: &str = r#"<?xml version="1.0"?>
<oc:filter-files xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns" xmlns:nc="http://nextcloud.org/ns">
    <d:prop>
        <d:getlastmodified/>
        <d:getetag/>
        <d:getcontenttype/>
        <d:getcontentlength/>
        <d:resourcetype/>
        <oc:id/>
        <oc:fileid/>
        <oc:size/>
        <oc:permissions/>
        <oc:favorite/>
        <nc:has-preview/>
    </d:prop>
    <oc:filter-rules>
        <oc:favorite>1</oc:favorite>
    </oc:filter-rules>
</oc:filter-files>"#;

fn dav_method(name: &'static str) -> Method {
    Method::from_bytes(name.as_bytes()).unwrap()
}

/// Async WebDAV client for one account session.
///
/// The service owns only HTTP plumbing; every response body is handed to the
/// synchronous parsers, so concurrent calls on independent inputs need no
/// coordination beyond what reqwest's pooled client already provides.
#[derive(Clone)]
pub struct WebDAVService {
    client: Client,
    config: SessionConfig,
    registry: TypeRegistry,
    retry_config: RetryConfig,
}

impl WebDAVService {
    pub fn new(config: SessionConfig) -> Result<Self, ClientError> {
        Self::new_with_retry(config, RetryConfig::default())
    }

    pub fn new_with_retry(
        config: SessionConfig,
        retry_config: RetryConfig,
    ) -> Result<Self, ClientError> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()?;

        info!("WebDAV files root: {}", config.files_root_url());

        Ok(Self {
            client,
            config,
            registry: TypeRegistry::new(),
            retry_config,
        })
    }

    /// Register an application-specific type mapping consulted by the
    /// classifier before entries fall through to unknown.
    pub fn register_internal_type(
        &mut self,
        type_identifier: impl Into<String>,
        class_file: ClassFile,
        icon_name: impl Into<String>,
        name: impl Into<String>,
    ) {
        self.registry
            .add_internal_type(type_identifier, class_file, icon_name, name);
    }

    pub fn session(&self) -> &SessionConfig {
        &self.config
    }

    async fn retry_with_backoff<T, F, Fut>(
        &self,
        operation_name: &str,
        operation: F,
    ) -> Result<T, ClientError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, ClientError>>,
    {
        let mut attempt = 0;
        let mut delay = self.retry_config.initial_delay_ms;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        info!("{} succeeded after {} retries", operation_name, attempt);
                    }
                    return Ok(result);
                }
                Err(err) => {
                    attempt += 1;

                    if attempt > self.retry_config.max_retries {
                        error!(
                            "{} failed after {} attempts: {}",
                            operation_name,
                            attempt - 1,
                            err
                        );
                        return Err(err);
                    }

                    if !err.is_retryable() {
                        error!("{} failed with non-retryable error: {}", operation_name, err);
                        return Err(err);
                    }

                    warn!(
                        "{} failed (attempt {}), retrying in {}ms: {}",
                        operation_name, attempt, delay, err
                    );

                    sleep(Duration::from_millis(delay)).await;

                    delay = ((delay as f64 * self.retry_config.backoff_multiplier) as u64)
                        .min(self.retry_config.max_delay_ms);
                }
            }
        }
    }

    /// Absolute URL for a path relative to the files root. Hrefs from prior
    /// listings already carry the DAV prefix and stay as-is to avoid double
    /// encoding.
    fn file_url(&self, path: &str) -> String {
        if path.starts_with(&self.config.dav_root) {
            format!("{}{}", self.config.server_url_trimmed(), path)
        } else {
            format!(
                "{}/{}",
                self.config.files_root_url(),
                path.trim_start_matches('/')
            )
        }
    }

    fn trash_root_url(&self) -> String {
        format!(
            "{}{}/trashbin/{}/trash",
            self.config.server_url_trimmed(),
            self.config.dav_root,
            self.config.user_id
        )
    }

    fn comments_url(&self, file_id: &str) -> String {
        format!(
            "{}{}/comments/files/{}",
            self.config.server_url_trimmed(),
            self.config.dav_root,
            file_id
        )
    }

    fn ensure_success(
        status: StatusCode,
        url: &str,
        operation: &str,
    ) -> Result<(), ClientError> {
        if status.is_success() {
            Ok(())
        } else {
            error!("{} failed with HTTP {} for {}", operation, status, url);
            Err(ClientError::status(status.as_u16(), url))
        }
    }

    pub async fn test_connection(&self) -> Result<ConnectionResult, ClientError> {
        let url = format!("{}/", self.config.files_root_url());
        info!("Testing WebDAV connection to {}", url);

        let response = self
            .client
            .request(dav_method("PROPFIND"), &url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header("Depth", "0")
            .header("Content-Type", "application/xml")
            .body(
                r#"<?xml version="1.0"?>
                <d:propfind xmlns:d="DAV:">
                    <d:prop>
                        <d:displayname/>
                    </d:prop>
                </d:propfind>"#,
            )
            .send()
            .await?;

        if response.status().is_success() {
            info!("WebDAV connection successful");
            let server_info = crate::ocs_service::OcsService::new(self.config.clone())?
                .server_info()
                .await
                .unwrap_or_default();
            Ok(ConnectionResult {
                success: true,
                message: format!(
                    "Successfully connected to {}",
                    server_info.product.as_deref().unwrap_or("WebDAV server")
                ),
                server_version: server_info.version,
                server_product: server_info.product,
            })
        } else {
            warn!(
                "WebDAV connection failed with status {} for {}",
                response.status(),
                url
            );
            Ok(ConnectionResult {
                success: false,
                message: format!("Connection failed: HTTP {} for {}", response.status(), url),
                server_version: None,
                server_product: None,
            })
        }
    }

    /// List a folder below the files root.
    pub async fn read_folder(
        &self,
        folder_path: &str,
        options: &ListingOptions,
    ) -> Result<Vec<FileEntry>, ClientError> {
        self.retry_with_backoff("read_folder", || {
            self.read_folder_impl(folder_path, options)
        })
        .await
    }

    async fn read_folder_impl(
        &self,
        folder_path: &str,
        options: &ListingOptions,
    ) -> Result<Vec<FileEntry>, ClientError> {
        let url = self.file_url(folder_path);
        debug!("PROPFIND {} (depth {})", url, options.depth.as_str());

        let response = self
            .client
            .request(dav_method("PROPFIND"), &url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header("Depth", options.depth.as_str())
            .header("Content-Type", "application/xml")
            .body(PROPFIND_BODY)
            .send()
            .await?;

        Self::ensure_success(response.status(), &url, "PROPFIND")?;
        let body = response.text().await?;
        parse_file_listing(&body, &self.config, options, &self.registry)
    }

    /// List all favorited files for the session account.
    pub async fn list_favorites(
        &self,
        options: &ListingOptions,
    ) -> Result<Vec<FileEntry>, ClientError> {
        let url = format!("{}/", self.config.files_root_url());
        debug!("REPORT {} (favorites)", url);

        let response = self
            .client
            .request(dav_method("REPORT"), &url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header("Content-Type", "application/xml")
            .body(FAVORITES_REPORT_BODY)
            .send()
            .await?;

        Self::ensure_success(response.status(), &url, "REPORT")?;
        let body = response.text().await?;
        parse_file_listing(&body, &self.config, options, &self.registry)
    }

    /// Search for files whose name matches a pattern (`%` wildcards).
    pub async fn search_by_name(
        &self,
        pattern: &str,
        options: &ListingOptions,
    ) -> Result<Vec<FileEntry>, ClientError> {
        // File names may legally contain XML metacharacters.
        let pattern = quick_xml::escape::escape(pattern);
        let body = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<d:searchrequest xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns">
    <d:basicsearch>
        <d:select><d:prop><d:displayname/><d:getcontenttype/><d:getlastmodified/><d:getetag/><d:getcontentlength/><d:resourcetype/><oc:fileid/><oc:size/><oc:permissions/></d:prop></d:select>
        <d:from><d:scope><d:href>{}</d:href><d:depth>infinity</d:depth></d:scope></d:from>
        <d:where>
            <d:like>
                <d:prop><d:displayname/></d:prop>
                <d:literal>{}</d:literal>
            </d:like>
        </d:where>
        <d:orderby/>
    </d:basicsearch>
</d:searchrequest>"#,
            self.config.files_root(),
            pattern
        );
        self.search(body, options).await
    }

    /// Search for photos and videos last modified inside a date range.
    pub async fn search_by_media(
        &self,
        lower: chrono::DateTime<chrono::Utc>,
        upper: chrono::DateTime<chrono::Utc>,
        options: &ListingOptions,
    ) -> Result<Vec<FileEntry>, ClientError> {
        let body = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<d:searchrequest xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns">
    <d:basicsearch>
        <d:select><d:prop><d:displayname/><d:getcontenttype/><d:getlastmodified/><d:getetag/><d:getcontentlength/><d:resourcetype/><oc:fileid/><oc:size/></d:prop></d:select>
        <d:from><d:scope><d:href>{}</d:href><d:depth>infinity</d:depth></d:scope></d:from>
        <d:where>
            <d:and>
                <d:or>
                    <d:like><d:prop><d:getcontenttype/></d:prop><d:literal>image/%</d:literal></d:like>
                    <d:like><d:prop><d:getcontenttype/></d:prop><d:literal>video/%</d:literal></d:like>
                </d:or>
                <d:gte><d:prop><d:getlastmodified/></d:prop><d:literal>{}</d:literal></d:gte>
                <d:lte><d:prop><d:getlastmodified/></d:prop><d:literal>{}</d:literal></d:lte>
            </d:and>
        </d:where>
        <d:orderby/>
    </d:basicsearch>
</d:searchrequest>"#,
            self.config.files_root(),
            lower.to_rfc3339(),
            upper.to_rfc3339()
        );
        self.search(body, options).await
    }

    async fn search(
        &self,
        body: String,
        options: &ListingOptions,
    ) -> Result<Vec<FileEntry>, ClientError> {
        let url = format!(
            "{}{}",
            self.config.server_url_trimmed(),
            self.config.dav_root
        );
        debug!("SEARCH {}", url);

        let response = self
            .client
            .request(dav_method("SEARCH"), &url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header("Content-Type", "application/xml")
            .body(body)
            .send()
            .await?;

        Self::ensure_success(response.status(), &url, "SEARCH")?;
        let body = response.text().await?;
        parse_file_listing(&body, &self.config, options, &self.registry)
    }

    /// List the trash bin.
    pub async fn list_trash(&self) -> Result<Vec<TrashEntry>, ClientError> {
        let url = self.trash_root_url();
        debug!("PROPFIND {} (trash)", url);

        let response = self
            .client
            .request(dav_method("PROPFIND"), &url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header("Depth", Depth::One.as_str())
            .header("Content-Type", "application/xml")
            .body(TRASH_PROPFIND_BODY)
            .send()
            .await?;

        Self::ensure_success(response.status(), &url, "PROPFIND")?;
        let body = response.text().await?;
        let entries = parse_trash_listing(&body, &self.registry)?;
        // The listing includes the trash collection itself as its first
        // response; only real items carry a file id.
        Ok(entries
            .into_iter()
            .filter(|e| !e.file_id.is_empty())
            .collect())
    }

    /// Restore a trashed item to its original location.
    pub async fn restore_trash_item(&self, trash_path: &str) -> Result<(), ClientError> {
        let source = format!("{}{}", self.config.server_url_trimmed(), trash_path);
        let file_name = trash_path.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
        let destination = format!(
            "{}{}/trashbin/{}/restore/{}",
            self.config.server_url_trimmed(),
            self.config.dav_root,
            self.config.user_id,
            file_name
        );
        debug!("MOVE {} -> {}", source, destination);

        let response = self
            .client
            .request(dav_method("MOVE"), &source)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header("Destination", destination)
            .header("Overwrite", "T")
            .send()
            .await?;

        Self::ensure_success(response.status(), &source, "MOVE")
    }

    /// Permanently delete one trashed item.
    pub async fn delete_trash_item(&self, trash_path: &str) -> Result<(), ClientError> {
        let url = format!("{}{}", self.config.server_url_trimmed(), trash_path);
        let response = self
            .client
            .delete(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await?;
        Self::ensure_success(response.status(), &url, "DELETE")
    }

    /// Permanently delete everything in the trash bin.
    pub async fn empty_trash(&self) -> Result<(), ClientError> {
        let url = self.trash_root_url();
        let response = self
            .client
            .delete(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await?;
        Self::ensure_success(response.status(), &url, "DELETE")
    }

    /// List the comments attached to a file.
    pub async fn list_comments(&self, file_id: &str) -> Result<Vec<CommentEntry>, ClientError> {
        let url = self.comments_url(file_id);
        debug!("PROPFIND {} (comments)", url);

        let response = self
            .client
            .request(dav_method("PROPFIND"), &url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header("Depth", Depth::One.as_str())
            .header("Content-Type", "application/xml")
            .body(COMMENTS_PROPFIND_BODY)
            .send()
            .await?;

        Self::ensure_success(response.status(), &url, "PROPFIND")?;
        let body = response.text().await?;
        parse_comments(&body)
    }

    /// Post a new comment on a file.
    pub async fn add_comment(&self, file_id: &str, message: &str) -> Result<(), ClientError> {
        let url = self.comments_url(file_id);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(&serde_json::json!({
                "actorType": "users",
                "verb": "comment",
                "message": message,
            }))
            .send()
            .await?;
        Self::ensure_success(response.status(), &url, "POST")
    }

    /// Mark all comments on a file as read.
    pub async fn mark_comments_read(&self, file_id: &str) -> Result<(), ClientError> {
        let url = self.comments_url(file_id);
        let body = format!(
            r#"<?xml version="1.0"?>
<d:propertyupdate xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns">
    <d:set>
        <d:prop>
            <oc:readMarker>{}</oc:readMarker>
        </d:prop>
    </d:set>
</d:propertyupdate>"#,
            chrono::Utc::now().to_rfc3339()
        );

        let response = self
            .client
            .request(dav_method("PROPPATCH"), &url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header("Content-Type", "application/xml")
            .body(body)
            .send()
            .await?;
        Self::ensure_success(response.status(), &url, "PROPPATCH")
    }

    pub async fn download_file(&self, file_path: &str) -> Result<Vec<u8>, ClientError> {
        self.retry_with_backoff("download_file", || self.download_file_impl(file_path))
            .await
    }

    async fn download_file_impl(&self, file_path: &str) -> Result<Vec<u8>, ClientError> {
        let url = self.file_url(file_path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await?;

        Self::ensure_success(response.status(), &url, "GET")?;
        let bytes = response.bytes().await?;
        debug!("Downloaded {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }

    pub async fn upload_file(&self, file_path: &str, content: Vec<u8>) -> Result<(), ClientError> {
        let url = self.file_url(file_path);
        debug!("PUT {} ({} bytes)", url, content.len());

        let response = self
            .client
            .put(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .body(content)
            .send()
            .await?;
        Self::ensure_success(response.status(), &url, "PUT")
    }

    pub async fn delete(&self, file_path: &str) -> Result<(), ClientError> {
        let url = self.file_url(file_path);
        debug!("DELETE {}", url);

        let response = self
            .client
            .delete(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await?;
        Self::ensure_success(response.status(), &url, "DELETE")
    }

    pub async fn create_folder(&self, folder_path: &str) -> Result<(), ClientError> {
        let url = self.file_url(folder_path);
        debug!("MKCOL {}", url);

        let response = self
            .client
            .request(dav_method("MKCOL"), &url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await?;
        Self::ensure_success(response.status(), &url, "MKCOL")
    }

    pub async fn move_item(
        &self,
        from_path: &str,
        to_path: &str,
        overwrite: bool,
    ) -> Result<(), ClientError> {
        self.move_or_copy("MOVE", from_path, to_path, overwrite).await
    }

    pub async fn copy_item(
        &self,
        from_path: &str,
        to_path: &str,
        overwrite: bool,
    ) -> Result<(), ClientError> {
        self.move_or_copy("COPY", from_path, to_path, overwrite).await
    }

    async fn move_or_copy(
        &self,
        method: &'static str,
        from_path: &str,
        to_path: &str,
        overwrite: bool,
    ) -> Result<(), ClientError> {
        let source = self.file_url(from_path);
        let destination = self.file_url(to_path);
        debug!("{} {} -> {}", method, source, destination);

        let response = self
            .client
            .request(dav_method(method), &source)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header("Destination", destination)
            .header("Overwrite", if overwrite { "T" } else { "F" })
            .send()
            .await?;
        Self::ensure_success(response.status(), &source, method)
    }

    /// Set or clear the favorite flag on a file.
    pub async fn set_favorite(&self, file_path: &str, favorite: bool) -> Result<(), ClientError> {
        let url = self.file_url(file_path);
        let body = format!(
            r#"<?xml version="1.0"?>
<d:propertyupdate xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns">
    <d:set>
        <d:prop>
            <oc:favorite>{}</oc:favorite>
        </d:prop>
    </d:set>
</d:propertyupdate>"#,
            if favorite { 1 } else { 0 }
        );
        debug!("PROPPATCH {} (favorite={})", url, favorite);

        let response = self
            .client
            .request(dav_method("PROPPATCH"), &url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header("Content-Type", "application/xml")
            .body(body)
            .send()
            .await?;
        Self::ensure_success(response.status(), &url, "PROPPATCH")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SessionConfig {
        SessionConfig::new("https://cloud.example.com", "alice", "alice", "secret").unwrap()
    }

    #[test]
    fn test_file_url_construction() {
        let service = WebDAVService::new(session()).unwrap();
        assert_eq!(
            service.file_url("Documents/report.pdf"),
            "https://cloud.example.com/remote.php/dav/files/alice/Documents/report.pdf"
        );
        // Hrefs from a listing already carry the DAV prefix.
        assert_eq!(
            service.file_url("/remote.php/dav/files/alice/Documents/report.pdf"),
            "https://cloud.example.com/remote.php/dav/files/alice/Documents/report.pdf"
        );
    }

    #[test]
    fn test_trash_and_comment_urls() {
        let service = WebDAVService::new(session()).unwrap();
        assert_eq!(
            service.trash_root_url(),
            "https://cloud.example.com/remote.php/dav/trashbin/alice/trash"
        );
        assert_eq!(
            service.comments_url("55"),
            "https://cloud.example.com/remote.php/dav/comments/files/55"
        );
    }
}
