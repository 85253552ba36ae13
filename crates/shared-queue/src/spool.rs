//! # Directory Spool Queue Service
//!
//! A [`QueueService`] backed by a directory tree, so that separate processes
//! on one host (a launcher's workers and their clients) can share queues.
//!
//! ```text
//! <root>/<queue>/meta.json                       attributes + tags
//! <root>/<queue>/tmp/<id>.json                   staging for atomic writes
//! <root>/<queue>/ready/<sent_ms>-<id>.json       visible messages
//! <root>/<queue>/inflight/<visible_ms>.<r>.<f>   delivered, not yet deleted
//! ```
//!
//! Every state change is a `rename(2)` within one directory tree, so two
//! receivers can never claim the same file. The ack token of a delivery is
//! its in-flight file name.

use crate::error::{QueueError, QueueResult};
use crate::service::QueueService;
use crate::types::{
    AckToken, OutboundMessage, QueueAddress, QueueAttributes, ReceiveOptions, ReceivedMessage,
    Tags,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_types::MessageAttributes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;
use tracing::{debug, warn};

const ADDRESS_SCHEME: &str = "spool://";
const META_FILE: &str = "meta.json";
const READY_DIR: &str = "ready";
const INFLIGHT_DIR: &str = "inflight";
const TMP_DIR: &str = "tmp";

/// Default interval between directory scans while long-polling.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct QueueMeta {
    name: String,
    created_at: u64,
    retention_secs: Option<u64>,
    receive_wait_secs: Option<u64>,
    #[serde(default)]
    tags: Tags,
}

#[derive(Debug, Serialize, Deserialize)]
struct SpoolRecord {
    attributes: MessageAttributes,
    /// Hex-encoded message body.
    body: String,
    sent_at_ms: u64,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Body and attributes of a stored message file.
fn decode_record(file: &str, bytes: &[u8]) -> QueueResult<(Vec<u8>, MessageAttributes)> {
    let record: SpoolRecord = serde_json::from_slice(bytes).map_err(corrupt)?;
    let body =
        hex::decode(&record.body).map_err(|e| QueueError::Corrupt(format!("{file}: {e}")))?;
    Ok((body, record.attributes))
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Leading millisecond timestamp of a ready or in-flight file name.
fn leading_ms(file_name: &str) -> Option<u64> {
    file_name
        .split(|c| c == '-' || c == '.')
        .next()
        .and_then(|ms| ms.parse().ok())
}

/// Original ready-file name embedded in an in-flight file name.
fn original_name(inflight_name: &str) -> Option<&str> {
    inflight_name.splitn(3, '.').nth(2)
}

fn corrupt(err: serde_json::Error) -> QueueError {
    QueueError::Corrupt(err.to_string())
}

/// Queue service storing queues as directories under a common root.
#[derive(Debug, Clone)]
pub struct SpoolQueueService {
    root: PathBuf,
    poll_interval: Duration,
}

impl SpoolQueueService {
    /// Open (creating if needed) a spool rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> QueueResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        let root = tokio::fs::canonicalize(&root).await?;
        Ok(Self {
            root,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Override the scan interval used while long-polling.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn address_of(&self, name: &str) -> QueueAddress {
        QueueAddress::new(format!("{ADDRESS_SCHEME}{}", self.root.join(name).display()))
    }

    /// Map an address back to `(name, queue dir)`, rejecting paths outside the root.
    fn locate(&self, address: &QueueAddress) -> QueueResult<(String, PathBuf)> {
        let invalid = || QueueError::InvalidAddress(address.to_string());
        let path = address
            .as_str()
            .strip_prefix(ADDRESS_SCHEME)
            .map(PathBuf::from)
            .ok_or_else(invalid)?;
        if path.parent() != Some(self.root.as_path()) {
            return Err(invalid());
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| valid_name(n))
            .ok_or_else(invalid)?
            .to_string();
        Ok((name, path))
    }

    async fn read_meta(name: &str, dir: &Path) -> QueueResult<QueueMeta> {
        match tokio::fs::read(dir.join(META_FILE)).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(corrupt),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(QueueError::not_found(name)),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_meta(dir: &Path, meta: &QueueMeta) -> QueueResult<()> {
        let bytes = serde_json::to_vec_pretty(meta).map_err(corrupt)?;
        let staged = dir
            .join(TMP_DIR)
            .join(format!("meta-{}.json", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&staged, bytes).await?;
        tokio::fs::rename(&staged, dir.join(META_FILE)).await?;
        Ok(())
    }

    /// Sorted entries of a queue subdirectory. A vanished directory means the
    /// queue was deleted.
    async fn list_dir(name: &str, dir: &Path) -> QueueResult<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(QueueError::not_found(name)),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(file) = entry.file_name().to_str() {
                names.push(file.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Move in-flight messages whose visibility timeout lapsed back to ready.
    async fn requeue_expired(name: &str, dir: &Path, now: u64) -> QueueResult<()> {
        let inflight = dir.join(INFLIGHT_DIR);
        for file in Self::list_dir(name, &inflight).await? {
            let Some(visible_at) = leading_ms(&file) else {
                continue;
            };
            if visible_at > now {
                // Names sort by visibility deadline.
                break;
            }
            let Some(original) = original_name(&file) else {
                warn!(queue = name, file = %file, "Skipping malformed in-flight entry");
                continue;
            };
            match tokio::fs::rename(inflight.join(&file), dir.join(READY_DIR).join(original)).await
            {
                Ok(()) => debug!(queue = name, file = original, "Message visible again"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn claim_batch(
        &self,
        name: &str,
        dir: &Path,
        meta: &QueueMeta,
        options: &ReceiveOptions,
    ) -> QueueResult<Vec<ReceivedMessage>> {
        let now = now_ms();
        Self::requeue_expired(name, dir, now).await?;

        let ready = dir.join(READY_DIR);
        let inflight = dir.join(INFLIGHT_DIR);
        let retention_ms = meta.retention_secs.map(|s| s.saturating_mul(1_000));
        let visible_at = now.saturating_add(options.visibility_timeout.as_millis() as u64);

        let mut batch = Vec::new();
        for file in Self::list_dir(name, &ready).await? {
            if batch.len() >= options.max_messages {
                break;
            }
            let sent_at = leading_ms(&file).unwrap_or(now);
            if retention_ms.is_some_and(|limit| now.saturating_sub(sent_at) >= limit) {
                match tokio::fs::remove_file(ready.join(&file)).await {
                    Ok(()) => debug!(queue = name, file = %file, "Dropped expired message"),
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                continue;
            }

            let token = format!(
                "{visible_at:020}.{}.{file}",
                uuid::Uuid::new_v4().simple()
            );
            match tokio::fs::rename(ready.join(&file), inflight.join(&token)).await {
                Ok(()) => {}
                // Another receiver claimed it first.
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }

            let claimed = inflight.join(&token);
            let bytes = match tokio::fs::read(&claimed).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    // Stays in flight and is retried once its visibility lapses.
                    warn!(queue = name, file = %file, error = %e, "Failed to read claimed message");
                    continue;
                }
            };
            match decode_record(&file, &bytes) {
                Ok((body, attributes)) => batch.push(ReceivedMessage {
                    body,
                    attributes,
                    ack_token: AckToken::new(token),
                }),
                Err(e) => {
                    warn!(queue = name, file = %file, error = %e, "Discarding corrupt message");
                    match tokio::fs::remove_file(&claimed).await {
                        Ok(()) => {}
                        Err(e) if e.kind() == ErrorKind::NotFound => {}
                        Err(e) => return Err(e.into()),
                    }
                }
            }
        }
        Ok(batch)
    }
}

#[async_trait]
impl QueueService for SpoolQueueService {
    async fn create_queue(
        &self,
        name: &str,
        attributes: QueueAttributes,
        tags: Tags,
    ) -> QueueResult<QueueAddress> {
        if !valid_name(name) {
            return Err(QueueError::InvalidName(name.to_string()));
        }
        let dir = self.root.join(name);
        if Self::read_meta(name, &dir).await.is_ok() {
            return Ok(self.address_of(name));
        }

        for sub in [READY_DIR, INFLIGHT_DIR, TMP_DIR] {
            tokio::fs::create_dir_all(dir.join(sub)).await?;
        }
        let meta = QueueMeta {
            name: name.to_string(),
            created_at: shared_types::unix_now_secs(),
            retention_secs: attributes.retention.map(|d| d.as_secs()),
            receive_wait_secs: attributes.receive_wait.map(|d| d.as_secs()),
            tags,
        };
        Self::write_meta(&dir, &meta).await?;
        debug!(queue = name, root = %self.root.display(), "Created spool queue");
        Ok(self.address_of(name))
    }

    async fn resolve_address(&self, name: &str, _owner: Option<&str>) -> QueueResult<QueueAddress> {
        if !valid_name(name) {
            return Err(QueueError::not_found(name));
        }
        Self::read_meta(name, &self.root.join(name)).await?;
        Ok(self.address_of(name))
    }

    async fn tag_queue(&self, address: &QueueAddress, tags: Tags) -> QueueResult<()> {
        let (name, dir) = self.locate(address)?;
        let mut meta = Self::read_meta(&name, &dir).await?;
        meta.tags.extend(tags);
        Self::write_meta(&dir, &meta).await
    }

    async fn queue_tags(&self, address: &QueueAddress) -> QueueResult<Tags> {
        let (name, dir) = self.locate(address)?;
        Ok(Self::read_meta(&name, &dir).await?.tags)
    }

    async fn list_queues(&self, prefix: &str) -> QueueResult<Vec<QueueAddress>> {
        let mut addresses = Vec::new();
        for name in Self::list_dir("", &self.root).await? {
            if !name.starts_with(prefix) || !valid_name(&name) {
                continue;
            }
            if tokio::fs::try_exists(self.root.join(&name).join(META_FILE))
                .await
                .unwrap_or(false)
            {
                addresses.push(self.address_of(&name));
            }
        }
        Ok(addresses)
    }

    async fn send_message(
        &self,
        address: &QueueAddress,
        message: OutboundMessage,
    ) -> QueueResult<()> {
        let (name, dir) = self.locate(address)?;
        Self::read_meta(&name, &dir).await?;

        let sent_at_ms = now_ms();
        let record = SpoolRecord {
            attributes: message.attributes,
            body: hex::encode(&message.body),
            sent_at_ms,
        };
        let bytes = serde_json::to_vec(&record).map_err(corrupt)?;
        let file = format!("{sent_at_ms:020}-{}.json", uuid::Uuid::new_v4().simple());
        let staged = dir.join(TMP_DIR).join(&file);

        match tokio::fs::write(&staged, bytes).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(QueueError::not_found(name)),
            Err(e) => return Err(e.into()),
        }
        match tokio::fs::rename(&staged, dir.join(READY_DIR).join(&file)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(QueueError::not_found(name)),
            Err(e) => Err(e.into()),
        }
    }

    async fn receive_messages(
        &self,
        address: &QueueAddress,
        options: ReceiveOptions,
    ) -> QueueResult<Vec<ReceivedMessage>> {
        let (name, dir) = self.locate(address)?;
        let meta = Self::read_meta(&name, &dir).await?;
        let deadline = Instant::now() + options.wait;

        loop {
            let batch = self.claim_batch(&name, &dir, &meta, &options).await?;
            let now = Instant::now();
            if !batch.is_empty() || now >= deadline {
                return Ok(batch);
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn delete_message(&self, address: &QueueAddress, token: &AckToken) -> QueueResult<()> {
        let (name, dir) = self.locate(address)?;
        let token = token.as_str();
        if token.contains('/') || token.contains("..") {
            return Ok(());
        }
        match tokio::fs::remove_file(dir.join(INFLIGHT_DIR).join(token)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // Either already deleted, requeued after its timeout, or the
                // whole queue is gone.
                Self::read_meta(&name, &dir).await.map(|_| ())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_queue(&self, address: &QueueAddress) -> QueueResult<()> {
        let (name, dir) = self.locate(address)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(queue = %name, "Deleted spool queue");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn spool() -> (TempDir, SpoolQueueService) {
        let dir = TempDir::new().unwrap();
        let service = SpoolQueueService::open(dir.path())
            .await
            .unwrap()
            .with_poll_interval(Duration::from_millis(10));
        (dir, service)
    }

    fn message(body: &[u8]) -> OutboundMessage {
        let mut attributes = MessageAttributes::new();
        attributes.insert("command".into(), "Ping".into());
        OutboundMessage::new(body.to_vec(), attributes)
    }

    fn opts(visibility_ms: u64, wait_ms: u64) -> ReceiveOptions {
        ReceiveOptions::new(
            10,
            Duration::from_millis(visibility_ms),
            Duration::from_millis(wait_ms),
        )
    }

    #[tokio::test]
    async fn test_send_receive_delete() {
        let (_dir, service) = spool().await;
        let address = service
            .create_queue("work", QueueAttributes::default(), Tags::new())
            .await
            .unwrap();

        service
            .send_message(&address, message(&[0, 159, 146, 150]))
            .await
            .unwrap();

        let batch = service.receive_messages(&address, opts(30_000, 0)).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].body, vec![0, 159, 146, 150]);
        assert_eq!(batch[0].attributes.get("command").unwrap(), "Ping");

        service
            .delete_message(&address, &batch[0].ack_token)
            .await
            .unwrap();
        // Deleting twice is harmless.
        service
            .delete_message(&address, &batch[0].ack_token)
            .await
            .unwrap();

        let empty = service.receive_messages(&address, opts(30_000, 50)).await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_redelivery_after_visibility_timeout() {
        let (_dir, service) = spool().await;
        let address = service
            .create_queue("work", QueueAttributes::default(), Tags::new())
            .await
            .unwrap();
        service.send_message(&address, message(b"x")).await.unwrap();

        let first = service.receive_messages(&address, opts(100, 0)).await.unwrap();
        assert_eq!(first.len(), 1);
        assert!(service
            .receive_messages(&address, opts(100, 0))
            .await
            .unwrap()
            .is_empty());

        let again = service.receive_messages(&address, opts(100, 1_000)).await.unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].body, b"x");
    }

    #[tokio::test]
    async fn test_shared_between_instances() {
        let (dir, producer) = spool().await;
        let consumer = SpoolQueueService::open(dir.path()).await.unwrap();

        let address = producer
            .create_queue("shared", QueueAttributes::default(), Tags::new())
            .await
            .unwrap();
        let resolved = consumer.resolve_address("shared", None).await.unwrap();
        assert_eq!(resolved, address);

        producer.send_message(&address, message(b"hi")).await.unwrap();
        let batch = consumer.receive_messages(&resolved, opts(30_000, 500)).await.unwrap();
        assert_eq!(batch.len(), 1);
    }

    #[tokio::test]
    async fn test_tags_and_listing() {
        let (_dir, service) = spool().await;
        let reply = service
            .create_queue("cqmq-cl-abc", QueueAttributes::default(), Tags::new())
            .await
            .unwrap();
        service
            .create_queue("work", QueueAttributes::default(), Tags::new())
            .await
            .unwrap();

        let mut tags = Tags::new();
        tags.insert("cqmq:HeartbeatAt".into(), "100".into());
        service.tag_queue(&reply, tags).await.unwrap();

        assert_eq!(
            service.queue_tags(&reply).await.unwrap().get("cqmq:HeartbeatAt").unwrap(),
            "100"
        );
        assert_eq!(service.list_queues("cqmq-cl").await.unwrap(), vec![reply]);
    }

    #[tokio::test]
    async fn test_deleted_queue_is_not_found() {
        let (_dir, service) = spool().await;
        let address = service
            .create_queue("gone", QueueAttributes::default(), Tags::new())
            .await
            .unwrap();
        service.delete_queue(&address).await.unwrap();
        service.delete_queue(&address).await.unwrap();

        assert!(service
            .send_message(&address, message(b"x"))
            .await
            .unwrap_err()
            .is_not_found());
        assert!(service
            .resolve_address("gone", None)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_rejects_names_and_addresses_outside_root() {
        let (_dir, service) = spool().await;
        assert!(matches!(
            service
                .create_queue("../escape", QueueAttributes::default(), Tags::new())
                .await
                .unwrap_err(),
            QueueError::InvalidName(_)
        ));
        assert!(matches!(
            service
                .send_message(&QueueAddress::new("spool:///etc/passwd"), message(b"x"))
                .await
                .unwrap_err(),
            QueueError::InvalidAddress(_)
        ));
    }

    #[tokio::test]
    async fn test_corrupt_file_does_not_strand_batch() {
        let (dir, service) = spool().await;
        let address = service
            .create_queue("work", QueueAttributes::default(), Tags::new())
            .await
            .unwrap();
        service.send_message(&address, message(b"good")).await.unwrap();

        let ready = dir.path().join("work").join(READY_DIR);
        tokio::fs::write(ready.join("99999999999999999999-bad.json"), b"{not json")
            .await
            .unwrap();
        tokio::fs::write(
            ready.join("99999999999999999999-badhex.json"),
            br#"{"attributes":{},"body":"zz","sent_at_ms":0}"#,
        )
        .await
        .unwrap();

        let batch = service.receive_messages(&address, opts(30_000, 0)).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].body, b"good");

        let inflight = dir.path().join("work").join(INFLIGHT_DIR);
        let remaining = SpoolQueueService::list_dir("work", &inflight).await.unwrap();
        assert_eq!(remaining, vec![batch[0].ack_token.as_str().to_string()]);
        assert!(SpoolQueueService::list_dir("work", &ready).await.unwrap().is_empty());

        service
            .delete_message(&address, &batch[0].ack_token)
            .await
            .unwrap();
        assert!(service
            .receive_messages(&address, opts(30_000, 0))
            .await
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_decode_record_rejects_bad_hex() {
        let err = decode_record("f.json", br#"{"attributes":{},"body":"zz","sent_at_ms":0}"#)
            .unwrap_err();
        assert!(matches!(err, QueueError::Corrupt(ref m) if m.starts_with("f.json")));
    }

    #[test]
    fn test_file_name_parsing() {
        assert_eq!(leading_ms("00000000000000001234-abcd.json"), Some(1234));
        assert_eq!(
            original_name("00000000000000009999.ff00.00000000000000001234-abcd.json"),
            Some("00000000000000001234-abcd.json")
        );
    }
}
