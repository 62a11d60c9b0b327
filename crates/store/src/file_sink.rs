//! Append-only local file used when the durable store cannot take a write.

use std::path::{Path, PathBuf};

use {
    courier_common::ChatEvent,
    tokio::{fs, io::AsyncWriteExt, sync::Mutex},
};

use crate::Result;

/// Separator written after every record.
pub const RECORD_SEPARATOR: &str = "==================================================";

/// Appends pretty JSON records, each followed by a separator line.
///
/// Appends are serialized so concurrent saves never interleave.
pub struct FileSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, event: &ChatEvent) -> Result<()> {
        let mut record = event.to_json()?;
        record.push('\n');
        record.push_str(RECORD_SEPARATOR);
        record.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(record.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, courier_common::EventKind};

    fn event(channel_id: u64, content: &str) -> ChatEvent {
        ChatEvent {
            kind: EventKind::New,
            timestamp: "2025-03-01T10:15:30.000000Z".into(),
            server: None,
            server_id: None,
            channel: "dm".into(),
            channel_id,
            author: "bob".into(),
            author_id: 2,
            content: content.into(),
            attachment_urls: Vec::new(),
            embed_count: 0,
            reaction_count: 0,
        }
    }

    #[test]
    fn separator_is_fifty_equals_signs() {
        assert_eq!(RECORD_SEPARATOR.len(), 50);
        assert!(RECORD_SEPARATOR.chars().all(|c| c == '='));
    }

    #[tokio::test]
    async fn appends_json_then_separator() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("logs").join("messages.txt"));

        sink.append(&event(1, "first")).await.unwrap();
        sink.append(&event(2, "second")).await.unwrap();

        let raw = std::fs::read_to_string(sink.path()).unwrap();
        let chunks: Vec<&str> = raw
            .split(&format!("\n{RECORD_SEPARATOR}\n"))
            .filter(|c| !c.is_empty())
            .collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(ChatEvent::from_json(chunks[0]).unwrap().content, "first");
        assert_eq!(ChatEvent::from_json(chunks[1]).unwrap().channel_id, 2);
        assert!(raw.ends_with(&format!("{RECORD_SEPARATOR}\n")));
    }

    #[tokio::test]
    async fn concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let sink = std::sync::Arc::new(FileSink::new(dir.path().join("messages.txt")));

        let mut handles = Vec::new();
        for i in 0..16 {
            let sink = sink.clone();
            handles.push(tokio::spawn(async move {
                sink.append(&event(i, &"x".repeat(512))).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let raw = std::fs::read_to_string(sink.path()).unwrap();
        let parsed = raw
            .split(&format!("\n{RECORD_SEPARATOR}\n"))
            .filter(|c| !c.is_empty())
            .map(|c| ChatEvent::from_json(c).unwrap())
            .count();
        assert_eq!(parsed, 16);
    }
}
