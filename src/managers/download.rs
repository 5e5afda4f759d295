use crate::constants::download::SNIFF_BYTES;
use crate::errors::ToolError;
use crate::services::connector::{ByteStream, CallOutcome, Connector};
use crate::services::logger::Logger;
use crate::services::tool_executor::ToolHandler;
use crate::utils::paths::{resolve_download_dir, resolve_org_id};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Ordered magic-number table; first match wins. Entries are byte prefixes
/// only, so formats whose marker sits past offset zero (mp4 `ftyp`) are
/// not represented and keep no extension.
const SIGNATURES: &[(&[u8], &str)] = &[
    (b"\x89PNG\r\n\x1a\n", "png"),
    (b"\xff\xd8\xff", "jpg"),
    (b"GIF87a", "gif"),
    (b"GIF89a", "gif"),
    (b"ID3", "mp3"),
    (b"\xff\xfb", "mp3"),
    (b"\xff\xf3", "mp3"),
    (b"\xff\xf2", "mp3"),
    (b"OggS", "ogg"),
    (b"fLaC", "flac"),
    (b"\x1a\x45\xdf\xa3", "webm"),
    (b"RIFF", "wav"),
    (b"%PDF", "pdf"),
];

fn sniff_extension(prefix: &[u8]) -> Option<&'static str> {
    SIGNATURES
        .iter()
        .find(|(magic, _)| prefix.starts_with(magic))
        .map(|(_, ext)| *ext)
}

/// Materializes byte-stream operation results on local storage. Structured
/// results pass through unchanged; streams are written chunk by chunk to a
/// uniquely named file, sniffed for a known signature, and reported as a
/// metadata record. A mid-stream failure propagates with whatever bytes
/// were already flushed left on disk.
pub struct DownloadPipeline {
    logger: Logger,
}

impl DownloadPipeline {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger: logger.child("download"),
        }
    }

    pub async fn run(
        &self,
        connector: &dyn Connector,
        entity: &str,
        verb: &str,
        params: &Value,
        org_id: Option<&str>,
    ) -> Result<Value, ToolError> {
        match connector.execute(entity, verb, params).await? {
            CallOutcome::Json(value) => Ok(value),
            CallOutcome::Stream(stream) => self.store(stream, entity, org_id).await,
        }
    }

    pub async fn store(
        &self,
        mut stream: ByteStream,
        entity: &str,
        org_id: Option<&str>,
    ) -> Result<Value, ToolError> {
        let dir = resolve_download_dir(org_id);
        tokio::fs::create_dir_all(&dir).await?;
        let dir = tokio::fs::canonicalize(&dir).await?;

        let stem = format!("{}-{}", safe_file_stem(entity), uuid::Uuid::new_v4());
        let path = dir.join(&stem);
        let mut file = tokio::fs::File::create(&path).await?;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        let final_path = match sniff_file(&path).await? {
            Some(extension) => {
                let renamed = dir.join(format!("{}.{}", stem, extension));
                tokio::fs::rename(&path, &renamed).await?;
                renamed
            }
            None => path,
        };

        let size_bytes = tokio::fs::metadata(&final_path).await?.len();
        self.logger.info(
            "download stored",
            Some(&serde_json::json!({ "entity": entity, "size_bytes": size_bytes })),
        );
        Ok(serde_json::json!({
            "download": {
                "entity": entity,
                "file_path": final_path.display().to_string(),
                "size_bytes": size_bytes,
                "message": format!("Saved {} payload to {}", entity, final_path.display()),
            }
        }))
    }
}

async fn sniff_file(path: &Path) -> Result<Option<&'static str>, ToolError> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut head = [0u8; SNIFF_BYTES];
    let mut filled = 0usize;
    loop {
        let read = file.read(&mut head[filled..]).await?;
        if read == 0 {
            break;
        }
        filled += read;
        if filled == head.len() {
            break;
        }
    }
    Ok(sniff_extension(&head[..filled]))
}

fn safe_file_stem(value: &str) -> String {
    let cleaned: String = value
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('_');
    if cleaned.is_empty() {
        "download".to_string()
    } else {
        cleaned.chars().take(64).collect()
    }
}

/// The `download` tool: runs `entity/verb` through the pipeline. Structured
/// results come back unchanged; this is the pass-through path for verbs
/// that turn out not to produce binary content.
pub struct DownloadManager {
    connector: Arc<dyn Connector>,
    pipeline: Arc<DownloadPipeline>,
}

impl DownloadManager {
    pub fn new(connector: Arc<dyn Connector>, pipeline: Arc<DownloadPipeline>) -> Self {
        Self {
            connector,
            pipeline,
        }
    }
}

#[async_trait]
impl ToolHandler for DownloadManager {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        let entity = require_str(&args, "entity")?;
        let verb = require_str(&args, "verb")?;
        let params = args
            .get("params")
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()));
        let org_id = resolve_org_id(args.get("org_id").and_then(|v| v.as_str()));
        self.pipeline
            .run(
                self.connector.as_ref(),
                entity,
                verb,
                &params,
                org_id.as_deref(),
            )
            .await
    }
}

pub(crate) fn require_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolError::invalid_params(format!("{} is required", key)))
}

#[cfg(test)]
mod tests {
    use super::{safe_file_stem, sniff_extension};

    #[test]
    fn png_signature_wins_first() {
        let head = b"\x89PNG\r\n\x1a\n and then some";
        assert_eq!(sniff_extension(head), Some("png"));
    }

    #[test]
    fn unknown_or_short_prefixes_sniff_nothing() {
        assert_eq!(sniff_extension(b"plain text"), None);
        assert_eq!(sniff_extension(b""), None);
        assert_eq!(sniff_extension(b"\x89PN"), None);
    }

    #[test]
    fn riff_prefix_maps_to_wav() {
        assert_eq!(sniff_extension(b"RIFF\x24\x00\x00\x00WAVE"), Some("wav"));
    }

    #[test]
    fn file_stems_are_filesystem_safe() {
        assert_eq!(safe_file_stem("calls/recording"), "calls_recording");
        assert_eq!(safe_file_stem("  "), "download");
        assert_eq!(safe_file_stem("__x__"), "x");
    }
}
