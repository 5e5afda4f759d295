use crate::errors::ToolError;
use crate::managers::download::{require_str, DownloadPipeline};
use crate::services::connector::{CallOutcome, Connector};
use crate::services::logger::Logger;
use crate::services::tool_executor::ToolHandler;
use crate::utils::output::apply_output_transform;
use crate::utils::paths::resolve_org_id;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// The `call` tool: executes a `resource/verb` operation and shapes the
/// structured response per the caller's `output` options. A byte-stream
/// result bypasses shaping entirely and is materialized through the
/// download pipeline instead.
pub struct CallManager {
    logger: Logger,
    connector: Arc<dyn Connector>,
    pipeline: Arc<DownloadPipeline>,
}

impl CallManager {
    pub fn new(
        logger: Logger,
        connector: Arc<dyn Connector>,
        pipeline: Arc<DownloadPipeline>,
    ) -> Self {
        Self {
            logger: logger.child("call"),
            connector,
            pipeline,
        }
    }
}

#[async_trait]
impl ToolHandler for CallManager {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        let resource = require_str(&args, "resource")?;
        let verb = require_str(&args, "verb")?;
        let params = args
            .get("params")
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()));

        match self.connector.execute(resource, verb, &params).await? {
            CallOutcome::Json(value) => Ok(apply_output_transform(&value, args.get("output"))),
            CallOutcome::Stream(stream) => {
                self.logger.debug(
                    "binary response, routing to download pipeline",
                    Some(&serde_json::json!({ "resource": resource, "verb": verb })),
                );
                let org_id = resolve_org_id(args.get("org_id").and_then(|v| v.as_str()));
                self.pipeline.store(stream, resource, org_id.as_deref()).await
            }
        }
    }
}
