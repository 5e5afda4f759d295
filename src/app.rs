use crate::errors::ToolError;
use crate::managers::call::CallManager;
use crate::managers::download::{DownloadManager, DownloadPipeline};
use crate::mcp::catalog::tool_catalog;
use crate::services::connector::{Connector, HttpConnector};
use crate::services::credentials::{CredentialCache, HttpTokenFetcher, SystemClock};
use crate::services::logger::Logger;
use crate::services::tool_executor::{ToolExecutor, ToolHandler};
use std::collections::HashMap;
use std::sync::Arc;

pub struct App {
    pub logger: Logger,
    pub tool_executor: Arc<ToolExecutor>,
}

impl App {
    fn validate_tool_wiring(
        handlers: &HashMap<String, Arc<dyn ToolHandler>>,
    ) -> Result<(), ToolError> {
        let mut missing = Vec::new();
        for tool in tool_catalog().iter() {
            if !handlers.contains_key(&tool.name) {
                missing.push(tool.name.clone());
            }
        }
        if missing.is_empty() {
            return Ok(());
        }
        missing.sort();
        Err(ToolError::internal("Tool wiring is incomplete")
            .with_hint(
                "This is a server wiring bug: every tool in tool_catalog.json must have a handler.",
            )
            .with_details(serde_json::json!({ "missing_tools": missing })))
    }

    pub fn initialize() -> Result<Self, ToolError> {
        let logger = Logger::new("relay");

        let fetcher = Arc::new(HttpTokenFetcher::from_env());
        let credentials = Arc::new(CredentialCache::new(
            logger.clone(),
            fetcher,
            Arc::new(SystemClock),
        ));
        let connector: Arc<dyn Connector> =
            Arc::new(HttpConnector::from_env(logger.clone(), credentials)?);
        let pipeline = Arc::new(DownloadPipeline::new(logger.clone()));

        let call_manager = Arc::new(CallManager::new(
            logger.clone(),
            connector.clone(),
            pipeline.clone(),
        ));
        let download_manager = Arc::new(DownloadManager::new(connector, pipeline));

        let mut handlers: HashMap<String, Arc<dyn ToolHandler>> = HashMap::new();
        handlers.insert("call".to_string(), call_manager);
        handlers.insert("download".to_string(), download_manager);

        Self::validate_tool_wiring(&handlers)?;

        let tool_executor = Arc::new(ToolExecutor::new(logger.clone(), handlers));

        Ok(Self {
            logger,
            tool_executor,
        })
    }
}
