//! Rekor source and extractor plugin
//!
//! Binds the cursor, batcher and extractor to the host lifecycle traits.

use crate::batcher::{BatchStats, EventBatcher};
use crate::client::{LogClient, RekorClient};
use crate::config::RekorConfig;
use crate::cursor::LogCursor;
use crate::extractor::{field_catalog, Field, FieldExtractor};
use async_trait::async_trait;
use std::sync::Arc;
use tlog_core::{
    EventReader, EventWriters, ExtractRequest, ExtractorPlugin, FieldEntry, Plugin, PluginError,
    PluginInfo, PluginResult, SourceInstance, SourcePlugin,
};
use tracing::info;

pub const PLUGIN_REQUIRED_API_VERSION: &str = "0.3.0";
pub const PLUGIN_ID: u32 = 3;
pub const PLUGIN_NAME: &str = "rekor-falco";
pub const PLUGIN_DESCRIPTION: &str =
    "A Falco Plugin to enable analyzing Rekor Transparency Server logs with Falco Rules";
pub const PLUGIN_CONTACT: &str = "github.com/falcosecurity/plugins";
pub const PLUGIN_VERSION: &str = "0.1.0";
pub const PLUGIN_EVENT_SOURCE: &str = "rekor-falco";

/// Rekor plugin
pub struct RekorPlugin {
    config: RekorConfig,
    client: Option<Arc<dyn LogClient>>,
    extractor: FieldExtractor,
}

impl RekorPlugin {
    pub fn new() -> Self {
        Self {
            config: RekorConfig::default(),
            client: None,
            extractor: FieldExtractor::new(),
        }
    }

    /// Serve instances from `client` instead of the configured server
    pub fn with_client(client: Arc<dyn LogClient>) -> Self {
        Self {
            client: Some(client),
            ..Self::new()
        }
    }

    pub fn config(&self) -> &RekorConfig {
        &self.config
    }
}

impl Default for RekorPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginInfo for RekorPlugin {
    fn id(&self) -> u32 {
        PLUGIN_ID
    }

    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn version(&self) -> &str {
        PLUGIN_VERSION
    }

    fn description(&self) -> &str {
        PLUGIN_DESCRIPTION
    }

    fn contact(&self) -> &str {
        PLUGIN_CONTACT
    }

    fn required_api_version(&self) -> &str {
        PLUGIN_REQUIRED_API_VERSION
    }

    fn event_source(&self) -> &str {
        PLUGIN_EVENT_SOURCE
    }
}

impl Plugin for RekorPlugin {
    fn init_schema(&self) -> Option<String> {
        Some(RekorConfig::schema().to_string())
    }

    fn init(&mut self, config: &str) -> PluginResult<()> {
        self.config = RekorConfig::from_json(config)?;
        info!("Initialized {} with server {}", PLUGIN_NAME, self.config.rekor_server);
        Ok(())
    }
}

#[async_trait]
impl SourcePlugin for RekorPlugin {
    async fn open(&self, _params: &str) -> PluginResult<Box<dyn SourceInstance>> {
        let client: Arc<dyn LogClient> = match &self.client {
            Some(client) => client.clone(),
            None => Arc::new(RekorClient::new(&self.config.rekor_server)?),
        };

        let (cursor, start_index) = LogCursor::open(client).await?;
        info!("Opened {} instance at index {}", PLUGIN_NAME, start_index);

        Ok(Box::new(RekorInstance {
            batcher: EventBatcher::new(cursor),
        }))
    }

    fn event_to_string(&self, event: &EventReader<'_>) -> PluginResult<String> {
        Ok(format!(
            "{{\"sample\": \"{}\"}}",
            String::from_utf8_lossy(event.data())
        ))
    }
}

impl ExtractorPlugin for RekorPlugin {
    fn fields(&self) -> Vec<FieldEntry> {
        field_catalog()
    }

    fn extract(&self, req: &mut ExtractRequest, event: &EventReader<'_>) -> PluginResult<()> {
        let field = Field::from_id(req.field_id())
            .ok_or_else(|| PluginError::UnknownField(req.field().to_string()))?;
        let value = self.extractor.extract(event.data(), field)?;
        req.set_value(value);
        Ok(())
    }
}

/// An opened Rekor event stream
pub struct RekorInstance {
    batcher: EventBatcher<Arc<dyn LogClient>>,
}

impl RekorInstance {
    /// Next index this instance will fetch
    pub fn position(&self) -> u64 {
        self.batcher.cursor().position()
    }

    pub fn stats(&self) -> &BatchStats {
        self.batcher.stats()
    }
}

#[async_trait]
impl SourceInstance for RekorInstance {
    async fn next_batch(&mut self, events: &mut EventWriters) -> PluginResult<usize> {
        Ok(self.batcher.fill_batch(events).await?)
    }

    fn close(&mut self) {
        let stats = self.batcher.stats();
        info!(
            "Closing {} instance at index {} ({} events, {} failed fetches)",
            PLUGIN_NAME,
            self.batcher.cursor().position(),
            stats.events_produced,
            stats.fetch_failures
        );
    }
}
