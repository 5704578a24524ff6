use std::sync::Arc;

use tokio::runtime::Handle;
use vitrine_core::assets::{AssetResolver, ClientRegistry};
use vitrine_datamanager::{Datamanager, HttpAssetApiFactory};

use crate::config::ServerConfig;
use crate::render::filters::DateDefaults;
use crate::render::{RenderSettings, Renderer};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Cached content API access.
    pub datamanager: Arc<Datamanager>,
    /// Asset negotiation with one remote client per API context.
    pub resolver: Arc<AssetResolver>,
    /// Template renderer.
    pub renderer: Arc<Renderer>,
}

impl AppState {
    /// Wire up the content API, asset resolver and renderer.
    ///
    /// Must be called from within a Tokio runtime: the renderer captures the
    /// current runtime handle.
    pub fn new(config: ServerConfig) -> Self {
        let client = reqwest::Client::new();

        let datamanager = Arc::new(Datamanager::new(
            client.clone(),
            config.datamanager_config(),
        ));

        let factory = HttpAssetApiFactory::new(client, config.asset_api_environments.clone());
        let resolver = Arc::new(AssetResolver::new(Arc::new(ClientRegistry::new(Arc::new(
            factory,
        )))));

        let renderer = Arc::new(Renderer::new(
            RenderSettings {
                views_dir: config.views_dir(),
                datamanager: Arc::clone(&datamanager),
                resolver: Arc::clone(&resolver),
                dm_config: config.dm_config.clone(),
                dates: DateDefaults {
                    timezone: config.timezone,
                    locale: config.locale,
                },
                runtime: Handle::current(),
            },
            !config.disable_template_cache,
        ));

        Self {
            config: Arc::new(config),
            datamanager,
            resolver,
            renderer,
        }
    }
}
