//! Page rendering with minijinja.
//!
//! Templates are read from the views directory; names that do not exist
//! there and look like `{kind}-{entryID}` are loaded from the content API
//! as dynamic templates. Rendering runs on the blocking pool so filters can
//! wait on network lookups through the captured runtime handle.

pub mod filters;

use std::path::PathBuf;
use std::sync::Arc;

use minijinja::{Environment, Error, ErrorKind, Value};
use tokio::runtime::Handle;
use vitrine_core::assets::{ApiContext, AssetResolver};
use vitrine_core::templates::DynamicTemplateName;
use vitrine_datamanager::{Datamanager, DatamanagerError};

/// Name of the global holding the API context for ID-only negotiation.
pub const DM_CONFIG_GLOBAL: &str = "_dm_config";

/// Everything the template environment needs.
#[derive(Clone)]
pub struct RenderSettings {
    pub views_dir: PathBuf,
    pub datamanager: Arc<Datamanager>,
    pub resolver: Arc<AssetResolver>,
    pub dm_config: Option<ApiContext>,
    pub dates: filters::DateDefaults,
    pub runtime: Handle,
}

/// Renders templates, reusing one environment unless caching is disabled.
pub struct Renderer {
    settings: RenderSettings,
    cached: Option<Arc<Environment<'static>>>,
}

impl Renderer {
    pub fn new(settings: RenderSettings, cache_templates: bool) -> Self {
        let cached = cache_templates.then(|| Arc::new(build_environment(&settings)));
        Self { settings, cached }
    }

    fn environment(&self) -> Arc<Environment<'static>> {
        match &self.cached {
            Some(env) => Arc::clone(env),
            None => Arc::new(build_environment(&self.settings)),
        }
    }

    /// Render template `name` with `context`.
    pub async fn render(&self, name: &str, context: Value) -> Result<String, Error> {
        let env = self.environment();
        let name = name.to_string();

        tokio::task::spawn_blocking(move || env.get_template(&name)?.render(context))
            .await
            .map_err(|e| {
                Error::new(ErrorKind::InvalidOperation, "render task failed").with_source(e)
            })?
    }
}

/// Build a template environment with loader, filters and globals.
pub fn build_environment(settings: &RenderSettings) -> Environment<'static> {
    let mut env = Environment::new();
    env.set_loader(template_loader(settings));
    filters::register(&mut env, settings);

    if let Some(context) = &settings.dm_config {
        env.add_global(DM_CONFIG_GLOBAL, Value::from_serialize(context));
    }
    env
}

/// Views directory first, then dynamic templates from the content API.
///
/// Unknown names yield `Ok(None)` so minijinja reports them as not found.
fn template_loader(
    settings: &RenderSettings,
) -> impl Fn(&str) -> Result<Option<String>, Error> + Send + Sync + 'static {
    let files = minijinja::path_loader(settings.views_dir.clone());
    let datamanager = Arc::clone(&settings.datamanager);
    let runtime = settings.runtime.clone();

    move |name| {
        if let Some(source) = files(name)? {
            return Ok(Some(source));
        }
        // Dynamic template names carry no file extension.
        if name.contains('.') || DynamicTemplateName::parse(name).is_err() {
            return Ok(None);
        }

        match runtime.block_on(datamanager.template_source(name)) {
            Ok(source) => Ok(Some(source)),
            Err(DatamanagerError::UnknownTemplateKind(kind)) => {
                tracing::debug!(template = name, %kind, "No model configured for template kind");
                Ok(None)
            }
            Err(DatamanagerError::NotFound(msg)) => {
                tracing::warn!(template = name, "{msg}");
                Ok(None)
            }
            Err(err) => Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("could not load template '{name}'"),
            )
            .with_source(err)),
        }
    }
}
