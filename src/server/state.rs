use std::sync::Arc;

use crate::compositor::Compositor;
use crate::gallery::MemeStore;
use crate::settings;
use crate::templates::TemplateCatalog;

#[derive(Clone)]
pub struct ServerState {
    pub settings: settings::Settings,
    pub catalog: TemplateCatalog,
    pub compositor: Compositor,
    pub gallery: Arc<dyn MemeStore>,
}
