use crate::error::Result;
use crate::ids::normalize_ids;
use crate::model::Dashboard;
use crate::parse::parse_dashboard;
use crate::render::AssetBundle;
use crate::render::RenderPath;
use crate::render::ViewSettings;
use crate::render::decide_render_path;
use crate::render::render_html;
use crate::render::resolve_assets;
use crate::validate::Diagnostic;
use crate::validate::Warnings;
use crate::xml::parse_document;
use serde::Serialize;

/// Where a view comes from and which template the app registered for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppContext {
    pub app: String,
    pub view: String,
    pub template: String,
}

impl AppContext {
    pub fn new(app: impl Into<String>, view: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            view: view.into(),
            template: template.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompiledView {
    pub dashboard: Dashboard,
    pub render_path: RenderPath,
    pub bypass_module_system: bool,
    pub warnings: Vec<Diagnostic>,
    pub assets: AssetBundle,
    /// The escaped page; only produced on the escaped-HTML path.
    #[serde(skip)]
    pub html: Option<String>,
}

/// Parses, normalizes and (for simple XML views) renders a dashboard.
pub fn compile(source: &str, context: &AppContext, settings: &ViewSettings) -> Result<CompiledView> {
    let root = parse_document(source)?;
    let mut warnings = Warnings::new();
    let mut dashboard = parse_dashboard(&root, &mut warnings)?;
    normalize_ids(&mut dashboard)?;

    let render_path = decide_render_path(&context.template, settings, &mut warnings);
    let assets = resolve_assets(&dashboard, &context.app, settings, &mut warnings);
    let bypass_module_system = render_path == RenderPath::EscapedHtml;
    let html = if bypass_module_system {
        Some(render_html(&dashboard, &context.app, &context.view, &assets)?)
    } else {
        None
    };
    tracing::debug!(
        app = %context.app,
        view = %context.view,
        warnings = warnings.len(),
        bypass_module_system,
        "compiled view"
    );
    Ok(CompiledView {
        dashboard,
        render_path,
        bypass_module_system,
        warnings: warnings.into_vec(),
        assets,
        html,
    })
}
