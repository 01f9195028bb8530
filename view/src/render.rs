//! Render-path decision, asset resolution and the escaped HTML page.

use crate::error::Result;
use crate::model::Dashboard;
use crate::model::Fieldset;
use crate::model::Panel;
use crate::model::PanelElement;
use crate::model::Row;
use crate::validate::Warnings;
use html_escape::encode_double_quoted_attribute;
use html_escape::encode_text;
use serde::Deserialize;
use serde::Serialize;

/// Stylesheets and scripts every simple XML page loads, relative to the
/// static prefix.
pub const BASE_CSS: &[&str] = &["build/css/bootstrap.min.css", "build/simplexml/dashboard.css"];
pub const BASE_JS: &[&str] = &["build/simplexml/index.js"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewSettings {
    /// Template that marks a view as simple XML.
    pub dashboard_template: String,
    /// Older name for the same template; still honoured, with a warning.
    pub legacy_dashboard_template: String,
    pub static_prefix: String,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            dashboard_template: "pages/dashboard.html".to_string(),
            legacy_dashboard_template: "simplexml/dashboard.html".to_string(),
            static_prefix: "/static".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderPath {
    EscapedHtml,
    ModuleSystem,
}

pub fn decide_render_path(
    template: &str,
    settings: &ViewSettings,
    warnings: &mut Warnings,
) -> RenderPath {
    if template == settings.dashboard_template {
        RenderPath::EscapedHtml
    } else if template == settings.legacy_dashboard_template {
        tracing::warn!(
            template,
            replacement = %settings.dashboard_template,
            "deprecated dashboard template alias"
        );
        warnings.warn(
            format!(
                "template \"{template}\" is deprecated; use \"{}\"",
                settings.dashboard_template
            ),
            None,
        );
        RenderPath::EscapedHtml
    } else {
        RenderPath::ModuleSystem
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssetBundle {
    pub css: Vec<String>,
    pub js: Vec<String>,
}

impl AssetBundle {
    fn push_css(&mut self, url: String) {
        if !self.css.contains(&url) {
            self.css.push(url);
        }
    }

    fn push_js(&mut self, url: String) {
        if !self.js.contains(&url) {
            self.js.push(url);
        }
    }
}

/// Base bundle plus the dashboard's own `script`/`stylesheet` references.
/// `other_app:file` points into another app; references that try to leave
/// the app's static directory are dropped with a warning.
pub fn resolve_assets(
    dashboard: &Dashboard,
    app: &str,
    settings: &ViewSettings,
    warnings: &mut Warnings,
) -> AssetBundle {
    let prefix = settings.static_prefix.trim_end_matches('/');
    let mut bundle = AssetBundle::default();
    for css in BASE_CSS {
        bundle.push_css(format!("{prefix}/{css}"));
    }
    for js in BASE_JS {
        bundle.push_js(format!("{prefix}/{js}"));
    }
    for reference in &dashboard.stylesheets {
        match resolve_reference(reference, app, prefix) {
            Some(url) => bundle.push_css(url),
            None => warnings.warn(format!("stylesheet \"{reference}\" ignored"), None),
        }
    }
    for reference in &dashboard.scripts {
        match resolve_reference(reference, app, prefix) {
            Some(url) => bundle.push_js(url),
            None => warnings.warn(format!("script \"{reference}\" ignored"), None),
        }
    }
    bundle
}

fn resolve_reference(reference: &str, app: &str, prefix: &str) -> Option<String> {
    let (app, file) = match reference.split_once(':') {
        Some((other, file)) if !other.is_empty() => (other, file),
        _ => (app, reference),
    };
    let app_ok = !app.is_empty()
        && app != "."
        && app != ".."
        && app
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    let file_ok = !file.is_empty()
        && !file.starts_with('/')
        && !file.contains('\\')
        && file.split('/').all(|segment| segment != ".." && !segment.is_empty());
    (app_ok && file_ok).then(|| format!("{prefix}/app/{app}/{file}"))
}

/// Escapes JSON for embedding in a `<script>` element.
pub fn script_safe_json(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            other => out.push(other),
        }
    }
    out
}

#[derive(Serialize)]
struct PageConfig<'a> {
    app: &'a str,
    view: &'a str,
    dashboard: &'a Dashboard,
}

/// Renders the page for the escaped-HTML path. All model text is escaped;
/// `html` panels are emitted as authored.
pub fn render_html(
    dashboard: &Dashboard,
    app: &str,
    view: &str,
    assets: &AssetBundle,
) -> Result<String> {
    let config = serde_json::to_string(&PageConfig {
        app,
        view,
        dashboard,
    })?;
    let title = dashboard.label.as_deref().unwrap_or(view);

    let mut out = String::new();
    out.push_str("<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str(&format!("<title>{}</title>\n", encode_text(title)));
    for css in &assets.css {
        out.push_str(&format!(
            "<link rel=\"stylesheet\" href=\"{}\">\n",
            encode_double_quoted_attribute(css)
        ));
    }
    out.push_str("</head>\n");
    out.push_str(&format!(
        "<body class=\"simplexml {}\" data-app=\"{}\" data-view=\"{}\">\n",
        dashboard.kind.tag(),
        encode_double_quoted_attribute(app),
        encode_double_quoted_attribute(view)
    ));

    out.push_str("<header class=\"dashboard-header\">\n");
    out.push_str(&format!("<h1>{}</h1>\n", encode_text(title)));
    if let Some(description) = &dashboard.description {
        out.push_str(&format!(
            "<p class=\"description\">{}</p>\n",
            encode_text(description)
        ));
    }
    out.push_str("</header>\n");

    if let Some(fieldset) = &dashboard.fieldset {
        render_fieldset(fieldset, &mut out);
    }
    out.push_str("<div class=\"dashboard-body\">\n");
    for row in &dashboard.rows {
        render_row(row, &mut out);
    }
    out.push_str("</div>\n");

    out.push_str(&format!(
        "<script type=\"application/json\" id=\"view-config\">{}</script>\n",
        script_safe_json(&config)
    ));
    for js in &assets.js {
        out.push_str(&format!(
            "<script src=\"{}\"></script>\n",
            encode_double_quoted_attribute(js)
        ));
    }
    out.push_str("</body>\n</html>\n");
    Ok(out)
}

fn token_attrs(depends: &[String], rejects: &[String]) -> String {
    let mut attrs = String::new();
    if !depends.is_empty() {
        attrs.push_str(&format!(
            " data-depends=\"{}\"",
            encode_double_quoted_attribute(&depends.join(","))
        ));
    }
    if !rejects.is_empty() {
        attrs.push_str(&format!(
            " data-rejects=\"{}\"",
            encode_double_quoted_attribute(&rejects.join(","))
        ));
    }
    attrs
}

fn render_fieldset(fieldset: &Fieldset, out: &mut String) {
    out.push_str(&format!(
        "<form class=\"fieldset\" data-autorun=\"{}\">\n",
        fieldset.autorun
    ));
    for input in &fieldset.inputs {
        out.push_str(&format!(
            "<div class=\"input input-{}\" id=\"{}\" data-token=\"{}\" data-search-when-changed=\"{}\"{}>",
            input.kind.as_str(),
            encode_double_quoted_attribute(input.id.as_deref().unwrap_or_default()),
            encode_double_quoted_attribute(input.token.as_deref().unwrap_or_default()),
            input.search_when_changed,
            token_attrs(&input.depends, &input.rejects),
        ));
        if let Some(label) = &input.label {
            out.push_str(&format!("<label>{}</label>", encode_text(label)));
        }
        out.push_str("</div>\n");
    }
    for html in &fieldset.html {
        out.push_str(&format!("<div class=\"html\">{html}</div>\n"));
    }
    if fieldset.submit_button {
        out.push_str("<button class=\"btn btn-primary\" type=\"submit\">Submit</button>\n");
    }
    out.push_str("</form>\n");
}

fn render_row(row: &Row, out: &mut String) {
    out.push_str(&format!(
        "<div class=\"dashboard-row\"{}>\n",
        token_attrs(&row.depends, &row.rejects)
    ));
    for panel in &row.panels {
        render_panel(panel, out);
    }
    out.push_str("</div>\n");
}

fn render_panel(panel: &Panel, out: &mut String) {
    let id = panel
        .id
        .as_deref()
        .map(|id| format!(" id=\"{}\"", encode_double_quoted_attribute(id)))
        .unwrap_or_default();
    out.push_str(&format!(
        "<div class=\"dashboard-panel\"{id}{}>\n",
        token_attrs(&panel.depends, &panel.rejects)
    ));
    if let Some(title) = &panel.title {
        out.push_str(&format!("<h2 class=\"panel-title\">{}</h2>\n", encode_text(title)));
    }
    if let Some(fieldset) = &panel.fieldset {
        render_fieldset(fieldset, out);
    }
    for element in &panel.elements {
        render_element(element, out);
    }
    out.push_str("</div>\n");
}

fn render_element(element: &PanelElement, out: &mut String) {
    let mut attrs = format!(
        " id=\"{}\"",
        encode_double_quoted_attribute(element.id.as_deref().unwrap_or_default())
    );
    if let Some(context) = &element.context_id {
        attrs.push_str(&format!(
            " data-context=\"{}\"",
            encode_double_quoted_attribute(context)
        ));
    }
    if let Some(mode) = element.search_mode() {
        attrs.push_str(&format!(" data-search-mode=\"{mode}\""));
    }
    attrs.push_str(&token_attrs(&element.depends, &element.rejects));
    out.push_str(&format!(
        "<div class=\"dashboard-element {}\"{attrs}>\n",
        element.kind.tag()
    ));
    if let Some(title) = &element.title {
        out.push_str(&format!(
            "<div class=\"panel-head\"><h3>{}</h3></div>\n",
            encode_text(title)
        ));
    }
    out.push_str("<div class=\"panel-body\">");
    if let Some(html) = &element.html {
        out.push_str(html);
    }
    out.push_str("</div>\n</div>\n");
}
