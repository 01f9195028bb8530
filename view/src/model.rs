//! Typed dashboard model produced by the parser.
//!
//! Source lines are carried for diagnostics but compare equal, so two models
//! parsed from differently formatted documents are equal when their content is.

use crate::xml::SourceLine;
use indexmap::IndexMap;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DashboardKind {
    Dashboard,
    Form,
}

impl DashboardKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "dashboard" => Some(DashboardKind::Dashboard),
            "form" => Some(DashboardKind::Form),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            DashboardKind::Dashboard => "dashboard",
            DashboardKind::Form => "form",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub kind: DashboardKind,
    pub label: Option<String>,
    pub description: Option<String>,
    pub scripts: Vec<String>,
    pub stylesheets: Vec<String>,
    pub on_unload_cancel_jobs: bool,
    pub master_search: Option<BoundSearch>,
    pub master_context: Option<String>,
    pub status_buckets: u32,
    pub fieldset: Option<Fieldset>,
    pub rows: Vec<Row>,
    #[serde(skip)]
    pub comments: Vec<String>,
}

impl Dashboard {
    pub fn new(kind: DashboardKind) -> Self {
        Self {
            kind,
            label: None,
            description: None,
            scripts: Vec::new(),
            stylesheets: Vec::new(),
            on_unload_cancel_jobs: false,
            master_search: None,
            master_context: None,
            status_buckets: 0,
            fieldset: None,
            rows: Vec::new(),
            comments: Vec::new(),
        }
    }

    pub fn elements(&self) -> impl Iterator<Item = &PanelElement> {
        self.rows
            .iter()
            .flat_map(|row| row.panels.iter())
            .flat_map(|panel| panel.elements.iter())
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut PanelElement> {
        self.rows
            .iter_mut()
            .flat_map(|row| row.panels.iter_mut())
            .flat_map(|panel| panel.elements.iter_mut())
    }

    /// Dashboard-level inputs first, then panel inputs in document order.
    pub fn inputs(&self) -> impl Iterator<Item = &FormInput> {
        let panel_inputs = self
            .rows
            .iter()
            .flat_map(|row| row.panels.iter())
            .filter_map(|panel| panel.fieldset.as_ref())
            .flat_map(|fieldset| fieldset.inputs.iter());
        self.fieldset
            .iter()
            .flat_map(|fieldset| fieldset.inputs.iter())
            .chain(panel_inputs)
    }

    pub fn inputs_mut(&mut self) -> impl Iterator<Item = &mut FormInput> {
        let panel_inputs = self
            .rows
            .iter_mut()
            .flat_map(|row| row.panels.iter_mut())
            .filter_map(|panel| panel.fieldset.as_mut())
            .flat_map(|fieldset| fieldset.inputs.iter_mut());
        self.fieldset
            .iter_mut()
            .flat_map(|fieldset| fieldset.inputs.iter_mut())
            .chain(panel_inputs)
    }

    pub fn find_element(&self, id: &str) -> Option<&PanelElement> {
        self.elements()
            .find(|element| element.id.as_deref() == Some(id))
    }
}

/// How a row was written in the source: explicit `panel` wrappers or bare
/// visualizations laid out one panel each (or per `grouping`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowLayout {
    Panels,
    Elements,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub layout: RowLayout,
    pub grouping: Option<Vec<usize>>,
    pub panels: Vec<Panel>,
    pub depends: Vec<String>,
    pub rejects: Vec<String>,
    #[serde(skip)]
    pub line: SourceLine,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Panel {
    pub id: Option<String>,
    pub title: Option<String>,
    pub elements: Vec<PanelElement>,
    pub fieldset: Option<Fieldset>,
    pub depends: Vec<String>,
    pub rejects: Vec<String>,
    #[serde(skip)]
    pub line: SourceLine,
}

impl Panel {
    pub fn implicit(elements: Vec<PanelElement>, line: SourceLine) -> Self {
        Self {
            id: None,
            title: None,
            elements,
            fieldset: None,
            depends: Vec::new(),
            rejects: Vec::new(),
            line,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Single,
    Chart,
    Table,
    Html,
    Map,
    Event,
    List,
}

impl ElementKind {
    pub fn tag(self) -> &'static str {
        match self {
            ElementKind::Single => "single",
            ElementKind::Chart => "chart",
            ElementKind::Table => "table",
            ElementKind::Html => "html",
            ElementKind::Map => "map",
            ElementKind::Event => "event",
            ElementKind::List => "list",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelElement {
    pub kind: ElementKind,
    pub id: Option<String>,
    pub title: Option<String>,
    pub search: Option<BoundSearch>,
    /// Search context the element reads from: its own, or the master's.
    pub context_id: Option<String>,
    pub options: IndexMap<String, OptionValue>,
    pub fields: Option<Vec<String>>,
    pub drilldown: Option<Vec<DrilldownAction>>,
    pub selection: Option<Vec<DrilldownAction>>,
    pub formats: IndexMap<String, Vec<Format>>,
    pub html: Option<String>,
    pub depends: Vec<String>,
    pub rejects: Vec<String>,
    #[serde(skip)]
    pub comments: Vec<String>,
    #[serde(skip)]
    pub drilldown_comments: Vec<String>,
    #[serde(skip)]
    pub line: SourceLine,
}

impl PanelElement {
    pub fn new(kind: ElementKind) -> Self {
        Self {
            kind,
            id: None,
            title: None,
            search: None,
            context_id: None,
            options: IndexMap::new(),
            fields: None,
            drilldown: None,
            selection: None,
            formats: IndexMap::new(),
            html: None,
            depends: Vec::new(),
            rejects: Vec::new(),
            comments: Vec::new(),
            drilldown_comments: Vec::new(),
            line: SourceLine::default(),
        }
    }

    /// `template`, `saved` or `postprocess`; `None` when the element reads
    /// the master search.
    pub fn search_mode(&self) -> Option<&'static str> {
        self.search.as_ref().map(|search| search.source.mode())
    }

    pub fn search_command(&self) -> Option<&str> {
        self.search.as_ref().and_then(|search| search.source.command())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "searchMode")]
pub enum SearchSource {
    #[serde(rename = "template")]
    Template {
        #[serde(rename = "searchCommand")]
        query: String,
    },
    #[serde(rename = "saved")]
    Saved {
        #[serde(rename = "searchName")]
        name: String,
    },
    /// Post-process over `base` when given, else over the master search.
    #[serde(rename = "postprocess")]
    PostProcess {
        #[serde(rename = "searchPostProcess")]
        query: String,
        #[serde(rename = "searchCommand")]
        base: Option<String>,
    },
}

impl SearchSource {
    pub fn mode(&self) -> &'static str {
        match self {
            SearchSource::Template { .. } => "template",
            SearchSource::Saved { .. } => "saved",
            SearchSource::PostProcess { .. } => "postprocess",
        }
    }

    pub fn command(&self) -> Option<&str> {
        match self {
            SearchSource::Template { query } => Some(query),
            SearchSource::Saved { .. } => None,
            SearchSource::PostProcess { base, .. } => base.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundSearch {
    #[serde(flatten)]
    pub source: SearchSource,
    pub earliest: Option<String>,
    pub latest: Option<String>,
    /// Context whose results a post-process runs over.
    pub parent_context: Option<String>,
}

impl BoundSearch {
    pub fn new(source: SearchSource) -> Self {
        Self {
            source,
            earliest: None,
            latest: None,
            parent_context: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl std::fmt::Display for OptionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionValue::Bool(value) => write!(f, "{value}"),
            OptionValue::Int(value) => write!(f, "{value}"),
            OptionValue::Float(value) => write!(f, "{value}"),
            OptionValue::Text(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DrilldownAction {
    Set {
        token: String,
        value: String,
        prefix: Option<String>,
        suffix: Option<String>,
    },
    Unset {
        token: String,
    },
    Link {
        field: Option<String>,
        target: Option<String>,
        url: String,
    },
    Condition {
        field: String,
        actions: Vec<DrilldownAction>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Format {
    #[serde(rename = "type")]
    pub kind: String,
    pub options: FormatValue,
}

/// Option tree of a table `format`: text leaves, named `option` maps and
/// `list` sequences.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FormatValue {
    Text(String),
    List(Vec<FormatValue>),
    Map(IndexMap<String, FormatValue>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fieldset {
    pub autorun: bool,
    pub submit_button: bool,
    pub inputs: Vec<FormInput>,
    pub html: Vec<String>,
}

impl Default for Fieldset {
    fn default() -> Self {
        Self {
            autorun: false,
            submit_button: true,
            inputs: Vec::new(),
            html: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Text,
    Dropdown,
    Radio,
    Time,
    Multiselect,
    Checkbox,
    Link,
}

impl InputKind {
    pub const ALL: [InputKind; 7] = [
        InputKind::Text,
        InputKind::Dropdown,
        InputKind::Radio,
        InputKind::Time,
        InputKind::Multiselect,
        InputKind::Checkbox,
        InputKind::Link,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            InputKind::Text => "text",
            InputKind::Dropdown => "dropdown",
            InputKind::Radio => "radio",
            InputKind::Time => "time",
            InputKind::Multiselect => "multiselect",
            InputKind::Checkbox => "checkbox",
            InputKind::Link => "link",
        }
    }

    pub fn from_type(value: &str) -> Option<Self> {
        let lower = value.trim().to_ascii_lowercase();
        InputKind::ALL.into_iter().find(|kind| kind.as_str() == lower)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InputDefault {
    Value(String),
    TimeRange {
        earliest: Option<String>,
        latest: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulatingSearch {
    #[serde(flatten)]
    pub search: BoundSearch,
    pub field_for_value: Option<String>,
    pub field_for_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormInput {
    pub kind: InputKind,
    pub id: Option<String>,
    pub token: Option<String>,
    pub label: Option<String>,
    pub default: Option<InputDefault>,
    pub initial_value: Option<String>,
    pub choices: Vec<Choice>,
    pub search: Option<PopulatingSearch>,
    pub context_id: Option<String>,
    pub search_when_changed: bool,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub value_prefix: Option<String>,
    pub value_suffix: Option<String>,
    pub delimiter: Option<String>,
    pub depends: Vec<String>,
    pub rejects: Vec<String>,
    #[serde(skip)]
    pub line: SourceLine,
}

impl FormInput {
    pub fn new(kind: InputKind) -> Self {
        Self {
            kind,
            id: None,
            token: None,
            label: None,
            default: None,
            initial_value: None,
            choices: Vec::new(),
            search: None,
            context_id: None,
            search_when_changed: false,
            prefix: None,
            suffix: None,
            value_prefix: None,
            value_suffix: None,
            delimiter: None,
            depends: Vec::new(),
            rejects: Vec::new(),
            line: SourceLine::default(),
        }
    }
}
