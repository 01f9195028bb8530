//! Dashboard XML to model.
//!
//! Structural problems (unknown root, unknown panel tags, mixed row content,
//! bad grouping) fail with `InvalidView`. Everything recoverable goes to the
//! warnings collector and the parse continues.

use crate::drilldown::parse_drilldown;
use crate::drilldown::parse_selection;
use crate::error::Result;
use crate::error::ViewError;
use crate::format::parse_format;
use crate::inputs::bool_attr;
use crate::inputs::parse_fieldset;
use crate::inputs::parse_input;
use crate::model::BoundSearch;
use crate::model::Dashboard;
use crate::model::DashboardKind;
use crate::model::ElementKind;
use crate::model::Fieldset;
use crate::model::Panel;
use crate::model::PanelElement;
use crate::model::Row;
use crate::model::RowLayout;
use crate::model::SearchSource;
use crate::options::coerce;
use crate::registry;
use crate::validate::Warnings;
use crate::xml::XmlElement;

/// Status buckets requested for dashboards that show an event timeline.
pub const TIMELINE_STATUS_BUCKETS: u32 = 300;

pub fn parse_dashboard(root: &XmlElement, warnings: &mut Warnings) -> Result<Dashboard> {
    let Some(kind) = DashboardKind::from_tag(&root.name) else {
        return Err(ViewError::invalid(
            format!(
                "unknown root element <{}>; expected <dashboard> or <form>",
                root.name
            ),
            root.line(),
        ));
    };
    let mut dashboard = Dashboard::new(kind);
    dashboard.label = root.attr("label").map(str::to_string);
    dashboard.description = root.attr("description").map(str::to_string);
    dashboard.on_unload_cancel_jobs = bool_attr(root, "onunloadCancelJobs", false, warnings);
    dashboard.scripts = split_list(root.attr("script"));
    dashboard.stylesheets = split_list(root.attr("stylesheet"));
    dashboard.comments = root.comments().map(str::to_string).collect();

    let mut template = None;
    let mut earliest = None;
    let mut latest = None;
    for child in root.elements() {
        match child.name.as_str() {
            "label" => dashboard.label = Some(child.trimmed_text()),
            "description" => dashboard.description = Some(child.trimmed_text()),
            "searchTemplate" => template = Some(child.trimmed_text()),
            "earliestTime" => earliest = Some(child.trimmed_text()),
            "latestTime" => latest = Some(child.trimmed_text()),
            "fieldset" if kind == DashboardKind::Form => {
                dashboard.fieldset = Some(parse_fieldset(child, warnings)?);
            }
            "fieldset" => warnings.warn(
                "<fieldset> is only allowed in <form>; ignored",
                child.line(),
            ),
            "row" => dashboard.rows.push(parse_row(child, warnings)?),
            other => warnings.warn(
                format!("unrecognised <{other}> in <{}> is ignored", kind.tag()),
                child.line(),
            ),
        }
    }

    match template {
        Some(query) => {
            let mut search = BoundSearch::new(SearchSource::Template { query });
            search.earliest = earliest;
            search.latest = latest;
            dashboard.master_search = Some(search);
        }
        None if earliest.is_some() || latest.is_some() => warnings.warn(
            "earliestTime/latestTime ignored: the dashboard has no searchTemplate",
            root.line(),
        ),
        None => {}
    }

    if dashboard
        .elements()
        .any(|element| element.kind == ElementKind::Event)
    {
        dashboard.status_buckets = TIMELINE_STATUS_BUCKETS;
    }
    Ok(dashboard)
}

fn parse_row(node: &XmlElement, warnings: &mut Warnings) -> Result<Row> {
    let (depends, rejects) = token_predicates(node, warnings);
    let mut panels = Vec::new();
    let mut elements = Vec::new();
    for child in node.elements() {
        if child.name == "panel" {
            panels.push(parse_panel(child, warnings)?);
        } else if let Some(registration) = registry::lookup(&child.name) {
            elements.push(registration.build(child, warnings)?);
        } else {
            return Err(unrecognised_element(child));
        }
    }

    if !panels.is_empty() && !elements.is_empty() {
        return Err(ViewError::invalid(
            "row mixes <panel> wrappers with bare visualizations",
            node.line(),
        ));
    }
    let grouping = node
        .attr("grouping")
        .map(|raw| parse_grouping(raw, node))
        .transpose()?;

    let layout = if panels.is_empty() {
        RowLayout::Elements
    } else {
        RowLayout::Panels
    };
    if layout == RowLayout::Elements {
        if elements.is_empty() {
            warnings.warn("empty row", node.line());
        }
        panels = group_elements(elements, grouping.as_deref(), node)?;
    } else if grouping.is_some() {
        return Err(ViewError::invalid(
            "grouping applies only to rows of bare visualizations",
            node.line(),
        ));
    }

    Ok(Row {
        layout,
        grouping,
        panels,
        depends,
        rejects,
        line: node.line,
    })
}

fn parse_grouping(raw: &str, node: &XmlElement) -> Result<Vec<usize>> {
    raw.split(',')
        .map(|part| match part.trim().parse::<usize>() {
            Ok(size) if size > 0 => Ok(size),
            _ => Err(ViewError::invalid(
                format!("malformed row grouping \"{raw}\""),
                node.line(),
            )),
        })
        .collect()
}

fn group_elements(
    elements: Vec<PanelElement>,
    grouping: Option<&[usize]>,
    node: &XmlElement,
) -> Result<Vec<Panel>> {
    let Some(grouping) = grouping else {
        return Ok(elements
            .into_iter()
            .map(|element| {
                let line = element.line;
                Panel::implicit(vec![element], line)
            })
            .collect());
    };
    let total: usize = grouping.iter().sum();
    if total != elements.len() {
        return Err(ViewError::invalid(
            format!(
                "row grouping covers {total} visualizations but the row has {}",
                elements.len()
            ),
            node.line(),
        ));
    }
    let mut remaining = elements.into_iter();
    Ok(grouping
        .iter()
        .map(|size| {
            let group: Vec<PanelElement> = remaining.by_ref().take(*size).collect();
            let line = group.first().map(|element| element.line).unwrap_or(node.line);
            Panel::implicit(group, line)
        })
        .collect())
}

fn parse_panel(node: &XmlElement, warnings: &mut Warnings) -> Result<Panel> {
    let (depends, rejects) = token_predicates(node, warnings);
    let mut panel = Panel::implicit(Vec::new(), node.line);
    panel.id = node.attr("id").map(str::to_string);
    panel.depends = depends;
    panel.rejects = rejects;
    for child in node.elements() {
        match child.name.as_str() {
            "title" => panel.title = Some(child.trimmed_text()),
            "fieldset" => {
                let parsed = parse_fieldset(child, warnings)?;
                let fieldset = panel.fieldset.get_or_insert_with(Fieldset::default);
                fieldset.inputs.extend(parsed.inputs);
                fieldset.html.extend(parsed.html);
            }
            "input" => {
                let fieldset = panel.fieldset.get_or_insert_with(Fieldset::default);
                let input = parse_input(child, fieldset.submit_button, warnings)?;
                fieldset.inputs.push(input);
            }
            tag => match registry::lookup(tag) {
                Some(registration) => panel.elements.push(registration.build(child, warnings)?),
                None => return Err(unrecognised_element(child)),
            },
        }
    }
    Ok(panel)
}

fn unrecognised_element(node: &XmlElement) -> ViewError {
    ViewError::invalid(
        format!("unrecognised panel element <{}>", node.name),
        node.line(),
    )
}

pub(crate) fn parse_html(node: &XmlElement, warnings: &mut Warnings) -> Result<PanelElement> {
    let mut element = PanelElement::new(ElementKind::Html);
    element.line = node.line;
    element.id = node.attr("id").map(str::to_string);
    (element.depends, element.rejects) = token_predicates(node, warnings);
    element.html = Some(node.inner_xml());
    Ok(element)
}

pub(crate) fn parse_visualization(
    kind: ElementKind,
    node: &XmlElement,
    warnings: &mut Warnings,
) -> Result<PanelElement> {
    let mut element = PanelElement::new(kind);
    element.line = node.line;
    element.id = node.attr("id").map(str::to_string);
    (element.depends, element.rejects) = token_predicates(node, warnings);
    element.comments = node.comments().map(str::to_string).collect();

    let mut bindings = SearchBindings::default();
    for child in node.elements() {
        match child.name.as_str() {
            "title" => element.title = Some(child.trimmed_text()),
            "earliestTime" => bindings.earliest = Some(child.trimmed_text()),
            "latestTime" => bindings.latest = Some(child.trimmed_text()),
            "searchString" => bindings.set_template(child, "searchString")?,
            "searchTemplate" => bindings.set_template(child, "searchTemplate")?,
            "searchName" => bindings.saved = Some(child.trimmed_text()),
            "searchPostProcess" => bindings.post_process = Some(child.trimmed_text()),
            "fields" => element.fields = Some(parse_fields(child, warnings)),
            "option" => {
                let Some(name) = child.attr("name") else {
                    warnings.warn("<option> without a name is ignored", child.line());
                    continue;
                };
                let (value, problem) = coerce(kind, name, &child.text());
                if let Some(problem) = problem {
                    warnings.warn(problem, child.line());
                }
                element.options.insert(name.to_string(), value);
            }
            "drilldown" => {
                let parsed = parse_drilldown(child, warnings);
                element.drilldown = Some(parsed.actions);
                element.drilldown_comments = parsed.comments;
            }
            "selection" if kind == ElementKind::Chart => {
                element.selection = Some(parse_selection(child, warnings));
            }
            "format" if kind == ElementKind::Table => {
                let (field, format) = parse_format(child, warnings)?;
                element.formats.entry(field).or_default().push(format);
            }
            other => warnings.warn(
                format!("unrecognised <{other}> in <{}> is ignored", kind.tag()),
                child.line(),
            ),
        }
    }
    element.search = bindings.resolve(node, warnings)?;
    Ok(element)
}

#[derive(Default)]
struct SearchBindings {
    template: Option<(String, &'static str)>,
    saved: Option<String>,
    post_process: Option<String>,
    earliest: Option<String>,
    latest: Option<String>,
}

impl SearchBindings {
    fn set_template(&mut self, node: &XmlElement, tag: &'static str) -> Result<()> {
        if let Some((_, previous)) = &self.template {
            return Err(ViewError::invalid(
                format!("element has both <{previous}> and <{tag}>"),
                node.line(),
            ));
        }
        self.template = Some((node.trimmed_text(), tag));
        Ok(())
    }

    /// Exactly one of: inline template, saved search, or post-process
    /// (optionally over an inline template).
    fn resolve(self, node: &XmlElement, warnings: &mut Warnings) -> Result<Option<BoundSearch>> {
        let template = self.template.map(|(query, _)| query);
        let source = match (template, self.saved, self.post_process) {
            (None, None, None) => {
                if self.earliest.is_some() || self.latest.is_some() {
                    warnings.warn(
                        "earliestTime/latestTime ignored: the element has no search",
                        node.line(),
                    );
                }
                return Ok(None);
            }
            (Some(query), None, None) => SearchSource::Template { query },
            (None, Some(name), None) => SearchSource::Saved { name },
            (base, None, Some(query)) => SearchSource::PostProcess { query, base },
            (_, Some(_), _) => {
                return Err(ViewError::invalid(
                    "a saved search cannot be combined with another search on one element",
                    node.line(),
                ));
            }
        };
        let mut search = BoundSearch::new(source);
        search.earliest = self.earliest;
        search.latest = self.latest;
        Ok(Some(search))
    }
}

fn parse_fields(node: &XmlElement, warnings: &mut Warnings) -> Vec<String> {
    let raw = node.trimmed_text();
    if raw.starts_with('[') {
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(fields) => return fields,
            Err(err) => warnings.warn(
                format!("<fields> looks like a JSON list but does not parse: {err}"),
                node.line(),
            ),
        }
    }
    split_list(Some(raw.trim_matches(|c| c == '[' || c == ']')))
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|raw| {
        raw.split(',')
            .map(|part| part.trim().trim_matches('"').to_string())
            .filter(|part| !part.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

/// Reads `depends`/`rejects` token lists such as `$a$,$b$`.
pub(crate) fn token_predicates(
    node: &XmlElement,
    warnings: &mut Warnings,
) -> (Vec<String>, Vec<String>) {
    let mut read = |name: &str| {
        let Some(raw) = node.attr(name) else {
            return Vec::new();
        };
        raw.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                match part
                    .strip_prefix('$')
                    .and_then(|rest| rest.strip_suffix('$'))
                    .filter(|token| !token.is_empty())
                {
                    Some(token) => token.to_string(),
                    None => {
                        warnings.warn(
                            format!("{name}=\"{raw}\": \"{part}\" is not a $token$ expression"),
                            node.line(),
                        );
                        part.trim_matches('$').to_string()
                    }
                }
            })
            .collect()
    };
    let depends = read("depends");
    let rejects = read("rejects");
    (depends, rejects)
}
