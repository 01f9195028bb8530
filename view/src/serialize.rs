//! Model back to dashboard XML.
//!
//! Writes the normalized form: synthetic ids are written out, defaults that
//! were resolved during parsing (`searchWhenChanged`) are explicit, and
//! comments come first within their parent.

use crate::error::Result;
use crate::model::BoundSearch;
use crate::model::Dashboard;
use crate::model::DrilldownAction;
use crate::model::Fieldset;
use crate::model::Format;
use crate::model::FormInput;
use crate::model::FormatValue;
use crate::model::InputDefault;
use crate::model::Panel;
use crate::model::PanelElement;
use crate::model::Row;
use crate::model::RowLayout;
use crate::model::SearchSource;
use crate::xml::XmlElement;
use crate::xml::XmlNode;
use crate::xml::parse_document;

pub fn to_xml(dashboard: &Dashboard) -> Result<String> {
    Ok(dashboard_node(dashboard)?.to_xml())
}

fn dashboard_node(dashboard: &Dashboard) -> Result<XmlElement> {
    let mut root = XmlElement::new(dashboard.kind.tag());
    if dashboard.on_unload_cancel_jobs {
        root = root.with_attr("onunloadCancelJobs", "true");
    }
    if !dashboard.scripts.is_empty() {
        root = root.with_attr("script", dashboard.scripts.join(","));
    }
    if !dashboard.stylesheets.is_empty() {
        root = root.with_attr("stylesheet", dashboard.stylesheets.join(","));
    }
    for comment in &dashboard.comments {
        root.push_comment(comment);
    }
    push_text_child(&mut root, "label", dashboard.label.as_deref());
    push_text_child(&mut root, "description", dashboard.description.as_deref());
    if let Some(master) = &dashboard.master_search {
        if let SearchSource::Template { query } = &master.source {
            push_text_child(&mut root, "searchTemplate", Some(query));
            push_text_child(&mut root, "earliestTime", master.earliest.as_deref());
            push_text_child(&mut root, "latestTime", master.latest.as_deref());
        }
    }
    if let Some(fieldset) = &dashboard.fieldset {
        root.push(fieldset_node(fieldset)?);
    }
    for row in &dashboard.rows {
        root.push(row_node(row)?);
    }
    Ok(root)
}

fn push_text_child(parent: &mut XmlElement, name: &str, text: Option<&str>) {
    if let Some(text) = text {
        parent.push(XmlElement::new(name).with_text(text));
    }
}

fn with_tokens(mut node: XmlElement, depends: &[String], rejects: &[String]) -> XmlElement {
    if !depends.is_empty() {
        node = node.with_attr("depends", token_list(depends));
    }
    if !rejects.is_empty() {
        node = node.with_attr("rejects", token_list(rejects));
    }
    node
}

fn token_list(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|token| format!("${token}$"))
        .collect::<Vec<_>>()
        .join(",")
}

fn row_node(row: &Row) -> Result<XmlElement> {
    let mut node = with_tokens(XmlElement::new("row"), &row.depends, &row.rejects);
    match row.layout {
        RowLayout::Panels => {
            for panel in &row.panels {
                node.push(panel_node(panel)?);
            }
        }
        RowLayout::Elements => {
            if let Some(grouping) = &row.grouping {
                let grouping: Vec<String> = grouping.iter().map(usize::to_string).collect();
                node = node.with_attr("grouping", grouping.join(","));
            }
            for element in row.panels.iter().flat_map(|panel| panel.elements.iter()) {
                node.push(element_node(element)?);
            }
        }
    }
    Ok(node)
}

fn panel_node(panel: &Panel) -> Result<XmlElement> {
    let mut node = XmlElement::new("panel");
    if let Some(id) = &panel.id {
        node = node.with_attr("id", id.as_str());
    }
    node = with_tokens(node, &panel.depends, &panel.rejects);
    push_text_child(&mut node, "title", panel.title.as_deref());
    if let Some(fieldset) = &panel.fieldset {
        node.push(fieldset_node(fieldset)?);
    }
    for element in &panel.elements {
        node.push(element_node(element)?);
    }
    Ok(node)
}

fn element_node(element: &PanelElement) -> Result<XmlElement> {
    let mut node = XmlElement::new(element.kind.tag());
    if let Some(id) = &element.id {
        node = node.with_attr("id", id.as_str());
    }
    node = with_tokens(node, &element.depends, &element.rejects);
    if let Some(html) = &element.html {
        node.children = raw_children(html)?;
        return Ok(node);
    }
    for comment in &element.comments {
        node.push_comment(comment);
    }
    push_text_child(&mut node, "title", element.title.as_deref());
    if let Some(search) = &element.search {
        push_search(&mut node, search);
    }
    if let Some(fields) = &element.fields {
        push_text_child(&mut node, "fields", Some(&fields.join(", ")));
    }
    for (name, value) in &element.options {
        node.push(
            XmlElement::new("option")
                .with_attr("name", name.as_str())
                .with_text(value.to_string()),
        );
    }
    for (field, formats) in &element.formats {
        for format in formats {
            node.push(format_node(field, format));
        }
    }
    if let Some(actions) = &element.drilldown {
        let mut drilldown = XmlElement::new("drilldown");
        for comment in &element.drilldown_comments {
            drilldown.push_comment(comment);
        }
        push_actions(&mut drilldown, actions);
        node.push(drilldown);
    }
    if let Some(actions) = &element.selection {
        let mut selection = XmlElement::new("selection");
        push_actions(&mut selection, actions);
        node.push(selection);
    }
    Ok(node)
}

/// Re-reads serialized `html` content so it nests as markup, not text.
fn raw_children(html: &str) -> Result<Vec<XmlNode>> {
    let wrapper = parse_document(&format!("<html>{html}</html>"))?;
    Ok(wrapper.children)
}

fn push_search(node: &mut XmlElement, search: &BoundSearch) {
    match &search.source {
        SearchSource::Template { query } => {
            push_text_child(node, "searchString", Some(query));
        }
        SearchSource::Saved { name } => {
            push_text_child(node, "searchName", Some(name));
        }
        SearchSource::PostProcess { query, base } => {
            push_text_child(node, "searchTemplate", base.as_deref());
            push_text_child(node, "searchPostProcess", Some(query));
        }
    }
    push_text_child(node, "earliestTime", search.earliest.as_deref());
    push_text_child(node, "latestTime", search.latest.as_deref());
}

fn push_actions(node: &mut XmlElement, actions: &[DrilldownAction]) {
    for action in actions {
        let child = match action {
            DrilldownAction::Set {
                token,
                value,
                prefix,
                suffix,
            } => {
                let mut set = XmlElement::new("set").with_attr("token", token.as_str());
                if let Some(prefix) = prefix {
                    set = set.with_attr("prefix", prefix.as_str());
                }
                if let Some(suffix) = suffix {
                    set = set.with_attr("suffix", suffix.as_str());
                }
                set.with_text(value.as_str())
            }
            DrilldownAction::Unset { token } => {
                XmlElement::new("unset").with_attr("token", token.as_str())
            }
            DrilldownAction::Link { field, target, url } => {
                let mut link = XmlElement::new("link");
                if let Some(field) = field {
                    link = link.with_attr("field", field.as_str());
                }
                if let Some(target) = target {
                    link = link.with_attr("target", target.as_str());
                }
                link.with_text(url.as_str())
            }
            DrilldownAction::Condition { field, actions } => {
                let mut condition = XmlElement::new("condition").with_attr("field", field.as_str());
                push_actions(&mut condition, actions);
                condition
            }
        };
        node.push(child);
    }
}

fn format_node(field: &str, format: &Format) -> XmlElement {
    let mut node = XmlElement::new("format")
        .with_attr("type", format.kind.as_str())
        .with_attr("field", field);
    push_format_value(&mut node, &format.options);
    node
}

fn push_format_value(node: &mut XmlElement, value: &FormatValue) {
    match value {
        FormatValue::Text(text) => {
            if !text.is_empty() {
                node.children.push(XmlNode::Text(text.clone()));
            }
        }
        FormatValue::Map(entries) => {
            for (name, entry) in entries {
                let mut option = XmlElement::new("option").with_attr("name", name.as_str());
                push_format_value(&mut option, entry);
                node.push(option);
            }
        }
        FormatValue::List(items) => {
            let mut list = XmlElement::new("list");
            push_list_items(&mut list, items);
            node.push(list);
        }
    }
}

fn push_list_items(list: &mut XmlElement, items: &[FormatValue]) {
    for item in items {
        match item {
            FormatValue::List(inner) => {
                let mut nested = XmlElement::new("list");
                push_list_items(&mut nested, inner);
                list.push(nested);
            }
            other => {
                let mut option = XmlElement::new("option");
                push_format_value(&mut option, other);
                list.push(option);
            }
        }
    }
}

fn fieldset_node(fieldset: &Fieldset) -> Result<XmlElement> {
    let mut node = XmlElement::new("fieldset")
        .with_attr("autoRun", fieldset.autorun.to_string())
        .with_attr("submitButton", fieldset.submit_button.to_string());
    for input in &fieldset.inputs {
        node.push(input_node(input));
    }
    for html in &fieldset.html {
        let mut wrapper = XmlElement::new("html");
        wrapper.children = raw_children(html)?;
        node.push(wrapper);
    }
    Ok(node)
}

fn input_node(input: &FormInput) -> XmlElement {
    let mut node = XmlElement::new("input").with_attr("type", input.kind.as_str());
    if let Some(id) = &input.id {
        node = node.with_attr("id", id.as_str());
    }
    if let Some(token) = &input.token {
        node = node.with_attr("token", token.as_str());
    }
    node = node.with_attr("searchWhenChanged", input.search_when_changed.to_string());
    node = with_tokens(node, &input.depends, &input.rejects);
    push_text_child(&mut node, "label", input.label.as_deref());
    match &input.default {
        Some(InputDefault::Value(value)) => push_text_child(&mut node, "default", Some(value)),
        Some(InputDefault::TimeRange { earliest, latest }) => {
            let mut default = XmlElement::new("default");
            push_text_child(&mut default, "earliest", earliest.as_deref());
            push_text_child(&mut default, "latest", latest.as_deref());
            node.push(default);
        }
        None => {}
    }
    push_text_child(&mut node, "initialValue", input.initial_value.as_deref());
    for choice in &input.choices {
        node.push(
            XmlElement::new("choice")
                .with_attr("value", choice.value.as_str())
                .with_text(choice.label.as_str()),
        );
    }
    if let Some(populating) = &input.search {
        let (tag, text) = match &populating.search.source {
            SearchSource::Saved { name } => ("populatingSavedSearch", name.as_str()),
            SearchSource::Template { query } => ("populatingSearch", query.as_str()),
            SearchSource::PostProcess { query, .. } => ("populatingSearch", query.as_str()),
        };
        let mut search = XmlElement::new(tag);
        for (name, value) in [
            ("fieldForValue", &populating.field_for_value),
            ("fieldForLabel", &populating.field_for_label),
            ("earliest", &populating.search.earliest),
            ("latest", &populating.search.latest),
        ] {
            if let Some(value) = value {
                search = search.with_attr(name, value.as_str());
            }
        }
        node.push(search.with_text(text));
    }
    for (name, value) in [
        ("prefix", &input.prefix),
        ("suffix", &input.suffix),
        ("valuePrefix", &input.value_prefix),
        ("valueSuffix", &input.value_suffix),
        ("delimiter", &input.delimiter),
    ] {
        push_text_child(&mut node, name, value.as_deref());
    }
    node
}
