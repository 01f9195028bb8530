//! Form `fieldset` and `input` parsing.

use crate::error::Result;
use crate::error::ViewError;
use crate::model::BoundSearch;
use crate::model::Choice;
use crate::model::Fieldset;
use crate::model::FormInput;
use crate::model::InputDefault;
use crate::model::InputKind;
use crate::model::PopulatingSearch;
use crate::model::SearchSource;
use crate::options::parse_bool;
use crate::parse::token_predicates;
use crate::validate::Warnings;
use crate::xml::XmlElement;

pub fn parse_fieldset(node: &XmlElement, warnings: &mut Warnings) -> Result<Fieldset> {
    let mut fieldset = Fieldset {
        autorun: bool_attr(node, "autoRun", false, warnings),
        submit_button: bool_attr(node, "submitButton", true, warnings),
        ..Fieldset::default()
    };
    for child in node.elements() {
        match child.name.as_str() {
            "input" => {
                let input = parse_input(child, fieldset.submit_button, warnings)?;
                fieldset.inputs.push(input);
            }
            "html" => fieldset.html.push(child.inner_xml()),
            other => warnings.warn(
                format!("unrecognised <{other}> in <fieldset> is ignored"),
                child.line(),
            ),
        }
    }
    Ok(fieldset)
}

/// Parses one `<input>`. Without a submit button, inputs search as soon as
/// they change unless they say otherwise.
pub fn parse_input(
    node: &XmlElement,
    submit_button: bool,
    warnings: &mut Warnings,
) -> Result<FormInput> {
    let type_name = node.attr("type").unwrap_or("text");
    let Some(kind) = InputKind::from_type(type_name) else {
        return Err(ViewError::invalid(
            format!("unknown input type \"{type_name}\""),
            node.line(),
        ));
    };
    let mut input = FormInput::new(kind);
    input.line = node.line;
    input.id = node.attr("id").map(str::to_string);
    input.token = node.attr("token").map(str::to_string);
    input.search_when_changed = bool_attr(node, "searchWhenChanged", !submit_button, warnings);
    (input.depends, input.rejects) = token_predicates(node, warnings);
    if input.token.is_none() && kind != InputKind::Time {
        warnings.warn(
            format!("{} input has no token", kind.as_str()),
            node.line(),
        );
    }

    let mut field_for_value = None;
    let mut field_for_label = None;
    for child in node.elements() {
        match child.name.as_str() {
            "label" => input.label = Some(child.trimmed_text()),
            "default" => input.default = Some(parse_default(child)),
            "initialValue" => input.initial_value = Some(child.trimmed_text()),
            "choice" => {
                let label = child.trimmed_text();
                let value = child
                    .attr("value")
                    .map(str::to_string)
                    .unwrap_or_else(|| label.clone());
                input.choices.push(Choice { value, label });
            }
            "populatingSearch" => {
                let search = bound(child, SearchSource::Template {
                    query: child.trimmed_text(),
                });
                input.search = Some(populating(child, search));
            }
            "populatingSavedSearch" => {
                let search = bound(child, SearchSource::Saved {
                    name: child.trimmed_text(),
                });
                input.search = Some(populating(child, search));
            }
            "search" => input.search = Some(parse_search_node(child, warnings)?),
            "fieldForValue" => field_for_value = Some(child.trimmed_text()),
            "fieldForLabel" => field_for_label = Some(child.trimmed_text()),
            "prefix" => input.prefix = Some(child.text()),
            "suffix" => input.suffix = Some(child.text()),
            "valuePrefix" => input.value_prefix = Some(child.text()),
            "valueSuffix" => input.value_suffix = Some(child.text()),
            "delimiter" => input.delimiter = Some(child.text()),
            other => warnings.warn(
                format!("unrecognised <{other}> in <input> is ignored"),
                child.line(),
            ),
        }
    }

    if let Some(search) = input.search.as_mut() {
        if field_for_value.is_some() {
            search.field_for_value = field_for_value;
        }
        if field_for_label.is_some() {
            search.field_for_label = field_for_label;
        }
    } else if field_for_value.is_some() || field_for_label.is_some() {
        warnings.warn("fieldForValue/fieldForLabel without a populating search", node.line());
    }
    Ok(input)
}

fn parse_default(node: &XmlElement) -> InputDefault {
    let earliest = node.child("earliest");
    let latest = node.child("latest");
    if earliest.is_some() || latest.is_some() {
        InputDefault::TimeRange {
            earliest: earliest.map(XmlElement::trimmed_text),
            latest: latest.map(XmlElement::trimmed_text),
        }
    } else {
        InputDefault::Value(node.trimmed_text())
    }
}

fn bound(node: &XmlElement, source: SearchSource) -> BoundSearch {
    let mut search = BoundSearch::new(source);
    search.earliest = node.attr("earliest").map(str::to_string);
    search.latest = node.attr("latest").map(str::to_string);
    search
}

fn populating(node: &XmlElement, search: BoundSearch) -> PopulatingSearch {
    PopulatingSearch {
        search,
        field_for_value: node.attr("fieldForValue").map(str::to_string),
        field_for_label: node.attr("fieldForLabel").map(str::to_string),
    }
}

/// `<search><query>..</query><earliest/><latest/></search>`, or
/// `<search ref="saved name"/>`.
fn parse_search_node(node: &XmlElement, warnings: &mut Warnings) -> Result<PopulatingSearch> {
    let source = match (node.attr("ref"), node.child_text("query")) {
        (Some(name), None) => SearchSource::Saved {
            name: name.to_string(),
        },
        (None, Some(query)) => SearchSource::Template { query },
        (Some(_), Some(_)) => {
            return Err(ViewError::invalid(
                "<search> may not have both a ref and a query",
                node.line(),
            ));
        }
        (None, None) => {
            return Err(ViewError::invalid(
                "<search> needs a <query> or a ref",
                node.line(),
            ));
        }
    };
    let mut search = BoundSearch::new(source);
    search.earliest = node.child_text("earliest");
    search.latest = node.child_text("latest");
    for child in node.elements() {
        if !matches!(child.name.as_str(), "query" | "earliest" | "latest") {
            warnings.warn(
                format!("unrecognised <{}> in <search> is ignored", child.name),
                child.line(),
            );
        }
    }
    Ok(PopulatingSearch {
        search,
        field_for_value: None,
        field_for_label: None,
    })
}

pub(crate) fn bool_attr(
    node: &XmlElement,
    name: &str,
    default: bool,
    warnings: &mut Warnings,
) -> bool {
    match node.attr(name) {
        None => default,
        Some(raw) => parse_bool(raw).unwrap_or_else(|| {
            warnings.warn(
                format!("attribute {name}=\"{raw}\" is not a boolean; using {default}"),
                node.line(),
            );
            default
        }),
    }
}
