//! `drilldown` and chart `selection` action lists.

use crate::model::DrilldownAction;
use crate::validate::Warnings;
use crate::xml::XmlElement;
use crate::xml::XmlNode;
use std::collections::HashSet;

/// Field key used for links and conditions that apply to every field.
pub const ANY_FIELD: &str = "*";

#[derive(Debug, Default)]
pub struct ParsedActions {
    pub actions: Vec<DrilldownAction>,
    pub comments: Vec<String>,
}

/// Parses a `<drilldown>` node. A node with neither children nor text gives
/// an empty list; bare text is a link on every field.
pub fn parse_drilldown(node: &XmlElement, warnings: &mut Warnings) -> ParsedActions {
    let mut parsed = ParsedActions {
        actions: Vec::new(),
        comments: node.comments().map(str::to_string).collect(),
    };
    if node.elements().next().is_none() {
        let url = node.trimmed_text();
        if !url.is_empty() {
            parsed.actions.push(DrilldownAction::Link {
                field: None,
                target: node.attr("target").map(str::to_string),
                url,
            });
        }
        return parsed;
    }
    parsed.actions = parse_actions(node, ActionScope::Drilldown, warnings);
    warn_duplicate_links(&parsed.actions, node, warnings);
    parsed
}

/// Parses a chart `<selection>` node; only token actions are allowed.
pub fn parse_selection(node: &XmlElement, warnings: &mut Warnings) -> Vec<DrilldownAction> {
    parse_actions(node, ActionScope::Selection, warnings)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActionScope {
    Drilldown,
    Condition,
    Selection,
}

fn parse_actions(
    node: &XmlElement,
    scope: ActionScope,
    warnings: &mut Warnings,
) -> Vec<DrilldownAction> {
    let mut actions = Vec::new();
    for child in &node.children {
        let XmlNode::Element(child) = child else {
            continue;
        };
        match (child.name.as_str(), scope) {
            ("set", _) => {
                let Some(token) = child.attr("token") else {
                    warnings.warn("<set> without a token is ignored", child.line());
                    continue;
                };
                actions.push(DrilldownAction::Set {
                    token: token.to_string(),
                    value: child.trimmed_text(),
                    prefix: child.attr("prefix").map(str::to_string),
                    suffix: child.attr("suffix").map(str::to_string),
                });
            }
            ("unset", _) => match child.attr("token") {
                Some(token) => actions.push(DrilldownAction::Unset {
                    token: token.to_string(),
                }),
                None => warnings.warn("<unset> without a token is ignored", child.line()),
            },
            ("link", ActionScope::Drilldown | ActionScope::Condition) => {
                actions.push(DrilldownAction::Link {
                    field: child.attr("field").map(str::to_string),
                    target: child.attr("target").map(str::to_string),
                    url: child.trimmed_text(),
                });
            }
            ("condition", ActionScope::Drilldown) => {
                actions.push(DrilldownAction::Condition {
                    field: child.attr("field").unwrap_or(ANY_FIELD).to_string(),
                    actions: parse_actions(child, ActionScope::Condition, warnings),
                });
            }
            (other, ActionScope::Selection) => warnings.warn(
                format!("<{other}> is not allowed in <selection>"),
                child.line(),
            ),
            (other, _) => warnings.warn(
                format!("unrecognised drilldown action <{other}>"),
                child.line(),
            ),
        }
    }
    actions
}

fn warn_duplicate_links(actions: &[DrilldownAction], node: &XmlElement, warnings: &mut Warnings) {
    let mut seen = HashSet::new();
    for action in actions {
        if let DrilldownAction::Link { field, .. } = action {
            let field = field.as_deref().unwrap_or(ANY_FIELD);
            if !seen.insert(field) {
                warnings.warn(
                    format!("duplicate drilldown link for field \"{field}\""),
                    node.line(),
                );
            }
        }
    }
}
