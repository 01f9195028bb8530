//! Table `format` nodes and their nested `option`/`list` trees.

use crate::error::Result;
use crate::error::ViewError;
use crate::model::Format;
use crate::model::FormatValue;
use crate::validate::Warnings;
use crate::xml::XmlElement;
use indexmap::IndexMap;

pub const MAX_FORMAT_DEPTH: usize = 32;

/// Parses one `<format>`; returns the field it applies to and the format.
pub fn parse_format(node: &XmlElement, warnings: &mut Warnings) -> Result<(String, Format)> {
    let field = node
        .attr("field")
        .unwrap_or(crate::drilldown::ANY_FIELD)
        .to_string();
    let Some(kind) = node.attr("type") else {
        return Err(ViewError::invalid(
            "<format> requires a type attribute",
            node.line(),
        ));
    };
    let options = match format_value(node, 1, warnings)? {
        FormatValue::Text(text) if text.is_empty() => FormatValue::Map(IndexMap::new()),
        value => value,
    };
    Ok((
        field,
        Format {
            kind: kind.to_string(),
            options,
        },
    ))
}

fn format_value(node: &XmlElement, depth: usize, warnings: &mut Warnings) -> Result<FormatValue> {
    if depth > MAX_FORMAT_DEPTH {
        return Err(ViewError::invalid(
            format!("format options nest deeper than {MAX_FORMAT_DEPTH} levels"),
            node.line(),
        ));
    }
    let options: Vec<&XmlElement> = node.children_named("option").collect();
    let lists: Vec<&XmlElement> = node.children_named("list").collect();
    if !options.is_empty() && !lists.is_empty() {
        warnings.warn(
            format!("<{}> mixes <list> and <option> children; lists are ignored", node.name),
            node.line(),
        );
    }

    if !options.is_empty() {
        if node.name == "list" {
            let items = options
                .into_iter()
                .map(|option| format_value(option, depth + 1, warnings))
                .collect::<Result<Vec<_>>>()?;
            return Ok(FormatValue::List(items));
        }
        let mut map = IndexMap::new();
        for option in options {
            let Some(name) = option.attr("name") else {
                warnings.warn("<option> without a name is ignored", option.line());
                continue;
            };
            map.insert(name.to_string(), format_value(option, depth + 1, warnings)?);
        }
        return Ok(FormatValue::Map(map));
    }

    if !lists.is_empty() {
        let mut items = lists
            .into_iter()
            .map(|list| format_value(list, depth + 1, warnings))
            .collect::<Result<Vec<_>>>()?;
        if node.name != "list" && items.len() == 1 {
            return Ok(items.remove(0));
        }
        return Ok(FormatValue::List(items));
    }

    if node.name == "list" {
        return Ok(FormatValue::List(Vec::new()));
    }
    Ok(FormatValue::Text(node.trimmed_text()))
}
