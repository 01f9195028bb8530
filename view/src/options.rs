//! Declarative coercion table for element `option` values.
//!
//! Options not listed for a kind stay text. A listed option whose text does
//! not parse keeps the raw text and produces a warning.

use crate::model::ElementKind;
use crate::model::OptionValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionType {
    Bool,
    Int,
    Float,
    Text,
}

impl OptionType {
    fn describe(self) -> &'static str {
        match self {
            OptionType::Bool => "a boolean",
            OptionType::Int => "an integer",
            OptionType::Float => "a number",
            OptionType::Text => "text",
        }
    }
}

const COMMON: &[(&str, OptionType)] = &[
    ("height", OptionType::Int),
    ("refresh.auto.interval", OptionType::Int),
    ("refresh.display", OptionType::Text),
    ("link.visible", OptionType::Bool),
];

const SINGLE: &[(&str, OptionType)] = &[
    ("beforeLabel", OptionType::Text),
    ("afterLabel", OptionType::Text),
    ("underLabel", OptionType::Text),
    ("field", OptionType::Text),
    ("classField", OptionType::Text),
    ("linkView", OptionType::Text),
    ("linkFields", OptionType::Text),
    ("drilldown", OptionType::Text),
    ("colorBy", OptionType::Text),
    ("colorMode", OptionType::Text),
    ("useColors", OptionType::Bool),
    ("useThousandSeparators", OptionType::Bool),
    ("showSparkline", OptionType::Bool),
    ("showTrendIndicator", OptionType::Bool),
    ("trendInterval", OptionType::Text),
    ("numberPrecision", OptionType::Text),
    ("rangeValues", OptionType::Text),
    ("rangeColors", OptionType::Text),
];

const CHART: &[(&str, OptionType)] = &[
    ("charting.chart", OptionType::Text),
    ("charting.drilldown", OptionType::Text),
    ("charting.legend.placement", OptionType::Text),
    ("charting.chart.nullValueMode", OptionType::Text),
    ("charting.chart.stackMode", OptionType::Text),
    ("charting.chart.showDataLabels", OptionType::Text),
    ("charting.chart.style", OptionType::Text),
    ("charting.chart.rangeValues", OptionType::Text),
    ("charting.chart.sliceCollapsingThreshold", OptionType::Float),
    ("charting.axisY.scale", OptionType::Text),
    ("charting.axisY.minimumNumber", OptionType::Float),
    ("charting.axisY.maximumNumber", OptionType::Float),
    ("charting.axisTitleX.visibility", OptionType::Text),
    ("charting.axisTitleY.visibility", OptionType::Text),
    ("charting.layout.splitSeries", OptionType::Bool),
    ("charting.chart.overlayFields", OptionType::Text),
];

const TABLE: &[(&str, OptionType)] = &[
    ("count", OptionType::Int),
    ("displayRowNumbers", OptionType::Bool),
    ("rowNumbers", OptionType::Bool),
    ("wrap", OptionType::Bool),
    ("drilldown", OptionType::Text),
    ("dataOverlayMode", OptionType::Text),
    ("totalsRow", OptionType::Bool),
    ("percentagesRow", OptionType::Bool),
];

const EVENT: &[(&str, OptionType)] = &[
    ("count", OptionType::Int),
    ("displayRowNumbers", OptionType::Bool),
    ("rowNumbers", OptionType::Bool),
    ("maxLines", OptionType::Int),
    ("segmentation", OptionType::Text),
    ("softWrap", OptionType::Bool),
    ("type", OptionType::Text),
    ("raw.drilldown", OptionType::Text),
    ("list.drilldown", OptionType::Text),
    ("list.wrap", OptionType::Bool),
    ("table.drilldown", OptionType::Text),
    ("table.wrap", OptionType::Bool),
    ("table.sortColumn", OptionType::Text),
];

const LIST: &[(&str, OptionType)] = &[
    ("labelField", OptionType::Text),
    ("valueField", OptionType::Text),
    ("labelFieldSearch", OptionType::Text),
    ("labelFieldTarget", OptionType::Text),
    ("valueFieldFormat", OptionType::Text),
    ("initialSort", OptionType::Text),
    ("initialSortDir", OptionType::Text),
];

const MAP: &[(&str, OptionType)] = &[
    ("mapping.type", OptionType::Text),
    ("mapping.map.center", OptionType::Text),
    ("mapping.map.zoom", OptionType::Int),
    ("mapping.map.scrollZoom", OptionType::Bool),
    ("mapping.map.panning", OptionType::Bool),
    ("mapping.drilldown", OptionType::Text),
    ("mapping.showTiles", OptionType::Bool),
    ("mapping.markerLayer.markerOpacity", OptionType::Float),
    ("mapping.markerLayer.markerMinSize", OptionType::Int),
    ("mapping.markerLayer.markerMaxSize", OptionType::Int),
];

fn table_for(kind: ElementKind) -> &'static [(&'static str, OptionType)] {
    match kind {
        ElementKind::Single => SINGLE,
        ElementKind::Chart => CHART,
        ElementKind::Table => TABLE,
        ElementKind::Event => EVENT,
        ElementKind::List => LIST,
        ElementKind::Map => MAP,
        ElementKind::Html => &[],
    }
}

pub fn option_type(kind: ElementKind, name: &str) -> OptionType {
    table_for(kind)
        .iter()
        .chain(COMMON.iter())
        .find(|(option, _)| *option == name)
        .map(|(_, ty)| *ty)
        .unwrap_or(OptionType::Text)
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" | "on" => Some(true),
        "false" | "f" | "0" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// Coerces `raw` per the table; on failure returns the text value together
/// with a message for the warnings collector.
pub fn coerce(kind: ElementKind, name: &str, raw: &str) -> (OptionValue, Option<String>) {
    let ty = option_type(kind, name);
    let trimmed = raw.trim();
    let coerced = match ty {
        OptionType::Text => Some(OptionValue::Text(trimmed.to_string())),
        OptionType::Bool => parse_bool(trimmed).map(OptionValue::Bool),
        OptionType::Int => trimmed.parse::<i64>().ok().map(OptionValue::Int),
        OptionType::Float => trimmed
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(OptionValue::Float),
    };
    match coerced {
        Some(value) => (value, None),
        None => (
            OptionValue::Text(trimmed.to_string()),
            Some(format!(
                "option \"{name}\" of <{}> should be {}, got \"{trimmed}\"",
                kind.tag(),
                ty.describe()
            )),
        ),
    }
}
