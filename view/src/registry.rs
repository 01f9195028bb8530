//! Panel element tags and their constructors.

use crate::error::Result;
use crate::model::ElementKind;
use crate::model::PanelElement;
use crate::parse::parse_html;
use crate::parse::parse_visualization;
use crate::validate::Warnings;
use crate::xml::XmlElement;

pub type Constructor = fn(&XmlElement, &mut Warnings) -> Result<PanelElement>;

pub struct Registration {
    pub tag: &'static str,
    pub kind: ElementKind,
    constructor: Constructor,
}

impl Registration {
    pub fn build(&self, node: &XmlElement, warnings: &mut Warnings) -> Result<PanelElement> {
        (self.constructor)(node, warnings)
    }
}

static REGISTRY: [Registration; 7] = [
    Registration {
        tag: "single",
        kind: ElementKind::Single,
        constructor: single,
    },
    Registration {
        tag: "chart",
        kind: ElementKind::Chart,
        constructor: chart,
    },
    Registration {
        tag: "table",
        kind: ElementKind::Table,
        constructor: table,
    },
    Registration {
        tag: "html",
        kind: ElementKind::Html,
        constructor: parse_html,
    },
    Registration {
        tag: "map",
        kind: ElementKind::Map,
        constructor: map,
    },
    Registration {
        tag: "event",
        kind: ElementKind::Event,
        constructor: event,
    },
    Registration {
        tag: "list",
        kind: ElementKind::List,
        constructor: list,
    },
];

pub fn lookup(tag: &str) -> Option<&'static Registration> {
    REGISTRY.iter().find(|registration| registration.tag == tag)
}

pub fn registrations() -> &'static [Registration] {
    &REGISTRY
}

fn single(node: &XmlElement, warnings: &mut Warnings) -> Result<PanelElement> {
    parse_visualization(ElementKind::Single, node, warnings)
}

fn chart(node: &XmlElement, warnings: &mut Warnings) -> Result<PanelElement> {
    parse_visualization(ElementKind::Chart, node, warnings)
}

fn table(node: &XmlElement, warnings: &mut Warnings) -> Result<PanelElement> {
    parse_visualization(ElementKind::Table, node, warnings)
}

fn map(node: &XmlElement, warnings: &mut Warnings) -> Result<PanelElement> {
    parse_visualization(ElementKind::Map, node, warnings)
}

fn event(node: &XmlElement, warnings: &mut Warnings) -> Result<PanelElement> {
    parse_visualization(ElementKind::Event, node, warnings)
}

fn list(node: &XmlElement, warnings: &mut Warnings) -> Result<PanelElement> {
    parse_visualization(ElementKind::List, node, warnings)
}
