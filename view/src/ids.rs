//! Identifier normalization and search-context assignment.

use crate::error::Result;
use crate::error::ViewError;
use crate::model::Dashboard;
use crate::model::SearchSource;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z]\w*$").unwrap_or_else(|err| panic!("invalid id pattern: {err}"))
});

pub fn is_valid_id(id: &str) -> bool {
    ID_PATTERN.is_match(id)
}

/// Hands out `{prefix}{N}` names that skip anything already taken.
struct Counter {
    prefix: &'static str,
    next: usize,
}

impl Counter {
    fn new(prefix: &'static str) -> Self {
        Self { prefix, next: 1 }
    }

    fn issue(&mut self, taken: &mut HashSet<String>) -> String {
        loop {
            let candidate = format!("{}{}", self.prefix, self.next);
            self.next += 1;
            if taken.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

/// Validates user ids, fills in synthetic ones and assigns `search{N}`
/// contexts: master search first, then elements with their own search, then
/// inputs that populate from a search.
pub fn normalize_ids(dashboard: &mut Dashboard) -> Result<()> {
    let mut taken = HashSet::new();
    let panel_ids = dashboard
        .rows
        .iter()
        .flat_map(|row| row.panels.iter())
        .filter_map(|panel| panel.id.as_deref().map(|id| (id, panel.line.get())));
    let element_ids = dashboard
        .elements()
        .filter_map(|element| element.id.as_deref().map(|id| (id, element.line.get())));
    let input_ids = dashboard
        .inputs()
        .filter_map(|input| input.id.as_deref().map(|id| (id, input.line.get())));
    for (id, line) in panel_ids.chain(element_ids).chain(input_ids) {
        if !is_valid_id(id) {
            return Err(ViewError::invalid(
                format!("invalid id \"{id}\": ids must match ^[A-Za-z]\\w*$"),
                line,
            ));
        }
        if !taken.insert(id.to_string()) {
            return Err(ViewError::invalid(format!("duplicate id \"{id}\""), line));
        }
    }

    let mut elements = Counter::new("element");
    for element in dashboard.elements_mut() {
        if element.id.is_none() {
            element.id = Some(elements.issue(&mut taken));
        }
    }
    let mut fields = Counter::new("field");
    for input in dashboard.inputs_mut() {
        if input.id.is_none() {
            input.id = Some(fields.issue(&mut taken));
        }
    }

    let mut contexts = Counter::new("search");
    let master = dashboard
        .master_search
        .as_ref()
        .map(|_| contexts.issue(&mut taken));
    dashboard.master_context = master.clone();
    for element in dashboard.elements_mut() {
        match element.search.as_mut() {
            Some(search) => {
                element.context_id = Some(contexts.issue(&mut taken));
                if matches!(search.source, SearchSource::PostProcess { base: None, .. }) {
                    search.parent_context = master.clone();
                }
            }
            None => element.context_id = master.clone(),
        }
    }
    for input in dashboard.inputs_mut() {
        input.context_id = input.search.as_ref().map(|_| contexts.issue(&mut taken));
    }
    Ok(())
}
