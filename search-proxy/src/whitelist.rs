//! Paths the generic `/splunkd` proxy may forward.

use crate::upstream::is_plain_path;
use axum::http::Method;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteFlags {
    pub skip_csrf: bool,
    /// The caller may supply the session key as an `oid` argument.
    pub oid_enabled: bool,
    /// Overrides the global upstream timeout, in seconds.
    pub timeout: Option<u64>,
}

const DEFAULT_FLAGS: RouteFlags = RouteFlags {
    skip_csrf: false,
    oid_enabled: false,
    timeout: None,
};

struct RouteDef {
    pattern: &'static str,
    methods: &'static [&'static str],
    flags: RouteFlags,
}

const fn route(pattern: &'static str, methods: &'static [&'static str]) -> RouteDef {
    RouteDef {
        pattern,
        methods,
        flags: DEFAULT_FLAGS,
    }
}

/// First match wins, so fixed paths come before the patterns they overlap.
const ROUTES: &[RouteDef] = &[
    route("server/info", &["GET"]),
    route("server/settings", &["GET"]),
    route("search/jobs", &["GET", "POST"]),
    RouteDef {
        pattern: "search/jobs/export",
        methods: &["GET"],
        flags: RouteFlags {
            oid_enabled: true,
            ..DEFAULT_FLAGS
        },
    },
    route(r"search/jobs/[^/]+", &["GET", "DELETE"]),
    RouteDef {
        pattern: r"search/jobs/[^/]+/(?:events|results|results_preview|summary|timeline|search\.log)",
        methods: &["GET"],
        flags: RouteFlags {
            oid_enabled: true,
            ..DEFAULT_FLAGS
        },
    },
    route(r"search/jobs/[^/]+/control", &["POST"]),
    RouteDef {
        pattern: "search/typeahead",
        methods: &["GET"],
        flags: RouteFlags {
            timeout: Some(30),
            ..DEFAULT_FLAGS
        },
    },
    route("search/intentionsparser", &["GET"]),
    route("search/timeparser", &["GET"]),
    route("search/parser", &["GET"]),
    route(r"saved/searches(?:/[^/]+)?", &["GET", "POST", "DELETE"]),
    route(r"saved/searches/[^/]+/(?:history|dispatch)", &["GET", "POST"]),
    route(r"messages(?:/[^/]+)?", &["GET", "DELETE"]),
    route(r"data/ui/views(?:/[^/]+)?", &["GET"]),
    route(r"data/ui/nav(?:/[^/]+)?", &["GET"]),
    route(r"data/indexes(?:/[^/]+)?", &["GET"]),
    route(r"apps/local(?:/[^/]+)?", &["GET"]),
    route("authentication/current-context", &["GET"]),
    route(r"alerts/fired_alerts(?:/[^/]+)?", &["GET", "DELETE"]),
    RouteDef {
        pattern: "auth/login",
        methods: &["POST"],
        flags: RouteFlags {
            skip_csrf: true,
            ..DEFAULT_FLAGS
        },
    },
];

pub struct WhitelistEntry {
    regex: Regex,
    pattern: &'static str,
    methods: &'static [&'static str],
    pub flags: RouteFlags,
}

impl WhitelistEntry {
    pub fn pattern(&self) -> &'static str {
        self.pattern
    }

    pub fn allows(&self, method: &Method) -> bool {
        self.methods
            .iter()
            .any(|allowed| *allowed == method.as_str())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.flags.timeout.map(Duration::from_secs)
    }
}

/// Each pattern accepts the bare path and both rewrite prefixes.
fn anchored(pattern: &str) -> String {
    format!(r"^(?:services/|(?i:servicesns)/[^/]+/[^/]+/)?(?:{pattern})/?$")
}

fn compile_regex(pattern: &str) -> Regex {
    Regex::new(&anchored(pattern))
        .unwrap_or_else(|err| panic!("invalid whitelist pattern {pattern}: {err}"))
}

static WHITELIST: Lazy<Vec<WhitelistEntry>> = Lazy::new(|| {
    ROUTES
        .iter()
        .map(|def| WhitelistEntry {
            regex: compile_regex(def.pattern),
            pattern: def.pattern,
            methods: def.methods,
            flags: def.flags,
        })
        .collect()
});

#[derive(Clone, Copy)]
pub enum Lookup {
    Allowed(&'static WhitelistEntry),
    /// No entry matches the (path, method) pair.
    NotWhitelisted,
    /// Whitelisted, but writes through the proxy are switched off.
    WriteDisabled,
}

pub fn is_write(method: &Method) -> bool {
    *method == Method::POST || *method == Method::DELETE
}

pub fn lookup(path: &str, method: &Method, enable_write: bool) -> Lookup {
    if !is_plain_path(path) {
        return Lookup::NotWhitelisted;
    }
    let path = path.trim_start_matches('/');
    let Some(entry) = WHITELIST
        .iter()
        .find(|entry| entry.allows(method) && entry.regex.is_match(path))
    else {
        return Lookup::NotWhitelisted;
    };
    if is_write(method) && !enable_write {
        return Lookup::WriteDisabled;
    }
    Lookup::Allowed(entry)
}
