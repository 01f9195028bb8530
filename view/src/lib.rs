//! Dashboard view compiler: simple XML to a typed, id-normalized model, plus
//! the escaped-HTML fast path for views that do not need the module system.

mod compile;
mod drilldown;
mod error;
mod format;
mod ids;
mod inputs;
pub mod model;
mod options;
mod parse;
mod registry;
mod render;
mod serialize;
mod validate;
pub mod xml;

pub use compile::AppContext;
pub use compile::CompiledView;
pub use compile::compile;
pub use error::Result;
pub use error::ViewError;
pub use format::MAX_FORMAT_DEPTH;
pub use ids::is_valid_id;
pub use ids::normalize_ids;
pub use options::OptionType;
pub use options::option_type;
pub use parse::parse_dashboard;
pub use registry::Registration;
pub use registry::lookup as lookup_element;
pub use registry::registrations;
pub use render::AssetBundle;
pub use render::RenderPath;
pub use render::ViewSettings;
pub use render::decide_render_path;
pub use render::render_html;
pub use render::resolve_assets;
pub use serialize::to_xml;
pub use validate::Diagnostic;
pub use validate::Warnings;
pub use validate::validate;
