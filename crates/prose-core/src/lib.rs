mod commands;
mod decoration;
mod error;
mod fragment;
mod history;
mod json;
mod mapping;
mod node;
mod node_view;
mod plugin;
pub mod plugins;
mod replace;
mod resolved;
mod schema;
mod selection;
mod state;
mod step;
mod transaction;
mod transform;

pub use crate::commands::*;
pub use crate::decoration::*;
pub use crate::error::*;
pub use crate::fragment::*;
pub use crate::history::*;
pub use crate::mapping::*;
pub use crate::node::*;
pub use crate::node_view::*;
pub use crate::plugin::*;
pub use crate::plugins::*;
pub use crate::replace::*;
pub use crate::resolved::*;
pub use crate::schema::*;
pub use crate::selection::*;
pub use crate::state::*;
pub use crate::step::*;
pub use crate::transaction::*;
pub use crate::transform::*;
