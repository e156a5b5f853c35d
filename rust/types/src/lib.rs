mod api_types;
mod conversation;
mod schema_name;
mod tenant;

pub use api_types::*;
pub use conversation::*;
pub use schema_name::*;
pub use tenant::*;
