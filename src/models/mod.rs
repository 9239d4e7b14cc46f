//! Data models for the tagged media catalog.
//!
//! Plain records with a few invariant helpers; all graph maintenance lives in
//! the handler layer.

mod item;
mod page;
mod tag;
mod tag_type;
mod user;

pub use item::*;
pub use page::*;
pub use tag::*;
pub use tag_type::*;
pub use user::*;
