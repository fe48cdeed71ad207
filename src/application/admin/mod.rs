//! Application services for the administrative surface.

pub mod menus;

pub use menus::AdminMenuService;
