pub mod table;

pub use table::{RouteRule, RouteTable};
