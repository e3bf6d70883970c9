pub mod dispatcher;
pub mod route_table;

pub use dispatcher::{DISPATCH_TIMEOUT, Dispatcher, OutboundRequest};
pub use route_table::{RouteTable, RouteTarget, ServiceName};
