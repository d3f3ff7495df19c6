pub mod auth;
pub mod limits;
pub mod model;
pub mod observability;
pub mod property;
pub mod resolver;
pub mod source;
pub mod sql;
pub mod store;
pub mod tls;
pub mod wire;
