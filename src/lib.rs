mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod pagination;
    pub mod payload;
    pub mod schema;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
mod api {
    pub mod recipes;
    pub mod reference;
    pub mod reply;
    pub mod routes;
    pub mod users;
}
pub mod config;
pub mod constants;
pub mod error;
pub mod media;
pub mod state;

mod cache {
    pub mod cache;
}

pub use api::routes::api;
pub use authentication::*;
pub use cache::cache::*;
pub use database::*;
