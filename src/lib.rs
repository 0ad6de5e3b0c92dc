mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod import;
    pub mod pagination;
    pub mod schema;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
pub mod api {
    pub mod handlers {
        pub mod auth;
        pub mod forbidden_words;
        pub mod ingredients;
        pub mod recipes;
        pub mod tags;
        pub mod users;
    }
    pub mod reply;
    pub mod routes;
    pub mod state;
}
pub mod moderation {
    pub mod obscenity;
}
pub mod config;
pub mod constants;
pub mod media;
pub mod validation;

pub mod cache {
    pub mod cache;
}

pub use authentication::*;
pub use database::*;
