pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod state;

pub mod crypto {
    pub mod token;
}

pub mod models {
    pub mod code;
    pub mod session;
    pub mod token;
    pub mod user;
}

pub mod repositories;

pub mod services {
    pub mod auth;
    pub mod credentials;
    pub mod password_reset;
    pub mod sessions;
    pub mod tokens;
    pub mod users;
}

pub mod handlers {
    pub mod auth;
    pub mod extract;
    pub mod response;
    pub mod session;
    pub mod users;
}

pub mod middleware_layer {
    pub mod auth;
}

pub mod validation {
    pub mod auth;
}

pub use config::Config;
pub use routes::build_router;
pub use state::AppState;
