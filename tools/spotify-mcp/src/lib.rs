pub mod shared {
    pub mod utils;
}

pub mod domain {
    pub mod descriptor;
    pub mod music;
    pub mod schema;
}

pub mod infra {
    pub mod config;
    pub mod metrics;
    pub mod spotify;
}

pub mod app {
    pub mod catalog;
    pub mod handlers;
    pub mod registry;
    pub mod translator;
}

pub mod adapters {
    pub mod server;
}
