use actix_web::web;

use crate::handlers::{home::home, system::health_check};

mod harvests;
mod json_error;
mod photos;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(home);

    cfg.service(
        web::scope("/api/v1")
            .service(health_check)
            .configure(harvests::config_routes)
            .configure(photos::config_routes)
    );

    cfg.configure(json_error::config_routes);
}
