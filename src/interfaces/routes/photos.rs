use actix_web::web;

use crate::handlers::photos;

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/photos")
            .service(
                web::resource("/{photo_id}")
                    .route(web::get().to(photos::get_photo))
            )
            .service(
                web::resource("/{photo_id}/best")
                    .route(web::get().to(photos::get_best_photo))
            )
            .service(
                web::resource("/{photo_id}/analysis")
                    .route(web::patch().to(photos::update_analysis_status))
            )
    );
}
