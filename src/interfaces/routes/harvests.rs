use actix_web::web;

use crate::{
    handlers::{harvests, photos},
    middlewares::rate_limit::UploadRateLimit,
};

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/harvests")
            .service(
                web::resource("")
                    .route(web::post().to(harvests::create_harvest))
            )
            .service(
                web::resource("/{harvest_id}")
                    .route(web::get().to(harvests::get_harvest))
            )
            .service(
                web::resource("/{harvest_id}/photos")
                    .route(web::get().to(photos::list_photos))
                    .route(web::post().to(photos::upload_photo))
                    .wrap(UploadRateLimit)
            )
    );
}
