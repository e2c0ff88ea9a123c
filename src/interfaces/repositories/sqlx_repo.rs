use sqlx::PgPool;

#[derive(Clone)]
pub struct SqlxHarvestRepo {
    pub pool: PgPool,
}

#[derive(Clone)]
pub struct SqlxPhotoRepo {
    pub pool: PgPool,
}
