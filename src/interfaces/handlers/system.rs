use actix_web::{get, web, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use humantime::format_duration;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::{sync::RwLock, time::Duration};
use sysinfo::System;

use crate::{constants::START_TIME, AppState};

const CACHE_TTL_SECS: i64 = 5;

#[derive(Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum Status {
    Ok,
    Unavailable,
}

#[derive(Serialize, Clone)]
struct Component {
    status: Status,
    backend: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl Component {
    fn from_check<E: std::fmt::Display>(backend: &'static str, check: Result<(), E>) -> Self {
        match check {
            Ok(()) => Component { status: Status::Ok, backend, detail: None },
            Err(e) => {
                tracing::warn!(backend, error = %e, "health check failed");
                Component { status: Status::Unavailable, backend, detail: Some(e.to_string()) }
            }
        }
    }
}

#[derive(Serialize, Clone)]
struct Components {
    record_store: Component,
    object_store: Component,
}

#[derive(Serialize, Clone)]
struct VariantPool {
    workers: usize,
    idle: usize,
    prefer_modern_codec: bool,
}

#[derive(Serialize, Clone)]
struct HostInfo {
    os: String,
    hostname: String,
    cpu_count: usize,
    process_memory: String,
}

#[derive(Serialize, Clone)]
struct HealthReport {
    status: &'static str,
    version: &'static str,
    uptime: String,
    started_at: String,
    checked_at: String,
    components: Components,
    variant_pool: VariantPool,
    host: HostInfo,
}

static CACHE: Lazy<RwLock<Option<(DateTime<Utc>, HealthReport)>>> = Lazy::new(|| RwLock::new(None));

fn host_info() -> HostInfo {
    let mut sys = System::new();
    sys.refresh_all();

    let process_memory = sysinfo::get_current_pid()
        .ok()
        .and_then(|pid| sys.process(pid))
        .map_or_else(
            || "Unknown".to_string(),
            |p| format!("{:.2} MB", p.memory() as f64 / 1024.0 / 1024.0),
        );

    HostInfo {
        os: System::long_os_version().unwrap_or_else(|| "Unknown".to_string()),
        hostname: System::host_name().unwrap_or_else(|| "Unknown".to_string()),
        cpu_count: sys.cpus().len(),
        process_memory,
    }
}

async fn run_checks(state: &AppState) -> HealthReport {
    let now = Utc::now();
    let repos = &state.repos;

    let records = match repos.harvest_repo.check_connection().await {
        Ok(()) => repos.photo_repo.check_connection().await,
        Err(e) => Err(e),
    };
    let components = Components {
        record_store: Component::from_check("records", records),
        object_store: Component::from_check(repos.store.backend_name(), repos.store.check().await),
    };

    let generator = &state.photo_handler.generator;
    let uptime = now.signed_duration_since(*START_TIME).num_seconds().max(0) as u64;

    HealthReport {
        status: if components.record_store.status == Status::Ok
            && components.object_store.status == Status::Ok
        {
            "healthy"
        } else {
            "degraded"
        },
        version: env!("CARGO_PKG_VERSION"),
        uptime: format_duration(Duration::from_secs(uptime)).to_string(),
        started_at: START_TIME.to_rfc3339(),
        checked_at: now.to_rfc3339(),
        components,
        variant_pool: VariantPool {
            workers: generator.worker_limit(),
            idle: generator.idle_workers(),
            prefer_modern_codec: generator.options().prefer_modern_codec,
        },
        host: host_info(),
    }
}

/// Liveness plus backend reachability. Checks run at most once per
/// `CACHE_TTL_SECS`; requests in between get the last report.
#[get("/health")]
pub async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let now = Utc::now();

    if let Ok(cache) = CACHE.read() {
        if let Some((at, report)) = cache.as_ref() {
            if (now - *at).num_seconds() < CACHE_TTL_SECS {
                return HttpResponse::Ok().json(report.clone());
            }
        }
    }

    let report = run_checks(&state).await;
    match CACHE.write() {
        Ok(mut cache) => *cache = Some((now, report.clone())),
        Err(e) => tracing::warn!("health cache lock poisoned: {}", e),
    }
    HttpResponse::Ok().json(report)
}
