use crate::{
    api::{admin, admin_correction, attendance, correction},
    auth::{
        handlers,
        middleware::{admin_guard, member_guard, session_guard},
    },
    config::Config,
    error::AppError,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{
    Error, HttpRequest, guard,
    error::{JsonPayloadError, QueryPayloadError},
    middleware::from_fn,
    web,
};
use anyhow::anyhow;
use std::sync::Arc;

pub type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-route limiters, built once and shared by every worker.
#[derive(Clone)]
pub struct RateLimiters {
    pub login: Limiter,
    pub register: Limiter,
}

impl RateLimiters {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            login: Arc::new(build_limiter(config.rate_login_per_min)?),
            register: Arc::new(build_limiter(config.rate_register_per_min)?),
        })
    }
}

fn build_limiter(requests_per_min: u32) -> anyhow::Result<Governor<PeerIpKeyExtractor, NoOpMiddleware>> {
    let per_ms = if requests_per_min == 0 {
        1
    } else {
        60_000 / requests_per_min as u64
    };
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms.max(1))
        .burst_size(requests_per_min.max(1))
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit: {requests_per_min}/min"))?;
    Ok(Governor::new(&cfg))
}

/// Unreadable bodies answer like any other invalid form: 422 with field errors.
fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> Error {
    AppError::invalid_field("body", &err.to_string()).into()
}

fn query_error(err: QueryPayloadError, _req: &HttpRequest) -> Error {
    AppError::invalid_field("query", &err.to_string()).into()
}

pub fn configure(cfg: &mut web::ServiceConfig, limiters: &RateLimiters) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::QueryConfig::default().error_handler(query_error));

    // Public auth routes; only the POSTs spend the rate-limit budget
    cfg.service(
        web::resource("/register")
            .wrap(limiters.register.clone())
            .route(web::post().to(handlers::register)),
    )
    .service(
        web::resource("/login")
            .guard(guard::Get())
            .route(web::get().to(handlers::login_form)),
    )
    .service(
        web::resource("/login")
            .guard(guard::Post())
            .wrap(limiters.login.clone())
            .route(web::post().to(handlers::login)),
    )
    .service(
        web::resource("/logout")
            .wrap(from_fn(session_guard))
            .route(web::post().to(handlers::logout)),
    )
    // /admin/login and /admin/logout sit in front of the guarded /admin scope
    .service(
        web::resource("/admin/login")
            .guard(guard::Get())
            .route(web::get().to(handlers::admin_login_form)),
    )
    .service(
        web::resource("/admin/login")
            .guard(guard::Post())
            .wrap(limiters.login.clone())
            .route(web::post().to(handlers::admin_login)),
    )
    .service(
        web::resource("/admin/logout")
            .wrap(from_fn(session_guard))
            .route(web::post().to(handlers::admin_logout)),
    )
    .service(
        web::resource("/email/verify")
            .wrap(from_fn(session_guard))
            .route(web::get().to(handlers::verify_notice)),
    )
    .service(web::resource("/email/verify/{token}").route(web::get().to(handlers::verify_email)))
    .service(
        web::resource("/email/verification-notification")
            .wrap(from_fn(session_guard))
            .route(web::post().to(handlers::resend_verification)),
    );

    // Member routes
    cfg.service(
        web::scope("/attendance")
            .wrap(from_fn(member_guard))
            .route("", web::get().to(attendance::today))
            .route("/clock-in", web::post().to(attendance::clock_in))
            .route("/clock-out", web::post().to(attendance::clock_out))
            .route("/start-break", web::post().to(attendance::start_break))
            .route("/end-break", web::post().to(attendance::end_break))
            // before /{id}/... so "list" is never taken for an id
            .route("/list", web::get().to(attendance::monthly))
            .route("/{id}/correction", web::post().to(correction::submit)),
    )
    .service(
        web::scope("/attendances")
            .wrap(from_fn(member_guard))
            .route("/{id}/detail", web::get().to(attendance::detail)),
    )
    .service(
        web::scope("/stamp_correction_request")
            .wrap(from_fn(member_guard))
            .route("/list", web::get().to(correction::list)),
    );

    // Admin routes
    cfg.service(
        web::scope("/admin")
            .wrap(from_fn(admin_guard))
            .service(
                web::scope("/attendance")
                    .route("/list", web::get().to(admin::daily_list))
                    .route("/staff/{id}", web::get().to(admin::staff_monthly))
                    .route("/staff/{id}/csv", web::get().to(admin::staff_csv))
                    .route("/{id}", web::get().to(admin::record_detail))
                    .route("/{id}/update", web::post().to(admin::update_record)),
            )
            .route("/staff/list", web::get().to(admin::staff_list))
            .service(
                web::scope("/stamp_correction_request")
                    .route("/list", web::get().to(admin_correction::list))
                    .service(
                        web::resource("/approve/{id}")
                            .route(web::get().to(admin_correction::show))
                            .route(web::post().to(admin_correction::decide)),
                    ),
            ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test::TestRequest};

    #[test]
    fn limiters_build_for_any_rate() {
        assert!(build_limiter(60).is_ok());
        assert!(build_limiter(0).is_ok());
        assert!(build_limiter(100_000).is_ok());
    }

    #[test]
    fn payload_errors_become_field_errors() {
        let req = TestRequest::default().to_http_request();

        let json = json_error(JsonPayloadError::ContentType, &req);
        assert_eq!(
            json.as_response_error().status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );

        let parse = <serde::de::value::Error as serde::de::Error>::custom("invalid digit");
        let query = query_error(QueryPayloadError::Deserialize(parse), &req);
        assert_eq!(
            query.as_response_error().status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
