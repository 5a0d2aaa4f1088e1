use actix_web::http::header;
use actix_web::{HttpResponse, HttpResponseBuilder};

/// 303 to `location`; finish it, or attach cookies first.
pub fn see_other(location: &str) -> HttpResponseBuilder {
    let mut builder = HttpResponse::SeeOther();
    builder.insert_header((header::LOCATION, location.to_string()));
    builder
}

pub fn redirect_to(location: &str) -> HttpResponse {
    see_other(location).finish()
}
