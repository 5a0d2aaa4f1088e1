pub mod csv_export;
pub mod db_utils;
pub mod email_cache;
pub mod email_filter;
pub mod format;
pub mod http;
pub mod month;
pub mod name;
