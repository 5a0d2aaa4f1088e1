use crate::api::admin::{DailyListView, DailyRowView, DateQuery, StaffListView, StaffMonthView};
use crate::api::admin_correction::{DecisionForm, RequestDetailView};
use crate::api::attendance::{RecordDetailView, TodayView};
use crate::api::views::{
    BreakView, CorrectionListView, CorrectionView, DayView, MonthDayView, MonthQuery, MonthView,
    ProposalView, StatusQuery,
};
use crate::auth::session::SESSION_COOKIE;
use crate::model::attendance::WorkState;
use crate::model::correction::{BreakForm, CorrectionForm, CorrectionStatus, Decision};
use crate::model::user::StaffMember;
use utoipa::Modify;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Kintai API",
        version = "0.1.0",
        description = r#"
## Attendance tracking

Members clock in and out, log breaks, review their month and ask for
corrections. Admins review everyone's attendance, decide correction
requests, fix records directly and export a member's month as CSV.

### Security
Signing in at `POST /login` (members) or `POST /admin/login` (admins) sets
the `kintai_session` cookie. Member routes redirect to `/login` without it;
admin routes redirect to `/admin/login`, and answer 403 to members.

### Errors
Errors are JSON: `{"kind", "message"}`, plus `errors` (per field) and
`old` (echoed input) on validation failures.
"#,
    ),
    paths(
        crate::api::attendance::today,
        crate::api::attendance::clock_in,
        crate::api::attendance::clock_out,
        crate::api::attendance::start_break,
        crate::api::attendance::end_break,
        crate::api::attendance::monthly,
        crate::api::attendance::detail,

        crate::api::correction::submit,
        crate::api::correction::list,

        crate::api::admin::daily_list,
        crate::api::admin::record_detail,
        crate::api::admin::update_record,
        crate::api::admin::staff_list,
        crate::api::admin::staff_monthly,
        crate::api::admin::staff_csv,

        crate::api::admin_correction::list,
        crate::api::admin_correction::show,
        crate::api::admin_correction::decide
    ),
    components(
        schemas(
            WorkState,
            TodayView,
            DayView,
            BreakView,
            MonthView,
            MonthDayView,
            MonthQuery,
            RecordDetailView,
            CorrectionForm,
            BreakForm,
            CorrectionStatus,
            CorrectionView,
            CorrectionListView,
            ProposalView,
            StatusQuery,
            Decision,
            DecisionForm,
            RequestDetailView,
            DateQuery,
            DailyRowView,
            DailyListView,
            StaffMember,
            StaffListView,
            StaffMonthView
        )
    ),
    modifiers(&SessionCookie),
    tags(
        (name = "Attendance", description = "Clock and break actions, own records"),
        (name = "Correction", description = "Correction request workflow"),
        (name = "Admin", description = "Staff attendance management"),
    )
)]
pub struct ApiDoc;

/// Registers the `session_cookie` scheme the paths refer to.
struct SessionCookie;

impl Modify for SessionCookie {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "session_cookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(SESSION_COOKIE))),
        );
    }
}
