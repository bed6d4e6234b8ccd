use axum::{
    Extension,
    body::Body,
    extract::{Form, Path, State},
    http::{
        HeaderValue, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::Multipart;

use crate::{
    application::{error::HttpError, identity::Identity, users::ImportReport},
    domain::users::UserGroup,
    infra::http::{not_found_page, user_directory_error_to_http},
    presentation::{
        admin::views::{
            AdminBulkUsersTemplate, AdminBulkUsersView, AdminMembershipView,
            AdminRejectedLineView, AdminUserEditorTemplate, AdminUserEditorView,
            AdminUserLookupTemplate, AdminUserLookupView,
        },
        views::render_template_response,
    },
};

use super::{
    AdminState, admin_layout, edit_user_href, email_segment,
    forms::{AdminUserForm, AdminUserLookupForm},
};

const LOOKUP_PATH: &str = "/admin/edit/user/";
const BULK_PATH: &str = "/admin/bulkeditusers/";

pub(super) async fn admin_user_lookup(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
) -> Response {
    render_lookup(&state, &identity, String::new(), None, StatusCode::OK).await
}

pub(super) async fn admin_user_lookup_submit(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
    Form(form): Form<AdminUserLookupForm>,
) -> Response {
    let email = form.email.trim();
    if email.is_empty() {
        return render_lookup(
            &state,
            &identity,
            String::new(),
            Some("This field is required.".to_string()),
            StatusCode::BAD_REQUEST,
        )
        .await;
    }
    Redirect::to(&edit_user_href(email)).into_response()
}

async fn render_lookup(
    state: &AdminState,
    identity: &Identity,
    email: String,
    error_message: Option<String>,
    status: StatusCode,
) -> Response {
    let content = AdminUserLookupView {
        email,
        error_message,
    };
    match admin_layout(state, identity, LOOKUP_PATH, content).await {
        Ok(view) => render_template_response(AdminUserLookupTemplate { view }, status),
        Err(response) => response,
    }
}

pub(super) async fn admin_user_edit(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
    Path(email): Path<String>,
) -> Response {
    const SOURCE: &str = "infra::http::admin::admin_user_edit";

    let profile = match state.users.load_profile(&email).await {
        Ok(Some(profile)) => profile,
        Ok(None) => return missing_profile(&state, &identity, &email).await,
        Err(err) => return user_directory_error_to_http(SOURCE, err).into_response(),
    };

    let memberships = match state.users.groups_for(&profile).await {
        Ok(groups) => membership_views(groups, "removefromgroup", &profile.email),
        Err(err) => return user_directory_error_to_http(SOURCE, err).into_response(),
    };
    let available_groups = match state.users.groups_not_in(&profile).await {
        Ok(groups) => membership_views(groups, "addtogroup", &profile.email),
        Err(err) => return user_directory_error_to_http(SOURCE, err).into_response(),
    };

    let content = AdminUserEditorView {
        form_action: edit_user_href(&profile.email),
        email: profile.email,
        is_superuser: profile.is_superuser,
        memberships,
        available_groups,
    };
    match admin_layout(&state, &identity, LOOKUP_PATH, content).await {
        Ok(view) => render_template_response(AdminUserEditorTemplate { view }, StatusCode::OK),
        Err(response) => response,
    }
}

fn membership_views(groups: Vec<UserGroup>, action: &str, email: &str) -> Vec<AdminMembershipView> {
    let email = email_segment(email);
    groups
        .into_iter()
        .map(|group| AdminMembershipView {
            action: format!("/admin/users/{action}/{}/{email}", group.id),
            group_name: group.name,
        })
        .collect()
}

pub(super) async fn admin_user_update(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
    Path(email): Path<String>,
    Form(form): Form<AdminUserForm>,
) -> Response {
    const SOURCE: &str = "infra::http::admin::admin_user_update";

    match state.users.load_profile(&email).await {
        Ok(Some(_)) => {}
        Ok(None) => return missing_profile(&state, &identity, &email).await,
        Err(err) => return user_directory_error_to_http(SOURCE, err).into_response(),
    }

    match state
        .users
        .update_profile(&email, form.is_superuser.is_some())
        .await
    {
        Ok(_) => Redirect::to("/admin/").into_response(),
        Err(err) => user_directory_error_to_http(SOURCE, err).into_response(),
    }
}

async fn missing_profile(state: &AdminState, identity: &Identity, email: &str) -> Response {
    not_found_page(
        &state.chrome,
        identity,
        &edit_user_href(email),
        Some(format!("No user profile exists for {email}.")),
    )
    .await
}

pub(super) async fn admin_bulk_users(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
) -> Response {
    let content = AdminBulkUsersView {
        users_text: String::new(),
        imported: None,
        rejected: Vec::new(),
    };
    render_bulk(&state, &identity, content, StatusCode::OK).await
}

struct BulkForm {
    users_text: String,
    complete: bool,
}

async fn read_bulk_form(multipart: &mut Multipart) -> Result<BulkForm, HttpError> {
    const SOURCE: &str = "infra::http::admin::read_bulk_form";

    let invalid = |err: axum_extra::extract::multipart::MultipartError| {
        HttpError::new(
            SOURCE,
            err.status(),
            "Upload form data was invalid",
            err.body_text(),
        )
    };

    let mut users_text = String::new();
    let mut uploaded = String::new();
    let mut complete = false;
    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        match field.name() {
            Some("users_text") => users_text = field.text().await.map_err(invalid)?,
            Some("users_file") => {
                let bytes = field.bytes().await.map_err(invalid)?;
                uploaded = String::from_utf8_lossy(&bytes).into_owned();
            }
            Some("complete") => complete = true,
            _ => continue,
        }
    }

    if !uploaded.is_empty() {
        if !users_text.is_empty() && !users_text.ends_with('\n') {
            users_text.push('\n');
        }
        users_text.push_str(&uploaded);
    }

    Ok(BulkForm {
        users_text,
        complete,
    })
}

pub(super) async fn admin_bulk_users_submit(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
    mut multipart: Multipart,
) -> Response {
    const SOURCE: &str = "infra::http::admin::admin_bulk_users_submit";

    let form = match read_bulk_form(&mut multipart).await {
        Ok(form) => form,
        Err(err) => return err.into_response(),
    };

    let report = match state.users.import_csv(&form.users_text, form.complete).await {
        Ok(report) => report,
        Err(err) => return user_directory_error_to_http(SOURCE, err).into_response(),
    };

    if report.rejected.is_empty() {
        return Redirect::to("/admin/").into_response();
    }

    let content = bulk_report_view(form.users_text, report);
    render_bulk(&state, &identity, content, StatusCode::OK).await
}

fn bulk_report_view(users_text: String, report: ImportReport) -> AdminBulkUsersView {
    AdminBulkUsersView {
        users_text,
        imported: Some(report.imported),
        rejected: report
            .rejected
            .into_iter()
            .map(|rejection| AdminRejectedLineView {
                line: rejection.line,
                content: rejection.content,
                reason: rejection.reason,
            })
            .collect(),
    }
}

async fn render_bulk(
    state: &AdminState,
    identity: &Identity,
    content: AdminBulkUsersView,
    status: StatusCode,
) -> Response {
    match admin_layout(state, identity, BULK_PATH, content).await {
        Ok(view) => render_template_response(AdminBulkUsersTemplate { view }, status),
        Err(response) => response,
    }
}

pub(super) async fn admin_export_users(State(state): State<AdminState>) -> Response {
    match state.users.export_csv().await {
        Ok(csv) => build_csv_response(csv),
        Err(err) => {
            user_directory_error_to_http("infra::http::admin::admin_export_users", err)
                .into_response()
        }
    }
}

fn build_csv_response(csv: String) -> Response {
    let mut response = Response::new(Body::from(csv));
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/csv"));
    headers.insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_static("attachment; filename=users.csv"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::GroupId;
    use crate::domain::users::RosterRejection;

    #[test]
    fn membership_actions_carry_group_and_email() {
        let views = membership_views(
            vec![UserGroup {
                id: GroupId(5),
                name: "Editors".into(),
                description: String::new(),
                members: Vec::new(),
            }],
            "addtogroup",
            "ann@example.com",
        );
        assert_eq!(views[0].action, "/admin/users/addtogroup/5/ann%40example.com");
        assert_eq!(views[0].group_name, "Editors");
    }

    #[test]
    fn report_lists_rejected_lines() {
        let view = bulk_report_view(
            "bad\n".into(),
            ImportReport {
                imported: 2,
                rejected: vec![RosterRejection {
                    line: 1,
                    content: "bad".into(),
                    reason: "expected two comma-separated fields",
                }],
            },
        );
        assert_eq!(view.imported, Some(2));
        assert!(view.has_rejections());
        assert_eq!(view.rejected[0].line, 1);
    }

    #[test]
    fn export_is_a_csv_attachment() {
        let response = build_csv_response("a@example.com,1\n".into());
        assert_eq!(response.headers()[CONTENT_TYPE], "text/csv");
        assert_eq!(
            response.headers()[CONTENT_DISPOSITION],
            "attachment; filename=users.csv"
        );
    }
}
