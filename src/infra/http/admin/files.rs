use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::Multipart;
use axum_extra::extract::multipart::MultipartError;
use bytes::Bytes;
use tracing::warn;

use crate::{
    application::{
        error::HttpError,
        identity::Identity,
        tree::{TreeError, UploadCommand, UploadSource},
    },
    domain::types::NodeId,
    infra::http::{access_error_to_http, forbidden_page, not_found_page, tree_error_to_http},
};

use super::{AdminState, edit_page_href};

const UPLOAD_PATH: &str = "/admin/addfile/";

#[derive(Default)]
struct UploadForm {
    page_id: Option<String>,
    file: Option<(String, Bytes)>,
    url: Option<String>,
    hidden: bool,
}

async fn read_upload_form(
    multipart: &mut Multipart,
    limit_bytes: usize,
) -> Result<UploadForm, HttpError> {
    const SOURCE: &str = "infra::http::admin::read_upload_form";

    let mut form = UploadForm::default();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => return Err(multipart_http_error(SOURCE, err, limit_bytes)),
        };

        match field.name() {
            Some("page_id") => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| multipart_http_error(SOURCE, err, limit_bytes))?;
                form.page_id = Some(value.trim().to_string());
            }
            Some("url") => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| multipart_http_error(SOURCE, err, limit_bytes))?;
                form.url = Some(value);
            }
            Some("hidden") => form.hidden = true,
            Some("attachment") => {
                let file_name = field
                    .file_name()
                    .map(|name| name.trim().to_string())
                    .unwrap_or_default();
                let data = field
                    .bytes()
                    .await
                    .map_err(|err| multipart_http_error(SOURCE, err, limit_bytes))?;
                // Browsers submit an empty part when no file was chosen.
                if !file_name.is_empty() {
                    form.file = Some((file_name, data));
                }
            }
            _ => continue,
        }
    }
    Ok(form)
}

fn multipart_http_error(source: &'static str, err: MultipartError, limit_bytes: usize) -> HttpError {
    match err.status() {
        StatusCode::PAYLOAD_TOO_LARGE => {
            let limit_mib = limit_bytes.div_ceil(1_048_576);
            HttpError::new(
                source,
                StatusCode::PAYLOAD_TOO_LARGE,
                "Upload is too large",
                format!("File is too large (limit is {limit_mib} MiB)"),
            )
        }
        status => HttpError::new(
            source,
            status,
            "Upload form data was invalid",
            err.body_text(),
        ),
    }
}

pub(super) async fn admin_file_upload(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
    mut multipart: Multipart,
) -> Response {
    const SOURCE: &str = "infra::http::admin::admin_file_upload";

    let form = match read_upload_form(&mut multipart, state.upload_limit_bytes).await {
        Ok(form) => form,
        Err(err) => return err.into_response(),
    };

    let Some(page_id) = form.page_id.as_deref().and_then(|id| id.parse::<i64>().ok()) else {
        return not_found_page(&state.chrome, &identity, UPLOAD_PATH, None).await;
    };

    let page = match state.tree.find_page(NodeId(page_id)).await {
        Ok(Some(page)) => page,
        Ok(None) => {
            warn!(
                target = "sitecreator::http::admin",
                page_id,
                "upload for a page that does not exist"
            );
            return not_found_page(&state.chrome, &identity, UPLOAD_PATH, None).await;
        }
        Err(err) => return tree_error_to_http(SOURCE, err).into_response(),
    };

    match state
        .tree
        .access()
        .can_write(&page.meta, identity.viewer())
        .await
    {
        Ok(true) => {}
        Ok(false) => return forbidden_page(&state.chrome, &identity, UPLOAD_PATH, None).await,
        Err(err) => return access_error_to_http(SOURCE, err).into_response(),
    }

    let source = match (form.file, form.url) {
        (Some((file_name, data)), _) => UploadSource::File { file_name, data },
        (None, Some(url)) => UploadSource::Link { url },
        (None, None) => return not_found_page(&state.chrome, &identity, UPLOAD_PATH, None).await,
    };

    let command = UploadCommand {
        source,
        hidden: form.hidden,
    };
    match state
        .tree
        .upload_attachment(identity.viewer(), &page, command)
        .await
    {
        Ok(_) => Redirect::to(&format!("{}#files", edit_page_href(page.id()))).into_response(),
        Err(TreeError::Validation(message)) => {
            not_found_page(&state.chrome, &identity, UPLOAD_PATH, Some(message)).await
        }
        Err(TreeError::Forbidden(_)) => {
            forbidden_page(&state.chrome, &identity, UPLOAD_PATH, None).await
        }
        Err(err) => tree_error_to_http(SOURCE, err).into_response(),
    }
}

pub(super) async fn admin_file_delete(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
    Path((page_id, file_id)): Path<(i64, i64)>,
) -> Response {
    const SOURCE: &str = "infra::http::admin::admin_file_delete";

    let request_path = format!("/admin/deletefile/{page_id}/{file_id}");
    let attachment = match state.tree.find_attachment_by_id(NodeId(file_id)).await {
        Ok(Some(attachment)) => attachment,
        Ok(None) => return not_found_page(&state.chrome, &identity, &request_path, None).await,
        Err(err) => return tree_error_to_http(SOURCE, err).into_response(),
    };

    match state
        .tree
        .delete_attachment(identity.viewer(), &attachment)
        .await
    {
        Ok(()) => Redirect::to(&format!("{}#files", edit_page_href(page_id))).into_response(),
        Err(TreeError::Forbidden(_)) => {
            forbidden_page(&state.chrome, &identity, &request_path, None).await
        }
        Err(err) => tree_error_to_http(SOURCE, err).into_response(),
    }
}
