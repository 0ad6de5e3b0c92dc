use std::convert::Infallible;

use serde::Serialize;
use serde_json::json;
use warp::{
    http::{header, StatusCode},
    reply::{Reply, Response},
    Rejection,
};

use crate::{
    constants::{SHOPPING_LIST_FILENAME, SHOPPING_LIST_HEADER},
    error::{Error, HtmlError},
    schema::ShoppingListEntry,
};

pub fn json<T: Serialize>(value: &T, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(value), status).into_response()
}

pub fn ok<T: Serialize>(value: &T) -> Response {
    json(value, StatusCode::OK)
}

pub fn created<T: Serialize>(value: &T) -> Response {
    json(value, StatusCode::CREATED)
}

pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

fn escape_csv(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        return format!("\"{}\"", value.replace('"', "\"\""));
    }
    value.to_string()
}

pub fn render_csv<R, S>(header: &[&str], rows: R) -> String
where
    R: IntoIterator<Item = Vec<S>>,
    S: AsRef<str>,
{
    let mut output = String::new();
    let mut push_row = |fields: Vec<String>| {
        output.push_str(&fields.join(","));
        output.push_str("\r\n");
    };

    push_row(header.iter().map(|h| escape_csv(h)).collect());
    for row in rows {
        push_row(row.iter().map(|field| escape_csv(field.as_ref())).collect());
    }

    output
}

/// Shopping list as a CSV attachment, an empty list is an empty file
pub fn shopping_list(entries: &[ShoppingListEntry]) -> Response {
    let body = match entries.is_empty() {
        true => String::new(),
        false => render_csv(
            SHOPPING_LIST_HEADER,
            entries.iter().map(|entry| {
                vec![
                    entry.name.to_owned(),
                    entry.measurement_unit.to_owned(),
                    entry.amount.to_string(),
                ]
            }),
        ),
    };

    let reply = warp::reply::with_header(body, header::CONTENT_TYPE, "text/csv; charset=utf-8");
    let reply = warp::reply::with_header(
        reply,
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
    );
    reply.into_response()
}

fn error_reply(error: &Error) -> Response {
    json(&error.body(), error.status())
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    if let Some(error) = err.find::<Error>() {
        if error.code >= 500 {
            log::error!("Request failed: {error}");
        }
        return Ok(error_reply(error));
    }

    if err.is_not_found() {
        return Ok(error_reply(&HtmlError::NotFound.default()));
    }

    if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        log::debug!("Rejected body: {e}");
        return Ok(json(
            &json!({ "detail": format!("JSON parse error - {e}") }),
            StatusCode::BAD_REQUEST,
        ));
    }

    if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        log::debug!("Rejected query: {e}");
        return Ok(error_reply(&HtmlError::InvalidRequest.new("Invalid query string.")));
    }

    if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        return Ok(json(
            &json!({ "detail": "Request body is too large." }),
            StatusCode::PAYLOAD_TOO_LARGE,
        ));
    }

    if err.find::<warp::reject::LengthRequired>().is_some() {
        return Ok(json(
            &json!({ "detail": "Content-Length header is required." }),
            StatusCode::LENGTH_REQUIRED,
        ));
    }

    if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        return Ok(json(
            &json!({ "detail": "Unsupported media type in request." }),
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ));
    }

    if err.find::<warp::reject::MissingHeader>().is_some()
        || err.find::<warp::reject::InvalidHeader>().is_some()
    {
        return Ok(error_reply(&HtmlError::InvalidRequest.default()));
    }

    if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        return Ok(json(
            &json!({ "detail": "Method not allowed." }),
            StatusCode::METHOD_NOT_ALLOWED,
        ));
    }

    log::error!("Unhandled rejection: {err:?}");
    Ok(error_reply(&HtmlError::InternalServerError.default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_fields_are_escaped() {
        let output = render_csv(
            &["Ingredient", "Measurement unit", "Amount"],
            vec![
                vec!["salt", "g", "5"],
                vec!["tomatoes, canned", "can", "2"],
                vec!["\"special\" sauce", "ml", "30"],
            ],
        );

        assert_eq!(
            output,
            "Ingredient,Measurement unit,Amount\r\n\
             salt,g,5\r\n\
             \"tomatoes, canned\",can,2\r\n\
             \"\"\"special\"\" sauce\",ml,30\r\n"
        );
    }

    #[tokio::test]
    async fn shopping_list_is_an_attachment() {
        let response = shopping_list(&[ShoppingListEntry {
            name: String::from("flour"),
            measurement_unit: String::from("g"),
            amount: 600,
        }]);

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"shopping_list.csv\""
        );
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/csv"));

        let body = warp::hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert_eq!(&body[..], b"Ingredient,Measurement unit,Amount\r\nflour,g,600\r\n");
    }

    #[tokio::test]
    async fn empty_shopping_list_is_empty() {
        let response = shopping_list(&[]);
        let body = warp::hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn errors_render_as_json() {
        let rejection: Rejection = HtmlError::Forbidden.default().into();
        let response = handle_rejection(rejection).await.unwrap().into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = warp::hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["detail"], "You do not have permission to perform this action.");

        let response = handle_rejection(warp::reject::not_found())
            .await
            .unwrap()
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
