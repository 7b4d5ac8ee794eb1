//! Contact form view

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Serialize;
use tera::Context as TeraContext;

use crate::api::AppState;
use crate::services::forms::{ContactForm, ContactSubject, FormErrors};
use crate::urls;
use crate::web::flash::{self, FlashMessage};
use crate::web::{render, Flash, PageError};

#[derive(Debug, Serialize)]
struct SubjectOption {
    value: &'static str,
    label: &'static str,
}

fn subject_options() -> Vec<SubjectOption> {
    ContactSubject::ALL
        .iter()
        .map(|s| SubjectOption {
            value: s.as_str(),
            label: s.label(),
        })
        .collect()
}

/// GET /contact/
pub async fn contact_form(
    State(state): State<AppState>,
    flash: Flash,
) -> Result<Response, PageError> {
    contact_page(&state, flash, ContactForm::default(), FormErrors::new())
}

/// POST /contact/
///
/// Nothing is sent anywhere; the cleaned message is written to the log.
pub async fn contact_submit(
    State(state): State<AppState>,
    Form(form): Form<ContactForm>,
) -> Result<Response, PageError> {
    let message = match form.clean() {
        Ok(message) => message,
        Err(errors) => {
            let flash = Flash(vec![FlashMessage::error("Please correct the errors below.")]);
            return contact_page(&state, flash, form, errors);
        }
    };

    tracing::info!(
        name = %message.name,
        email = %message.email,
        subject = message.subject.as_str(),
        urgent = message.urgent,
        "Contact message received"
    );

    let cookie = flash::set_cookie(&[FlashMessage::success(
        "Thank you for your message! We will get back to you soon.",
    )]);
    Ok(([(header::SET_COOKIE, cookie)], Redirect::to(urls::CONTACT)).into_response())
}

fn contact_page(
    state: &AppState,
    flash: Flash,
    form: ContactForm,
    errors: FormErrors,
) -> Result<Response, PageError> {
    let mut context = TeraContext::new();
    context.insert("form", &form);
    context.insert("errors", &errors);
    context.insert("subjects", &subject_options());
    render(state, &flash, "polls/contact.html", context)
}
