//! Named routes
//!
//! Every HTML view and the yearly messages endpoint have a name. The router
//! registers the patterns below and templates build links with `reverse`
//! (exposed to tera as the `url()` function) instead of hard-coding paths.

use crate::converters::{IntConverter, PathConverter, YearConverter};

pub const HOME: &str = "/";
pub const ABOUT: &str = "/about/";
pub const LOG: &str = "/log/";
pub const MESSAGE_LIST: &str = "/messages/";
pub const CURRENT_DATETIME: &str = "/now/";
pub const YEARLY_ARCHIVE: &str = "/archive/{year}/";
pub const MONTHLY_ARCHIVE: &str = "/archive/{year}/{month}/";
pub const API_YEARLY_MESSAGES: &str = "/api/messages/{year}/";
pub const CONTACT: &str = "/contact/";
pub const SEARCH: &str = "/search/";
pub const POST_DETAIL: &str = "/posts/{slug}/";

/// Route name to path pattern
pub const ROUTES: &[(&str, &str)] = &[
    ("home", HOME),
    ("about", ABOUT),
    ("log", LOG),
    ("message_list", MESSAGE_LIST),
    ("current_datetime", CURRENT_DATETIME),
    ("yearly_archive", YEARLY_ARCHIVE),
    ("monthly_archive", MONTHLY_ARCHIVE),
    ("api_yearly_messages", API_YEARLY_MESSAGES),
    ("contact", CONTACT),
    ("search", SEARCH),
    ("post_detail", POST_DETAIL),
];

/// Error type for URL reversing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    #[error("No route named '{0}'")]
    UnknownRoute(String),

    #[error("Route '{route}' needs argument '{arg}'")]
    MissingArgument { route: String, arg: String },

    #[error("Invalid value '{value}' for argument '{arg}'")]
    InvalidArgument { arg: String, value: String },
}

/// Path pattern registered under `name`
pub fn pattern(name: &str) -> Option<&'static str> {
    ROUTES
        .iter()
        .find(|(route, _)| *route == name)
        .map(|(_, pattern)| *pattern)
}

/// Build the path of the route `name`, filling each `{placeholder}` from
/// `args`. Years are zero-padded to four digits and slugs are
/// percent-encoded.
pub fn reverse(name: &str, args: &[(&str, &str)]) -> Result<String, UrlError> {
    let pattern = pattern(name).ok_or_else(|| UrlError::UnknownRoute(name.to_string()))?;

    let mut path = String::with_capacity(pattern.len());
    let mut rest = pattern;
    while let Some(open) = rest.find('{') {
        path.push_str(&rest[..open]);
        let close = rest[open..]
            .find('}')
            .map(|i| open + i)
            .ok_or_else(|| UrlError::UnknownRoute(name.to_string()))?;
        let arg = &rest[open + 1..close];

        let value = args
            .iter()
            .find(|(key, _)| *key == arg)
            .map(|(_, value)| *value)
            .ok_or_else(|| UrlError::MissingArgument {
                route: name.to_string(),
                arg: arg.to_string(),
            })?;
        path.push_str(&render_segment(arg, value)?);

        rest = &rest[close + 1..];
    }
    path.push_str(rest);
    Ok(path)
}

fn render_segment(arg: &str, value: &str) -> Result<String, UrlError> {
    let invalid = || UrlError::InvalidArgument {
        arg: arg.to_string(),
        value: value.to_string(),
    };

    match arg {
        "year" => {
            let year: i32 = value.trim().parse().map_err(|_| invalid())?;
            if !(0..=9999).contains(&year) {
                return Err(invalid());
            }
            Ok(YearConverter::to_url(&year))
        }
        "month" => {
            let month = IntConverter::to_value(value.trim()).ok_or_else(invalid)?;
            Ok(IntConverter::to_url(&month))
        }
        _ => {
            if value.is_empty() {
                return Err(invalid());
            }
            Ok(urlencoding::encode(value).into_owned())
        }
    }
}
