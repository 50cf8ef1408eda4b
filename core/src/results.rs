//! Action results: what an action asks the pipeline to send back.

use crate::controller::ControllerContext;
use crate::error::{MvcError, MvcResult};
use crate::view::{ViewContext, ViewEngineCollection};
use http::{StatusCode, header};
use serde_json::Value;

/// Which view to render and with what model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewResult {
    /// View name; the routed action name when unset
    pub view_name: Option<String>,
    /// Layout to render the view inside
    pub master_name: Option<String>,
    /// Model handed to the view
    pub model: Option<Value>,
}

impl ViewResult {
    /// A view with an explicit name.
    #[must_use]
    pub fn named(view_name: impl Into<String>) -> Self {
        Self {
            view_name: Some(view_name.into()),
            ..Self::default()
        }
    }

    /// Attach a model.
    #[must_use]
    pub fn with_model(mut self, model: Value) -> Self {
        self.model = Some(model);
        self
    }

    /// Render inside a layout.
    #[must_use]
    pub fn with_master(mut self, master_name: impl Into<String>) -> Self {
        self.master_name = Some(master_name.into());
        self
    }
}

/// The outcome of an action, executed into the response.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult {
    /// Write nothing
    Empty,
    /// Literal content
    Content {
        /// Body text
        content: String,
        /// Content type, left unset when `None`
        content_type: Option<String>,
    },
    /// A JSON document
    Json(Value),
    /// A full view
    View(ViewResult),
    /// A partial view (no layout)
    PartialView(ViewResult),
    /// A redirect
    Redirect {
        /// Target URL
        url: String,
        /// 301 instead of 302
        permanent: bool,
    },
    /// A bare status code
    HttpStatusCode {
        /// Status
        status: StatusCode,
        /// Optional status description
        description: Option<String>,
    },
    /// Binary content
    File {
        /// Bytes to send
        content: Vec<u8>,
        /// Content type
        content_type: String,
        /// Suggested file name; sent as an attachment when set
        download_name: Option<String>,
    },
}

impl ActionResult {
    /// Literal text content.
    #[must_use]
    pub fn content(content: impl Into<String>) -> Self {
        Self::Content {
            content: content.into(),
            content_type: None,
        }
    }

    /// Literal content with a content type.
    #[must_use]
    pub fn content_with_type(content: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self::Content {
            content: content.into(),
            content_type: Some(content_type.into()),
        }
    }

    /// A JSON document.
    #[must_use]
    pub const fn json(value: Value) -> Self {
        Self::Json(value)
    }

    /// The view named after the action.
    #[must_use]
    pub fn view() -> Self {
        Self::View(ViewResult::default())
    }

    /// A named view.
    #[must_use]
    pub fn view_named(view_name: impl Into<String>) -> Self {
        Self::View(ViewResult::named(view_name))
    }

    /// A named partial view.
    #[must_use]
    pub fn partial_view(view_name: impl Into<String>) -> Self {
        Self::PartialView(ViewResult::named(view_name))
    }

    /// A temporary redirect.
    #[must_use]
    pub fn redirect(url: impl Into<String>) -> Self {
        Self::Redirect {
            url: url.into(),
            permanent: false,
        }
    }

    /// A permanent redirect.
    #[must_use]
    pub fn redirect_permanent(url: impl Into<String>) -> Self {
        Self::Redirect {
            url: url.into(),
            permanent: true,
        }
    }

    /// A bare status code.
    #[must_use]
    pub const fn status(status: StatusCode) -> Self {
        Self::HttpStatusCode {
            status,
            description: None,
        }
    }

    /// A status code with a description.
    #[must_use]
    pub fn status_with_description(status: StatusCode, description: impl Into<String>) -> Self {
        Self::HttpStatusCode {
            status,
            description: Some(description.into()),
        }
    }

    /// 404.
    #[must_use]
    pub const fn http_not_found() -> Self {
        Self::status(StatusCode::NOT_FOUND)
    }

    /// 401.
    #[must_use]
    pub const fn http_unauthorized() -> Self {
        Self::status(StatusCode::UNAUTHORIZED)
    }

    /// Binary content.
    #[must_use]
    pub fn file(content: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self::File {
            content,
            content_type: content_type.into(),
            download_name: None,
        }
    }

    /// Short name used in logs and metrics labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Content { .. } => "content",
            Self::Json(_) => "json",
            Self::View(_) => "view",
            Self::PartialView(_) => "partial_view",
            Self::Redirect { .. } => "redirect",
            Self::HttpStatusCode { .. } => "status",
            Self::File { .. } => "file",
        }
    }

    /// Write the result into `context.response`.
    ///
    /// # Errors
    ///
    /// - [`MvcError::ViewNotFound`] when no engine locates a view
    /// - [`MvcError::Render`] when a view fails or JSON cannot be written
    /// - [`MvcError::Argument`] for a redirect without a URL
    /// - [`MvcError::MissingRouteValue`] for an unnamed view outside an action route
    pub fn execute(
        &self,
        context: &mut ControllerContext,
        view_engines: &ViewEngineCollection,
    ) -> MvcResult<()> {
        let response = &mut context.response;
        match self {
            Self::Empty => {}
            Self::Content {
                content,
                content_type,
            } => {
                if let Some(content_type) = content_type {
                    response.content_type = Some(content_type.clone());
                }
                response.write(content);
            }
            Self::Json(value) => {
                let body = serde_json::to_string(value).map_err(|e| MvcError::Render(e.to_string()))?;
                response.content_type = Some("application/json; charset=utf-8".to_string());
                response.write(&body);
            }
            Self::Redirect { url, permanent } => {
                if url.is_empty() {
                    return Err(MvcError::argument("url", "a redirect needs a target URL"));
                }
                response.status = if *permanent {
                    StatusCode::MOVED_PERMANENTLY
                } else {
                    StatusCode::FOUND
                };
                response.set_header(header::LOCATION, url);
            }
            Self::HttpStatusCode {
                status,
                description,
            } => {
                response.status = *status;
                response.status_description.clone_from(description);
            }
            Self::File {
                content,
                content_type,
                download_name,
            } => {
                response.content_type = Some(content_type.clone());
                if let Some(name) = download_name {
                    response.set_header(
                        header::CONTENT_DISPOSITION,
                        &format!("attachment; filename=\"{name}\""),
                    );
                }
                response.body.extend_from_slice(content);
            }
            Self::View(view) => execute_view(view, false, context, view_engines)?,
            Self::PartialView(view) => execute_view(view, true, context, view_engines)?,
        }
        Ok(())
    }
}

fn execute_view(
    view: &ViewResult,
    partial: bool,
    context: &mut ControllerContext,
    view_engines: &ViewEngineCollection,
) -> MvcResult<()> {
    let view_name = match &view.view_name {
        Some(name) if !name.is_empty() => name.clone(),
        _ => context
            .route_data()
            .get_string("action")
            .ok_or_else(|| MvcError::MissingRouteValue("action".to_string()))?,
    };
    if let Some(model) = &view.model {
        context.view_data.model = Some(model.clone());
    }

    let found = if partial {
        view_engines.find_partial_view(context, &view_name)?
    } else {
        view_engines.find_view(context, &view_name, view.master_name.as_deref())?
    };
    let (Some(found_view), Some(engine)) = (found.view, found.view_engine) else {
        return Err(MvcError::ViewNotFound {
            name: view_name,
            searched_locations: found.searched_locations,
        });
    };

    let mut output = String::new();
    let rendered = found_view.render(&ViewContext::new(context, &view_name), &mut output);
    engine.release_view(context, &found_view);
    rendered?;

    if context.response.content_type.is_none() {
        context.response.content_type = Some("text/html; charset=utf-8".to_string());
    }
    context.response.write(&output);
    Ok(())
}
