//! Route table: path templates bound to handlers.
//!
//! A template such as `/files/<file_name>` is compiled into an anchored
//! regular expression where each `<name>` placeholder captures one or more
//! non-whitespace characters. Two routes collide when they share a method
//! and their patterns are identical once placeholder names are erased, so
//! `/a/<x>` and `/a/<y>` are the same route.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use regex::Regex;

use crate::parser::{HttpRequest, Method};
use crate::server::error::Error;
use crate::server::response::HttpResponse;

/// Values captured by the placeholders of a template, keyed by name.
pub type Params = HashMap<String, String>;

/// Type alias for a boxed future that returns a Result<HttpResponse, Error>.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<HttpResponse, Error>> + Send>>;

/// Type alias for a handler function that takes the request and its captured parameters.
pub type HandlerFn = Arc<dyn Fn(HttpRequest, Params) -> HandlerFuture + Send + Sync>;

const CAPTURE: &str = r"\S+";

/// The compiled, fully anchored form of a path template.
#[derive(Debug, Clone)]
pub struct RouteMatcher {
    regex: Regex,
    /// Pattern with placeholder names erased, used as the uniqueness key
    key: String,
    names: Vec<String>,
}

impl RouteMatcher {
    /// Compile a path template.
    pub fn compile(template: &str) -> Result<Self, Error> {
        let invalid = |reason: String| Error::InvalidRouteTemplate {
            template: template.to_string(),
            reason,
        };

        let mut pattern = String::from("^");
        let mut key = String::from("^");
        let mut names: Vec<String> = Vec::new();
        let mut rest = template;

        while let Some(open) = rest.find('<') {
            let Some(len) = rest[open + 1..].find('>') else {
                // Unterminated placeholder, the remainder is literal text
                break;
            };

            let literal = regex::escape(&rest[..open]);
            pattern.push_str(&literal);
            key.push_str(&literal);

            let name = &rest[open + 1..open + 1 + len];
            if !is_identifier(name) {
                return Err(invalid(format!("placeholder <{name}> is not an identifier")));
            }
            if names.iter().any(|existing| existing == name) {
                return Err(invalid(format!("placeholder <{name}> is used twice")));
            }

            pattern.push_str(&format!("(?P<{name}>{CAPTURE})"));
            key.push_str(&format!("({CAPTURE})"));
            names.push(name.to_string());

            rest = &rest[open + len + 2..];
        }

        let literal = regex::escape(rest);
        pattern.push_str(&literal);
        pattern.push('$');
        key.push_str(&literal);
        key.push('$');

        let regex = Regex::new(&pattern).map_err(|e| invalid(e.to_string()))?;

        Ok(Self { regex, key, names })
    }

    /// Match a whole target, returning the captured parameters.
    pub fn captures(&self, target: &str) -> Option<Params> {
        let captures = self.regex.captures(target)?;

        Some(self.names
            .iter()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|value| (name.clone(), value.as_str().to_string()))
            })
            .collect())
    }

    /// The normalized pattern two templates share when they are the same route.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The placeholder names in template order.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl PartialEq for RouteMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for RouteMatcher {}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// A handler bound to a method and a path template.
#[derive(Clone)]
pub struct RouteHandler {
    /// The template as registered.
    pub template: String,
    /// The HTTP method this route handles.
    pub method: Method,
    /// The compiled template.
    pub matcher: RouteMatcher,
    /// The handler function.
    pub handler: HandlerFn,
}

impl RouteHandler {
    /// Match a request against this route.
    pub fn matches(&self, request: &HttpRequest) -> Option<Params> {
        if self.method != request.method {
            return None;
        }
        self.matcher.captures(&request.target)
    }
}

impl PartialEq for RouteHandler {
    fn eq(&self, other: &Self) -> bool {
        self.method == other.method && self.matcher == other.matcher
    }
}

impl fmt::Debug for RouteHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteHandler")
            .field("template", &self.template)
            .field("method", &self.method)
            .field("matcher", &self.matcher.key)
            .finish_non_exhaustive()
    }
}

/// The set of registered routes.
///
/// Routes are populated before the server starts and only read afterwards.
/// Matching walks them in registration order.
#[derive(Default)]
pub struct Router {
    routes: Vec<RouteHandler>,
    keys: HashSet<(Method, String)>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a method and path template.
    pub fn register<F, Fut>(&mut self, template: &str, method: Method, handler: F) -> Result<(), Error>
    where
        F: Fn(HttpRequest, Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        let handler: HandlerFn = Arc::new(move |req: HttpRequest, params: Params| -> HandlerFuture {
            Box::pin(handler(req, params))
        });
        self.insert(template, method, handler)
    }

    /// Register an already boxed handler.
    pub fn insert(&mut self, template: &str, method: Method, handler: HandlerFn) -> Result<(), Error> {
        let matcher = RouteMatcher::compile(template)?;

        if !self.keys.insert((method, matcher.key().to_string())) {
            return Err(Error::DuplicateRoute {
                method,
                template: template.to_string(),
            });
        }

        self.routes.push(RouteHandler {
            template: template.to_string(),
            method,
            matcher,
            handler,
        });
        Ok(())
    }

    /// Find the first route matching the request's method and whole target.
    pub fn find(&self, request: &HttpRequest) -> Option<(&RouteHandler, Params)> {
        self.routes
            .iter()
            .find_map(|route| route.matches(request).map(|params| (route, params)))
    }

    /// The registered routes in registration order.
    pub fn routes(&self) -> &[RouteHandler] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
