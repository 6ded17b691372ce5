//! Router core: route table built from the API document, lookups on the
//! request hot path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use http::Method;
use smallvec::SmallVec;
use tracing::{debug, info, warn};

use super::radix::RadixRouter;
use crate::binder::ParameterBinder;
use crate::config::ContractConfig;
use crate::errors::ConfigError;
use crate::spec::{SecurityRequirement, SpecDocument};
use crate::validator::SchemaArena;

/// Path parameters kept inline up to this count.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Matched path parameters, in template order.
///
/// Names are `Arc<str>` shared with the route tree; values are the raw
/// (still percent-encoded) request segments.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// One (method, path template) with everything resolved at build time.
#[derive(Debug, Clone)]
pub struct Route {
    pub method: Method,
    pub path_template: String,
    /// `operationId`, or `METHOD /path` for anonymous operations.
    pub operation_id: String,
    pub consumes: Vec<String>,
    pub produces: Vec<String>,
    /// Alternatives: any one fully satisfied requirement authenticates.
    pub security: Vec<SecurityRequirement>,
    pub binder: ParameterBinder,
}

#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<Route>,
    pub path_params: ParamVec,
}

impl RouteMatch {
    /// Last occurrence wins when a template repeats a name.
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Method + path router over a radix tree, aware of the document's
/// `basePath`.
#[derive(Debug, Clone)]
pub struct Router {
    tree: RadixRouter<Route>,
    routes: Vec<Arc<Route>>,
    base_path: String,
}

impl Router {
    /// Build from prebuilt routes. Later routes replace earlier ones with
    /// the same method and template.
    #[must_use]
    pub fn new(routes: Vec<Route>, base_path: impl Into<String>) -> Self {
        let base_path = base_path.into().trim_end_matches('/').to_string();
        let mut tree = RadixRouter::new();
        let mut kept: Vec<Arc<Route>> = Vec::with_capacity(routes.len());
        for route in routes {
            let route = Arc::new(route);
            if tree
                .insert(route.method.clone(), &route.path_template, Arc::clone(&route))
                .is_some()
            {
                warn!(
                    method = %route.method,
                    path = %route.path_template,
                    "Duplicate route replaced"
                );
                kept.retain(|r| !(r.method == route.method && r.path_template == route.path_template));
            }
            kept.push(route);
        }

        let routes_summary: Vec<String> = kept
            .iter()
            .take(10)
            .map(|r| format!("{} {}{}", r.method, base_path, r.path_template))
            .collect();
        info!(
            routes_count = kept.len(),
            base_path = %base_path,
            routes_summary = ?routes_summary,
            "Routing table loaded"
        );

        Self {
            tree,
            routes: kept,
            base_path,
        }
    }

    /// Build one route per operation, compiling every binder into `arena`.
    pub fn from_spec(spec: &SpecDocument, arena: &mut SchemaArena, config: &ContractConfig) -> Result<Self, ConfigError> {
        let runtime = config.runtime();
        let mut routes = Vec::new();
        for op in spec.operations() {
            let operation_id = op.display_id();
            let params = spec.params_for(op.method, op.path);
            let binder = ParameterBinder::new(&params, arena, config).map_err(|result| {
                warn!(operation_id = %operation_id, errors = result.errors().len(), "Parameter binder rejected");
                ConfigError::Binder {
                    operation: operation_id.clone(),
                    result,
                }
            })?;
            let consumes = non_empty_or(spec.consumes_for(op.operation), &runtime.default_consumes);
            let produces = non_empty_or(spec.produces_for(op.operation), &runtime.default_produces);
            routes.push(Route {
                method: op.method.clone(),
                path_template: op.path.to_string(),
                operation_id,
                consumes,
                produces,
                security: spec.security_requirements_for(op.operation),
                binder,
            });
        }
        Ok(Self::new(routes, spec.base_path()))
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    /// Strip the query string and `basePath`; `None` when the path is
    /// outside `basePath`.
    fn relative<'p>(&self, path: &'p str) -> Option<&'p str> {
        let path = path.split_once('?').map_or(path, |(p, _)| p);
        if self.base_path.is_empty() {
            return Some(path);
        }
        let rest = path.strip_prefix(self.base_path.as_str())?;
        (rest.is_empty() || rest.starts_with('/')).then_some(rest)
    }

    #[must_use]
    pub fn lookup(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        debug!(method = %method, path = %path, "Route match attempt");
        let match_start = Instant::now();

        let result = self.relative(path).and_then(|rel| self.tree.lookup(method, rel));
        let duration = match_start.elapsed();

        match result {
            Some((route, path_params)) => {
                if duration > Duration::from_millis(1) {
                    warn!(
                        method = %method,
                        path = %path,
                        operation_id = %route.operation_id,
                        duration_us = duration.as_micros(),
                        "Slow route matching detected"
                    );
                } else {
                    debug!(
                        method = %method,
                        path = %path,
                        operation_id = %route.operation_id,
                        route_pattern = %route.path_template,
                        path_params = ?path_params,
                        duration_us = duration.as_micros(),
                        "Route matched"
                    );
                }
                Some(RouteMatch { route, path_params })
            }
            None => {
                debug!(
                    method = %method,
                    path = %path,
                    duration_us = duration.as_micros(),
                    "No route matched"
                );
                None
            }
        }
    }

    /// Methods other than `method` registered for `path`, sorted by name.
    #[must_use]
    pub fn other_methods(&self, method: &Method, path: &str) -> Vec<Method> {
        let Some(rel) = self.relative(path) else {
            return Vec::new();
        };
        let mut methods: Vec<Method> = self.tree.methods(rel).into_iter().filter(|m| m != method).collect();
        methods.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        methods
    }
}

fn non_empty_or(list: Vec<String>, fallback: &str) -> Vec<String> {
    if list.is_empty() {
        vec![fallback.to_string()]
    } else {
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(method: Method, template: &str, id: &str) -> Route {
        Route {
            method,
            path_template: template.to_string(),
            operation_id: id.to_string(),
            consumes: vec!["application/json".into()],
            produces: vec!["application/json".into()],
            security: Vec::new(),
            binder: ParameterBinder::default(),
        }
    }

    #[test]
    fn test_base_path_stripped() {
        let router = Router::new(vec![route(Method::GET, "/pets/{id}", "getPet")], "/api/v1/");
        let found = router.lookup(&Method::GET, "/api/v1/pets/7?verbose=true").unwrap();
        assert_eq!(found.route.operation_id, "getPet");
        assert_eq!(found.get_path_param("id"), Some("7"));
        assert!(router.lookup(&Method::GET, "/pets/7").is_none());
        assert!(router.lookup(&Method::GET, "/api/v1x/pets/7").is_none());
    }

    #[test]
    fn test_other_methods_sorted() {
        let router = Router::new(
            vec![
                route(Method::PUT, "/pets", "replacePets"),
                route(Method::POST, "/pets", "addPet"),
                route(Method::GET, "/pets", "listPets"),
            ],
            "",
        );
        assert_eq!(router.other_methods(&Method::DELETE, "/pets"), vec![Method::GET, Method::POST, Method::PUT]);
        assert_eq!(router.other_methods(&Method::GET, "/pets"), vec![Method::POST, Method::PUT]);
        assert!(router.other_methods(&Method::GET, "/cats").is_empty());
    }

    #[test]
    fn test_duplicate_route_replaced() {
        let router = Router::new(
            vec![route(Method::GET, "/a", "first"), route(Method::GET, "/a", "second")],
            "",
        );
        assert_eq!(router.routes().len(), 1);
        assert_eq!(router.lookup(&Method::GET, "/a").unwrap().route.operation_id, "second");
    }
}
