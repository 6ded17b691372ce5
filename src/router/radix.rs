//! Radix tree for path template matching.
//!
//! Each node is one path segment. Literal children are tried before
//! template children, and the search backtracks so that a literal branch
//! which dead-ends further down still lets a template sibling match:
//!
//! ```text
//! /users/me/settings   literal  "me" -> "settings"
//! /users/{id}/posts    template {id} -> "posts"
//! ```
//!
//! `GET /users/me/posts` fails down the `me` branch and then matches
//! through `{id}` with `id = "me"`.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use http::Method;

use super::core::ParamVec;

#[derive(Debug, Clone)]
struct RadixNode<T> {
    segment: Cow<'static, str>,
    routes: HashMap<Method, Arc<T>>,
    param_name: Option<Arc<str>>,
    children: Vec<RadixNode<T>>,
    /// One child per distinct parameter name at this position, so
    /// `/users/{user_id}/posts` and `/users/{id}/comments` keep their own
    /// names.
    param_children: Vec<RadixNode<T>>,
}

impl<T> RadixNode<T> {
    fn new(segment: Cow<'static, str>) -> Self {
        Self {
            segment,
            routes: HashMap::new(),
            param_name: None,
            children: Vec::new(),
            param_children: Vec::new(),
        }
    }

    fn new_param(param_name: &str) -> Self {
        Self {
            param_name: Some(Arc::from(param_name)),
            ..Self::new(Cow::Borrowed(""))
        }
    }

    /// Returns the route previously stored for `method` at this path.
    fn insert(&mut self, segments: &[&str], method: Method, route: Arc<T>) -> Option<Arc<T>> {
        let Some((segment, remaining)) = segments.split_first() else {
            return self.routes.insert(method, route);
        };

        if let Some(param_name) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            if let Some(child) = self
                .param_children
                .iter_mut()
                .find(|c| c.param_name.as_deref() == Some(param_name))
            {
                return child.insert(remaining, method, route);
            }
            let mut child = RadixNode::new_param(param_name);
            let previous = child.insert(remaining, method, route);
            self.param_children.push(child);
            return previous;
        }

        if let Some(child) = self.children.iter_mut().find(|c| c.segment == *segment) {
            return child.insert(remaining, method, route);
        }
        let mut child = RadixNode::new(Cow::Owned((*segment).to_string()));
        let previous = child.insert(remaining, method, route);
        self.children.push(child);
        previous
    }

    fn search(&self, segments: &[&str], method: &Method, params: &mut ParamVec) -> Option<Arc<T>> {
        let Some((segment, remaining)) = segments.split_first() else {
            return self.routes.get(method).cloned();
        };

        for child in self.children.iter().filter(|c| c.segment == *segment) {
            if let Some(route) = child.search(remaining, method, params) {
                return Some(route);
            }
        }

        for child in &self.param_children {
            if let Some(name) = &child.param_name {
                params.push((Arc::clone(name), (*segment).to_string()));
                if let Some(route) = child.search(remaining, method, params) {
                    return Some(route);
                }
                params.pop();
            }
        }

        None
    }

    /// Methods of every terminal node the segments reach, on any branch.
    fn collect_methods(&self, segments: &[&str], out: &mut Vec<Method>) {
        let Some((segment, remaining)) = segments.split_first() else {
            for method in self.routes.keys() {
                if !out.contains(method) {
                    out.push(method.clone());
                }
            }
            return;
        };
        for child in self.children.iter().filter(|c| c.segment == *segment) {
            child.collect_methods(remaining, out);
        }
        for child in &self.param_children {
            child.collect_methods(remaining, out);
        }
    }
}

/// Split a path into its non-empty segments.
pub(crate) fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Radix tree keyed by path template and method.
#[derive(Debug, Clone)]
pub struct RadixRouter<T> {
    root: RadixNode<T>,
    len: usize,
}

impl<T> Default for RadixRouter<T> {
    fn default() -> Self {
        Self {
            root: RadixNode::new(Cow::Borrowed("")),
            len: 0,
        }
    }
}

impl<T> RadixRouter<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a route; returns the one it replaced, if any.
    pub fn insert(&mut self, method: Method, template: &str, route: Arc<T>) -> Option<Arc<T>> {
        let previous = self.root.insert(&segments(template), method, route);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    pub fn lookup(&self, method: &Method, path: &str) -> Option<(Arc<T>, ParamVec)> {
        let mut params = ParamVec::new();
        let route = self.root.search(&segments(path), method, &mut params)?;
        Some((route, params))
    }

    /// Every method registered for some template matching `path`.
    pub fn methods(&self, path: &str) -> Vec<Method> {
        let mut out = Vec::new();
        self.root.collect_methods(&segments(path), &mut out);
        out
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
