//! # Router
//!
//! Matches `(method, path)` to the operation declared for it.
//!
//! Templates from the API document are inserted into a radix tree
//! ([`RadixRouter`]); literal segments win over `{param}` segments and
//! lookups backtrack, so the most specific template matches. The
//! document's `basePath` is stripped before lookup.
//!
//! A failed lookup is a 404 unless [`Router::other_methods`] finds the path
//! under other methods, in which case the pipeline answers 405 with those
//! methods in `Allow`.
//!
//! ```rust
//! use brrtcontract::binder::ParameterBinder;
//! use brrtcontract::router::{Route, Router};
//! use http::Method;
//!
//! let route = Route {
//!     method: Method::POST,
//!     path_template: "/pets".into(),
//!     operation_id: "addPet".into(),
//!     consumes: vec!["application/json".into()],
//!     produces: vec!["application/json".into()],
//!     security: Vec::new(),
//!     binder: ParameterBinder::default(),
//! };
//! let router = Router::new(vec![route], "");
//!
//! assert!(router.lookup(&Method::GET, "/pets").is_none());
//! assert_eq!(router.other_methods(&Method::GET, "/pets"), vec![Method::POST]);
//! ```

mod core;
mod radix;

pub use self::core::{ParamVec, Route, RouteMatch, Router, MAX_INLINE_PARAMS};
pub use radix::RadixRouter;
