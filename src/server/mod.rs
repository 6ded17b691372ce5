//! Request pipeline over transport-neutral request and response types.
//!
//! A caller's HTTP server converts its request into a [`RawRequest`], calls
//! [`RequestPipeline::handle`] and writes the returned
//! `http::Response<Vec<u8>>` back out.

mod pipeline;
mod request;
mod response;

pub use pipeline::{PipelineBuilder, RequestPipeline, Stage};
pub use request::{parse_query, RawRequest, RequestBody};
pub use response::{error_body, write_handler_response, write_json_error};
