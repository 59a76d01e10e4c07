//! Input value types for resource configuration.
//!
//! Inputs are plain JSON. Any string containing `{{ ... }}` is a minijinja
//! template that references outputs of other resources as
//! `resource.attribute`. Templates become deferred values during resolution
//! and are rendered only after the referenced resources are realized.
//!
//! # Examples
//!
//! ```json
//! {
//!   "bucket": "{{ bucket.id }}",
//!   "policy": {
//!     "Version": "2012-10-17",
//!     "Statement": [{
//!       "Effect": "Allow",
//!       "Principal": "*",
//!       "Action": ["s3:GetObject"],
//!       "Resource": ["arn:aws:s3:::{{ bucket.id }}/*"]
//!     }]
//!   }
//! }
//! ```
//!
//! A string that is exactly one expression (`"{{ bucket.id }}"`) keeps the JSON
//! type of the referenced output; anything else renders to a string.

/// An input value is arbitrary JSON that may contain template strings.
pub type InputDef = serde_json::Value;
