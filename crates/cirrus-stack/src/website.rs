//! Ready-made static website stacks.
//!
//! Each variant declares a bucket, website or CDN front, one uploaded index
//! page and a bucket policy. The policy document is templated on the bucket id,
//! which is not known until the bucket is realized.

use cirrus_config::ResourceKind;
use cirrus_value::{Deferred, InputValue};
use serde_json::{Value, json};

use crate::builder::{ResourceDecl, StackBuilder};
use crate::error::StackError;
use crate::stack::Stack;

/// Shape of the website stack to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebsiteVariant {
  /// Public bucket website. The public-access setting is explicitly ordered
  /// before the policy.
  Public,
  /// Same resources as `Public`, but the policy does not declare the ordering.
  /// The two may realize in either order.
  PublicUnordered,
  /// Public bucket website without a public-access setting.
  Minimal,
  /// Private bucket served through a CDN distribution.
  Cdn,
}

/// `arn:aws:s3:::{bucket_id}/*`. Fails unless the bucket id is a string.
pub fn object_arn(bucket_id: &Value) -> Result<Value, String> {
  let id = expect_str(bucket_id, "bucket id")?;
  Ok(json!(format!("arn:aws:s3:::{id}/*")))
}

fn expect_str<'a>(value: &'a Value, what: &str) -> Result<&'a str, String> {
  value
    .as_str()
    .ok_or_else(|| format!("{what} must be a string, got {value}"))
}

/// A policy document granting public read access to every object in the
/// bucket, rendered once the bucket id is known.
pub fn public_read_policy(bucket_id: &Deferred) -> Deferred {
  bucket_id.try_map(|id: &Value| -> Result<Value, String> {
    Ok(json!({
      "Version": "2012-10-17",
      "Statement": [{
        "Effect": "Allow",
        "Principal": "*",
        "Action": ["s3:GetObject"],
        "Resource": [object_arn(id)?],
      }]
    }))
  })
}

/// A policy document allowing only the given distribution to read objects.
pub fn cdn_read_policy(bucket_id: &Deferred, distribution_arn: &Deferred) -> Deferred {
  let inputs = [bucket_id.clone(), distribution_arn.clone()];
  Deferred::try_combine(inputs, |values: &[Value]| -> Result<Value, String> {
    let source_arn = expect_str(&values[1], "distribution arn")?;
    Ok(json!({
      "Version": "2012-10-17",
      "Statement": [{
        "Effect": "Allow",
        "Principal": { "Service": "cloudfront.amazonaws.com" },
        "Action": ["s3:GetObject"],
        "Resource": [object_arn(&values[0])?],
        "Condition": { "StringEquals": { "AWS:SourceArn": source_arn } },
      }]
    }))
  })
}

/// Build a static website stack serving `index_source` as `index.html`.
pub fn website_stack(variant: WebsiteVariant, index_source: &str) -> Result<Stack, StackError> {
  let stack_id = match variant {
    WebsiteVariant::Public => "website",
    WebsiteVariant::PublicUnordered => "website-unordered",
    WebsiteVariant::Minimal => "website-minimal",
    WebsiteVariant::Cdn => "website-cdn",
  };
  let mut builder = StackBuilder::new(stack_id, "Static website");

  let bucket = builder.declare(
    ResourceDecl::new("bucket", ResourceKind::Bucket).input("bucket_prefix", "cirrus-site"),
  )?;
  let bucket_id = bucket.output("id");

  builder.declare(
    ResourceDecl::new("index.html", ResourceKind::UploadedObject)
      .input("bucket", &bucket_id)
      .input("source", index_source)
      .input("content_type", "text/html"),
  )?;

  if variant == WebsiteVariant::Cdn {
    let oac = builder.declare(
      ResourceDecl::new("oac", ResourceKind::OriginAccessControl)
        .input("origin_type", "s3")
        .input("signing_behavior", "always")
        .input("signing_protocol", "sigv4"),
    )?;

    let origin = Deferred::combine(
      [
        bucket.output("bucket_regional_domain_name"),
        bucket_id.clone(),
        oac.output("id"),
      ],
      |values| {
        json!({
          "domain_name": values[0],
          "origin_id": values[1],
          "origin_access_control_id": values[2],
        })
      },
    );
    let cdn = builder.declare(
      ResourceDecl::new("cdn", ResourceKind::CdnDistribution)
        .input("enabled", true)
        .input("default_root_object", "index.html")
        .input("origins", InputValue::list([origin]))
        .input(
          "default_cache_behavior",
          bucket_id.map(|id| {
            json!({
              "target_origin_id": id,
              "viewer_protocol_policy": "redirect-to-https",
              "allowed_methods": ["GET", "HEAD"],
              "cached_methods": ["GET", "HEAD"],
            })
          }),
        ),
    )?;

    builder.declare(
      ResourceDecl::new("bucket-policy", ResourceKind::AccessPolicy)
        .input("bucket", &bucket_id)
        .input("policy", cdn_read_policy(&bucket_id, &cdn.output("arn"))),
    )?;

    builder.export("bucket_name", &bucket_id);
    builder.export(
      "cloudfront_url",
      cdn.output("domain_name").try_map(|domain: &Value| -> Result<Value, String> {
        let domain = expect_str(domain, "distribution domain name")?;
        Ok(json!(format!("https://{domain}")))
      }),
    );
    return builder.build();
  }

  let website = builder.declare(
    ResourceDecl::new("website", ResourceKind::WebsiteConfig)
      .input("bucket", &bucket_id)
      .input("index_document", json!({ "suffix": "index.html" }))
      .input("error_document", json!({ "key": "error.html" })),
  )?;

  let mut policy = ResourceDecl::new("bucket-policy", ResourceKind::AccessPolicy)
    .input("bucket", &bucket_id)
    .input("policy", public_read_policy(&bucket_id));

  if variant != WebsiteVariant::Minimal {
    let access = builder.declare(
      ResourceDecl::new("public-access", ResourceKind::PublicAccessSetting)
        .input("bucket", &bucket_id)
        .input("block_public_acls", false)
        .input("block_public_policy", false)
        .input("ignore_public_acls", false)
        .input("restrict_public_buckets", false),
    )?;
    if variant == WebsiteVariant::Public {
      policy = policy.depends_on(&access);
    }
  }
  builder.declare(policy)?;

  builder.export("bucket_name", &bucket_id);
  builder.export("website_url", website.output("website_endpoint"));
  builder.build()
}
