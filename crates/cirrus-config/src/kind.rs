use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed set of resource kinds a stack can declare.
///
/// Each kind knows which inputs it requires, which of them may hold deferred
/// values, and which outputs it produces once realized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
  Bucket,
  PublicAccessSetting,
  WebsiteConfig,
  UploadedObject,
  AccessPolicy,
  OriginAccessControl,
  CdnDistribution,
}

impl ResourceKind {
  /// All kinds, in declaration order.
  pub const ALL: [ResourceKind; 7] = [
    ResourceKind::Bucket,
    ResourceKind::PublicAccessSetting,
    ResourceKind::WebsiteConfig,
    ResourceKind::UploadedObject,
    ResourceKind::AccessPolicy,
    ResourceKind::OriginAccessControl,
    ResourceKind::CdnDistribution,
  ];

  /// Inputs that must be present on every declaration of this kind.
  pub fn required_inputs(&self) -> &'static [&'static str] {
    match self {
      ResourceKind::Bucket => &[],
      ResourceKind::PublicAccessSetting => &["bucket"],
      ResourceKind::WebsiteConfig => &["bucket"],
      ResourceKind::UploadedObject => &["bucket", "source"],
      ResourceKind::AccessPolicy => &["bucket", "policy"],
      ResourceKind::OriginAccessControl => &[],
      ResourceKind::CdnDistribution => &["origins"],
    }
  }

  /// Inputs that may contain deferred values.
  pub fn deferrable_inputs(&self) -> &'static [&'static str] {
    match self {
      ResourceKind::Bucket => &["tags"],
      ResourceKind::PublicAccessSetting => &["bucket"],
      ResourceKind::WebsiteConfig => &["bucket"],
      ResourceKind::UploadedObject => &["bucket", "key"],
      ResourceKind::AccessPolicy => &["bucket", "policy"],
      ResourceKind::OriginAccessControl => &[],
      ResourceKind::CdnDistribution => &["origins", "default_cache_behavior", "tags"],
    }
  }

  /// Outputs available after a successful realize step.
  pub fn outputs(&self) -> &'static [&'static str] {
    match self {
      ResourceKind::Bucket => &["id", "arn", "bucket_domain_name", "bucket_regional_domain_name"],
      ResourceKind::PublicAccessSetting => &["id"],
      ResourceKind::WebsiteConfig => &["id", "website_endpoint", "website_domain"],
      ResourceKind::UploadedObject => &["id", "key", "etag"],
      ResourceKind::AccessPolicy => &["id"],
      ResourceKind::OriginAccessControl => &["id", "etag"],
      ResourceKind::CdnDistribution => &["id", "arn", "domain_name", "hosted_zone_id"],
    }
  }

  pub fn is_deferrable(&self, input: &str) -> bool {
    self.deferrable_inputs().contains(&input)
  }

  pub fn produces(&self, output: &str) -> bool {
    self.outputs().contains(&output)
  }

  /// The snake_case name used in stack definitions.
  pub fn as_str(&self) -> &'static str {
    match self {
      ResourceKind::Bucket => "bucket",
      ResourceKind::PublicAccessSetting => "public_access_setting",
      ResourceKind::WebsiteConfig => "website_config",
      ResourceKind::UploadedObject => "uploaded_object",
      ResourceKind::AccessPolicy => "access_policy",
      ResourceKind::OriginAccessControl => "origin_access_control",
      ResourceKind::CdnDistribution => "cdn_distribution",
    }
  }
}

impl fmt::Display for ResourceKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_every_kind_produces_an_id() {
    for kind in ResourceKind::ALL {
      assert!(kind.produces("id"), "{kind} must produce an id");
    }
  }

  #[test]
  fn test_serde_names_match_as_str() {
    for kind in ResourceKind::ALL {
      let json = serde_json::to_value(kind).unwrap();
      assert_eq!(json, serde_json::Value::String(kind.as_str().to_string()));
    }
  }

  #[test]
  fn test_bucket_outputs() {
    assert!(ResourceKind::Bucket.produces("arn"));
    assert!(ResourceKind::Bucket.produces("bucket_regional_domain_name"));
    assert!(!ResourceKind::Bucket.produces("website_endpoint"));
  }
}
