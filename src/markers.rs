//! Marker annotation conventions recognized and attached by the rewriter.
//!
//! The serialization layer discovers members by visibility, so widening a
//! private element can silently pull it into serialization. The rewriter
//! compensates by attaching zero-argument marker annotations. Markers are
//! recognized by name fragment rather than typed identity, so the rewriter
//! does not take a hard dependency on one serialization library version; the
//! recognized set is configurable through [`MarkerSet`], with
//! [`MarkerSet::default`] matching the Newtonsoft.Json conventions.

/// The compensating marker kinds the rewriter can schedule for attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    /// "Do not serialize this member."
    Exclude,
    /// "This member was never serialized under the original conventions."
    ///
    /// Informational; the serialization layer may ignore it, but it records
    /// that the member's exposure is an artifact of rewriting.
    Historical,
}

/// Identity of a zero-argument marker annotation type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerType {
    /// Simple name of the assembly defining the marker, or `None` when the
    /// marker lives in the module's core library (`mscorlib`,
    /// `System.Runtime` or `System.Private.CoreLib`).
    pub assembly: Option<String>,
    /// Namespace of the marker type
    pub namespace: String,
    /// Type name of the marker
    pub name: String,
}

impl MarkerType {
    /// Creates a marker identity defined in a named assembly.
    pub fn new(assembly: &str, namespace: &str, name: &str) -> Self {
        MarkerType {
            assembly: Some(assembly.to_string()),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Creates a marker identity resolved from the module's core library.
    pub fn core_library(namespace: &str, name: &str) -> Self {
        MarkerType {
            assembly: None,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// The namespace-qualified type name, e.g.
    /// `Newtonsoft.Json.JsonIgnoreAttribute`.
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

/// The set of serialization marker conventions one rewrite session honors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerSet {
    /// Attached when widening would otherwise expose a member to
    /// serialization discovery.
    pub exclude: MarkerType,
    /// Attached to record that a member was never serialized historically.
    pub historical: MarkerType,
    /// Name fragment identifying an explicit opt-in to serialization,
    /// matched as a substring of an annotation's qualified type name.
    pub include_fragment: String,
}

impl Default for MarkerSet {
    fn default() -> Self {
        MarkerSet {
            exclude: MarkerType::new("Newtonsoft.Json", "Newtonsoft.Json", "JsonIgnoreAttribute"),
            historical: MarkerType::core_library("System", "NonSerializedAttribute"),
            include_fragment: "JsonPropertyAttribute".to_string(),
        }
    }
}

impl MarkerSet {
    /// Returns true if any of the given annotation type names opts the
    /// element into serialization explicitly by name.
    pub fn has_explicit_include(&self, attribute_names: &[String]) -> bool {
        attribute_names
            .iter()
            .any(|name| name.contains(&self.include_fragment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_set_matches_newtonsoft_conventions() {
        let set = MarkerSet::default();
        assert_eq!(set.exclude.full_name(), "Newtonsoft.Json.JsonIgnoreAttribute");
        assert_eq!(set.historical.full_name(), "System.NonSerializedAttribute");
        assert_eq!(set.historical.assembly, None);
    }

    #[test]
    fn explicit_include_is_a_substring_match() {
        let set = MarkerSet::default();
        let attrs = vec!["Newtonsoft.Json.JsonPropertyAttribute".to_string()];
        assert!(set.has_explicit_include(&attrs));

        let unrelated = vec![
            "System.ObsoleteAttribute".to_string(),
            "Newtonsoft.Json.JsonIgnoreAttribute".to_string(),
        ];
        assert!(!set.has_explicit_include(&unrelated));
        assert!(!set.has_explicit_include(&[]));
    }

    #[test]
    fn full_name_without_namespace() {
        let marker = MarkerType::core_library("", "GlobalAttribute");
        assert_eq!(marker.full_name(), "GlobalAttribute");
    }
}
