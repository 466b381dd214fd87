//! Method registry: which methods each kind of remote object supports and
//! how a call turns into a REST request.
//!
//! Method names are looked up exactly (they are case-sensitive, as the CSV
//! templates spell them). A name with no entry for the target kind is a
//! dispatch error and never reaches the network.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

use super::handle::odata_literal;
use crate::domain::script::TargetKind;
use crate::error::RowError;
use crate::http::RestRequest;

/// HTTP shape of a method call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    /// POST tunnelled as MERGE (partial update)
    Merge,
    Delete,
}

/// How decoded arguments are placed into the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgShape {
    /// Arguments are ignored
    NoArgs,
    /// The first argument is a properties object sent as the body
    Body,
    /// Positional arguments become a JSON object with these keys
    Named(&'static [&'static str]),
    /// Positional arguments become inline OData parameters: `Endpoint(a='x',b=1)`
    Inline(&'static [&'static str]),
}

/// A typed invocation description for one method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodSpec {
    pub verb: Verb,
    /// Path segment appended to the object URI; empty targets the object itself
    pub endpoint: &'static str,
    pub args: ArgShape,
}

impl MethodSpec {
    pub const fn new(verb: Verb, endpoint: &'static str, args: ArgShape) -> Self {
        Self {
            verb,
            endpoint,
            args,
        }
    }

    /// Build the REST request for `method` on the object at `uri`.
    pub fn build(&self, uri: &str, method: &str, args: &[Value]) -> Result<RestRequest, RowError> {
        let bad = |reason: String| RowError::BadArguments {
            method: method.to_string(),
            reason,
        };

        let mut url = if self.endpoint.is_empty() {
            uri.to_string()
        } else {
            format!("{}/{}", uri, self.endpoint)
        };
        let mut body = String::new();

        match self.args {
            ArgShape::NoArgs => {}
            ArgShape::Body => match args.first() {
                Some(Value::Object(properties)) => {
                    body = serde_json::to_string(properties).map_err(|e| bad(e.to_string()))?;
                }
                Some(other) => {
                    return Err(bad(format!("expected a properties object, got {}", other)));
                }
                None => return Err(bad("expected a properties object".to_string())),
            },
            ArgShape::Named(names) => {
                let object: Map<String, Value> = names
                    .iter()
                    .zip(args.iter())
                    .map(|(name, value)| (name.to_string(), value.clone()))
                    .collect();
                body = Value::Object(object).to_string();
            }
            ArgShape::Inline(names) => {
                let mut params = Vec::with_capacity(args.len());
                for (name, value) in names.iter().zip(args.iter()) {
                    let literal = match value {
                        Value::String(s) => odata_literal(s),
                        Value::Number(n) => n.to_string(),
                        Value::Bool(b) => b.to_string(),
                        Value::Null => continue,
                        Value::Array(_) | Value::Object(_) => {
                            return Err(bad(format!("'{}' must be a scalar", name)));
                        }
                    };
                    params.push(format!("{}={}", name.to_lowercase(), literal));
                }
                url = format!("{}({})", url, params.join(","));
            }
        }

        let request = match self.verb {
            Verb::Get => RestRequest::get(url),
            Verb::Post => RestRequest::post(url, body),
            Verb::Merge => RestRequest::post(url, body)
                .header("X-HTTP-Method", "MERGE")
                .header("IF-MATCH", "*"),
            Verb::Delete => RestRequest::delete(url),
        };
        Ok(request)
    }
}

/// Per-kind mapping from method name to invocation description.
#[derive(Debug, Clone, Default)]
pub struct MethodRegistry {
    entries: HashMap<TargetKind, BTreeMap<String, MethodSpec>>,
}

const ROLE_INHERITANCE: &[&str] = &["copyRoleAssignments", "clearSubscopes"];

impl MethodRegistry {
    /// A registry with no methods at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in methods for every target kind.
    pub fn standard() -> Self {
        use ArgShape::{Body, Inline, Named, NoArgs};
        use Verb::{Delete, Get, Merge, Post};

        let mut registry = Self::empty();

        registry
            .register(TargetKind::File, "checkIn", MethodSpec::new(Post, "CheckIn", Inline(&["comment", "checkInType"])))
            .register(TargetKind::File, "checkOut", MethodSpec::new(Post, "CheckOut", NoArgs))
            .register(TargetKind::File, "undoCheckOut", MethodSpec::new(Post, "UndoCheckOut", NoArgs))
            .register(TargetKind::File, "publish", MethodSpec::new(Post, "Publish", Inline(&["comment"])))
            .register(TargetKind::File, "unPublish", MethodSpec::new(Post, "UnPublish", Inline(&["comment"])))
            .register(TargetKind::File, "approve", MethodSpec::new(Post, "Approve", Inline(&["comment"])))
            .register(TargetKind::File, "deny", MethodSpec::new(Post, "Deny", Inline(&["comment"])))
            .register(TargetKind::File, "recycle", MethodSpec::new(Post, "Recycle", NoArgs))
            .register(TargetKind::File, "delete", MethodSpec::new(Delete, "", NoArgs))
            .register(TargetKind::File, "moveTo", MethodSpec::new(Post, "MoveTo", Inline(&["newUrl", "flags"])))
            .register(TargetKind::File, "copyTo", MethodSpec::new(Post, "CopyTo", Inline(&["strNewUrl", "bOverWrite"])));

        for kind in [TargetKind::ListItem, TargetKind::FileAsItem] {
            registry
                .register(kind, "update", MethodSpec::new(Merge, "", Body))
                .register(kind, "delete", MethodSpec::new(Delete, "", NoArgs))
                .register(kind, "recycle", MethodSpec::new(Post, "Recycle", NoArgs))
                .register(kind, "breakRoleInheritance", MethodSpec::new(Post, "BreakRoleInheritance", Inline(ROLE_INHERITANCE)))
                .register(kind, "resetRoleInheritance", MethodSpec::new(Post, "ResetRoleInheritance", NoArgs))
                .register(kind, "validateUpdateListItem", MethodSpec::new(Post, "ValidateUpdateListItem", Named(&["formValues", "bNewDocumentUpdate"])));
        }

        registry
            .register(TargetKind::List, "update", MethodSpec::new(Merge, "", Body))
            .register(TargetKind::List, "delete", MethodSpec::new(Delete, "", NoArgs))
            .register(TargetKind::List, "recycle", MethodSpec::new(Post, "Recycle", NoArgs))
            .register(TargetKind::List, "getItems", MethodSpec::new(Get, "items", NoArgs))
            .register(TargetKind::List, "addItem", MethodSpec::new(Post, "items", Body))
            .register(TargetKind::List, "breakRoleInheritance", MethodSpec::new(Post, "BreakRoleInheritance", Inline(ROLE_INHERITANCE)))
            .register(TargetKind::List, "resetRoleInheritance", MethodSpec::new(Post, "ResetRoleInheritance", NoArgs));

        registry
            .register(TargetKind::Site, "update", MethodSpec::new(Merge, "", Body))
            .register(TargetKind::Site, "ensureUser", MethodSpec::new(Post, "EnsureUser", Named(&["logonName"])))
            .register(TargetKind::Site, "breakRoleInheritance", MethodSpec::new(Post, "BreakRoleInheritance", Inline(ROLE_INHERITANCE)))
            .register(TargetKind::Site, "resetRoleInheritance", MethodSpec::new(Post, "ResetRoleInheritance", NoArgs));

        registry
    }

    /// Add or replace a method for one target kind.
    pub fn register(
        &mut self,
        kind: TargetKind,
        name: impl Into<String>,
        spec: MethodSpec,
    ) -> &mut Self {
        self.entries
            .entry(kind)
            .or_default()
            .insert(name.into(), spec);
        self
    }

    pub fn lookup(&self, kind: TargetKind, name: &str) -> Option<&MethodSpec> {
        self.entries.get(&kind).and_then(|methods| methods.get(name))
    }

    /// Method names for a kind, sorted.
    pub fn methods(&self, kind: TargetKind) -> Vec<&str> {
        self.entries
            .get(&kind)
            .map(|methods| methods.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_is_per_kind_and_case_sensitive() {
        let registry = MethodRegistry::standard();
        assert!(registry.lookup(TargetKind::File, "checkIn").is_some());
        assert!(registry.lookup(TargetKind::File, "checkin").is_none());
        assert!(registry.lookup(TargetKind::Site, "checkIn").is_none());
        assert!(registry.lookup(TargetKind::FileAsItem, "update").is_some());
    }

    #[test]
    fn inline_arguments_become_odata_parameters() {
        let spec = MethodRegistry::standard()
            .lookup(TargetKind::File, "checkIn")
            .copied()
            .unwrap();
        let request = spec
            .build("https://c/_api/web/file", "checkIn", &[json!("it's done"), json!(1)])
            .unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(
            request.url,
            "https://c/_api/web/file/CheckIn(comment='it''s%20done',checkintype=1)"
        );
    }

    #[test]
    fn inline_comment_with_hash_stays_in_the_path() {
        let spec = MethodRegistry::standard()
            .lookup(TargetKind::File, "checkIn")
            .copied()
            .unwrap();
        let request = spec
            .build("https://c/_api/web/file", "checkIn", &[json!("fix #12 & more"), json!(1)])
            .unwrap();

        let url = reqwest::Url::parse(&request.url).unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.query(), None);
        assert!(url.path().ends_with("CheckIn(comment='fix%20%2312%20%26%20more',checkintype=1)"));
    }

    #[test]
    fn merge_sends_properties_body() {
        let spec = MethodRegistry::standard()
            .lookup(TargetKind::ListItem, "update")
            .copied()
            .unwrap();
        let request = spec
            .build("https://c/item", "update", &[json!({"Title": "New"})])
            .unwrap();
        assert_eq!(request.url, "https://c/item");
        assert_eq!(request.body, r#"{"Title":"New"}"#);
        assert!(request
            .headers
            .contains(&("X-HTTP-Method".to_string(), "MERGE".to_string())));
    }

    #[test]
    fn body_method_rejects_scalar_arguments() {
        let spec = MethodSpec::new(Verb::Merge, "", ArgShape::Body);
        let err = spec.build("https://c/item", "update", &[json!(5)]).unwrap_err();
        assert!(matches!(err, RowError::BadArguments { .. }));
    }

    #[test]
    fn named_arguments_build_an_object() {
        let spec = MethodRegistry::standard()
            .lookup(TargetKind::Site, "ensureUser")
            .copied()
            .unwrap();
        let request = spec
            .build("https://c/_api/web", "ensureUser", &[json!("i:0#.f|membership|a@b.c")])
            .unwrap();
        assert_eq!(request.url, "https://c/_api/web/EnsureUser");
        assert_eq!(request.body, r#"{"logonName":"i:0#.f|membership|a@b.c"}"#);
    }

    #[test]
    fn register_extends_a_kind() {
        let mut registry = MethodRegistry::empty();
        registry.register(
            TargetKind::Site,
            "ping",
            MethodSpec::new(Verb::Get, "ping", ArgShape::NoArgs),
        );
        assert_eq!(registry.methods(TargetKind::Site), vec!["ping"]);
        assert!(registry.methods(TargetKind::List).is_empty());
    }
}
