//! Section inheritance and document merging.
//!
//! A section header `[child : parent1 : parent2]` declares that `child`
//! starts out with the keys of its parents. Parents have to appear
//! earlier in the document. Every section also inherits the global keys.
use once_cell::sync::Lazy;
use regex::Regex;

use crate::parser::Document;
use crate::value::{merge_entry, merge_into, Map, Sections};

static RE_PARENTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*:\s*").expect("RE_PARENTS"));

/// Resolve inheritance in the sections of `doc`.
///
/// The result is layered as global keys, then the parents from left to
/// right, then the section's own keys. A compound header is replaced by
/// its child section; if the child already exists it keeps its place in
/// the section order.
pub(crate) fn resolve(doc: Document) -> Document {
    let Document { global, sections } = doc;
    let mut resolved = Sections::new();

    for (name, body) in sections {
        let mut names = RE_PARENTS.split(&name).map(str::trim);
        let child = names.next().unwrap_or_default().to_string();
        let parents: Vec<&str> = names.filter(|p| !p.is_empty()).collect();

        if parents.is_empty() {
            // A plain section header; also when written as `[name :]`.
            match resolved.get_mut(&child) {
                Some(existing) => merge_into(existing, body),
                None => {
                    let mut section = global.clone();
                    merge_into(&mut section, body);
                    resolved.insert(child, section);
                }
            }
            continue;
        }

        trace!("section {} inherits from {:?}", child, parents);
        let mut section = match resolved.get_mut(&child) {
            Some(existing) => std::mem::take(existing),
            None => global.clone(),
        };
        for parent in &parents {
            match resolved.get(*parent) {
                Some(p) => merge_into(&mut section, p.clone()),
                None => warn!("section {}: parent {} not found", child, parent),
            }
        }
        merge_into(&mut section, body);
        match resolved.get_mut(&child) {
            Some(existing) => *existing = section,
            None => {
                resolved.insert(child, section);
            }
        }
    }

    Document {
        global,
        sections: resolved,
    }
}

/// Merge all sections over the global keys, one nested mapping per section.
pub(crate) fn merge(doc: Document) -> Map {
    let Document { global, sections } = doc;
    let mut merged = global;
    for (name, section) in sections {
        merge_entry(&mut merged, name, section.into());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{map, Value};

    fn doc(global: Map, sections: Vec<(&str, Map)>) -> Document {
        Document {
            global,
            sections: sections
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }

    fn s(v: &str) -> Value {
        Value::from(v)
    }

    #[test]
    fn plain_sections_get_global_keys() {
        let d = resolve(doc(
            map(vec![("g", s("1"))]),
            vec![("a", map(vec![("x", s("2")), ("g", s("3"))]))],
        ));
        assert_eq!(d.sections["a"], map(vec![("g", s("3")), ("x", s("2"))]));
        assert_eq!(d.global, map(vec![("g", s("1"))]));
    }

    #[test]
    fn parents_layer_left_to_right() {
        let d = resolve(doc(
            Map::new(),
            vec![
                ("p1", map(vec![("a", s("p1")), ("b", s("p1"))])),
                ("p2", map(vec![("b", s("p2")), ("c", s("p2"))])),
                ("child:p1 : p2", map(vec![("c", s("own"))])),
            ],
        ));
        let names: Vec<_> = d.sections.keys().cloned().collect();
        assert_eq!(names, vec!["p1", "p2", "child"]);
        assert_eq!(
            d.sections["child"],
            map(vec![("a", s("p1")), ("b", s("p2")), ("c", s("own"))])
        );
    }

    #[test]
    fn nested_maps_merge_deeply() {
        let redis = |host: &str| -> Value { map(vec![("host", s(host)), ("db", s("1"))]).into() };
        let d = resolve(doc(
            Map::new(),
            vec![
                ("prod", map(vec![("redis", redis("x"))])),
                ("dev : prod", map(vec![("redis", map(vec![("host", s("localhost"))]).into())])),
            ],
        ));
        assert_eq!(d.sections["dev"], map(vec![("redis", redis("localhost"))]));
    }

    #[test]
    fn existing_child_is_reused() {
        let d = resolve(doc(
            Map::new(),
            vec![
                ("child", map(vec![("own", s("1"))])),
                ("base", map(vec![("b", s("2"))])),
                ("child : base", map(vec![("extra", s("3"))])),
            ],
        ));
        let names: Vec<_> = d.sections.keys().cloned().collect();
        assert_eq!(names, vec!["child", "base"]);
        assert_eq!(
            d.sections["child"],
            map(vec![("own", s("1")), ("b", s("2")), ("extra", s("3"))])
        );
    }

    #[test]
    fn missing_parent_is_skipped() {
        let d = resolve(doc(
            Map::new(),
            vec![
                ("child : later", map(vec![("x", s("1"))])),
                ("later", map(vec![("y", s("2"))])),
            ],
        ));
        assert_eq!(d.sections["child"], map(vec![("x", s("1"))]));
    }

    #[test]
    fn merge_nests_sections() {
        let m = merge(doc(
            map(vec![("g", s("1")), ("s", map(vec![("old", s("0"))]).into())]),
            vec![("s", map(vec![("new", s("2"))])), ("t", Map::new())],
        ));
        assert_eq!(
            m,
            map(vec![
                ("g", s("1")),
                (
                    "s",
                    map(vec![("old", s("0")), ("new", s("2"))]).into()
                ),
                ("t", Map::new().into()),
            ])
        );
    }
}
