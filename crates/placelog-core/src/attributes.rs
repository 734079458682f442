//! Flattening nested values into engine attributes
//!
//! Engine objects only store flat `name -> primitive` attributes. A nested
//! map is stored as one attribute per leaf, named by joining the path
//! segments with `_`: `{stats: {kills: 3}}` under prefix `Player` becomes
//! `Player_stats_kills = 3`. Lists are stored under their 1-based index and
//! decode back as integer-keyed maps.
//!
//! Bad names are programmer errors and are returned straight to the caller.

use std::collections::BTreeMap;

use placelog_events::{MapKey, Value};

pub const MAX_ATTRIBUTE_NAME_LEN: usize = 100;

/// Names with this prefix belong to the engine
pub const RESERVED_PREFIX: &str = "RBX";

const SEPARATOR: char = '_';

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttributeError {
    #[error("attribute name is empty")]
    Empty,
    #[error("attribute name {name:?} is {len} characters, limit is {}", MAX_ATTRIBUTE_NAME_LEN)]
    TooLong { name: String, len: usize },
    #[error("attribute name {name:?} contains invalid character {ch:?}")]
    InvalidCharacter { name: String, ch: char },
    #[error("attribute name {0:?} uses the reserved {prefix} prefix", prefix = RESERVED_PREFIX)]
    Reserved(String),
    #[error("map key {0:?} must be non-empty and alphanumeric")]
    InvalidSegment(String),
    #[error("attribute {name:?} holds both a value and nested keys")]
    Conflict { name: String },
}

/// Check a full attribute name against the engine's naming rules
pub fn validate_attribute_name(name: &str) -> Result<(), AttributeError> {
    if name.is_empty() {
        return Err(AttributeError::Empty);
    }

    let len = name.chars().count();
    if len > MAX_ATTRIBUTE_NAME_LEN {
        return Err(AttributeError::TooLong {
            name: name.to_string(),
            len,
        });
    }

    if let Some(ch) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == SEPARATOR))
    {
        return Err(AttributeError::InvalidCharacter {
            name: name.to_string(),
            ch,
        });
    }

    if name.starts_with(RESERVED_PREFIX) {
        return Err(AttributeError::Reserved(name.to_string()));
    }

    Ok(())
}

fn segment(key: &MapKey) -> Result<String, AttributeError> {
    let text = key.to_string();
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AttributeError::InvalidSegment(text));
    }
    Ok(text)
}

/// Flatten `value` into attributes named under `prefix`.
///
/// `Null` leaves are skipped since setting an attribute to nil removes it.
pub fn encode_attributes(prefix: &str, value: &Value) -> Result<Vec<(String, Value)>, AttributeError> {
    validate_attribute_name(prefix)?;
    let mut out = Vec::new();
    encode_into(prefix.to_string(), value, &mut out)?;
    Ok(out)
}

fn encode_into(
    name: String,
    value: &Value,
    out: &mut Vec<(String, Value)>,
) -> Result<(), AttributeError> {
    match value {
        Value::Null => Ok(()),
        Value::Map(map) => {
            for (key, child) in map {
                let child_name = format!("{}{}{}", name, SEPARATOR, segment(key)?);
                validate_attribute_name(&child_name)?;
                encode_into(child_name, child, out)?;
            }
            Ok(())
        }
        Value::List(items) => {
            for (i, child) in items.iter().enumerate() {
                let child_name = format!("{}{}{}", name, SEPARATOR, i + 1);
                validate_attribute_name(&child_name)?;
                encode_into(child_name, child, out)?;
            }
            Ok(())
        }
        primitive => {
            out.push((name, primitive.clone()));
            Ok(())
        }
    }
}

/// Rebuild the value stored under `prefix` from flat attributes.
///
/// Attributes outside the prefix are ignored. Returns `None` when nothing is
/// stored under the prefix.
pub fn decode_attributes<I>(prefix: &str, attributes: I) -> Result<Option<Value>, AttributeError>
where
    I: IntoIterator<Item = (String, Value)>,
{
    validate_attribute_name(prefix)?;
    let nested_prefix = format!("{}{}", prefix, SEPARATOR);

    let mut root: Option<Value> = None;
    let mut tree: BTreeMap<MapKey, Value> = BTreeMap::new();

    for (name, value) in attributes {
        if name == prefix {
            root = Some(value);
            continue;
        }
        let Some(rest) = name.strip_prefix(&nested_prefix) else {
            continue;
        };

        let path: Vec<MapKey> = rest.split(SEPARATOR).map(parse_segment).collect();
        insert_path(&mut tree, &path, value, &name)?;
    }

    match (root, tree.is_empty()) {
        (Some(_), false) => Err(AttributeError::Conflict {
            name: prefix.to_string(),
        }),
        (Some(value), true) => Ok(Some(value)),
        (None, false) => Ok(Some(Value::Map(tree))),
        (None, true) => Ok(None),
    }
}

fn parse_segment(s: &str) -> MapKey {
    match s.parse::<i64>() {
        Ok(n) if n.to_string() == s => MapKey::Int(n),
        _ => MapKey::Str(s.to_string()),
    }
}

fn insert_path(
    tree: &mut BTreeMap<MapKey, Value>,
    path: &[MapKey],
    value: Value,
    full_name: &str,
) -> Result<(), AttributeError> {
    let conflict = || AttributeError::Conflict {
        name: full_name.to_string(),
    };

    match path {
        [] => Err(AttributeError::InvalidSegment(full_name.to_string())),
        [leaf] => {
            if tree.contains_key(leaf) {
                return Err(conflict());
            }
            tree.insert(leaf.clone(), value);
            Ok(())
        }
        [head, rest @ ..] => {
            let child = tree
                .entry(head.clone())
                .or_insert_with(|| Value::Map(BTreeMap::new()));
            match child {
                Value::Map(map) => insert_path(map, rest, value, full_name),
                _ => Err(conflict()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(validate_attribute_name("Player_stats_1").is_ok());
        assert!(validate_attribute_name(&"a".repeat(MAX_ATTRIBUTE_NAME_LEN)).is_ok());
    }

    #[test]
    fn test_invalid_names() {
        assert_eq!(validate_attribute_name(""), Err(AttributeError::Empty));
        assert!(matches!(
            validate_attribute_name("has space"),
            Err(AttributeError::InvalidCharacter { ch: ' ', .. })
        ));
        assert!(matches!(
            validate_attribute_name(&"a".repeat(MAX_ATTRIBUTE_NAME_LEN + 1)),
            Err(AttributeError::TooLong { .. })
        ));
        assert!(matches!(
            validate_attribute_name("RBXThing"),
            Err(AttributeError::Reserved(_))
        ));
        assert_eq!(
            AttributeError::Reserved("RBXThing".to_string()).to_string(),
            "attribute name \"RBXThing\" uses the reserved RBX prefix"
        );
    }

    #[test]
    fn test_nested_map_roundtrip() {
        let value = Value::map()
            .insert("stats", Value::map().insert("kills", 3).insert("deaths", 1))
            .insert("team", "red");

        let attrs = encode_attributes("Player", &value).unwrap();
        let names: Vec<&str> = attrs.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec!["Player_stats_deaths", "Player_stats_kills", "Player_team"]
        );

        let decoded = decode_attributes("Player", attrs).unwrap();
        assert_eq!(decoded, Some(value));
    }

    #[test]
    fn test_list_decodes_as_indexed_map() {
        let attrs = encode_attributes("Inv", &Value::from(vec!["sword", "shield"])).unwrap();
        assert_eq!(attrs[0], ("Inv_1".to_string(), Value::from("sword")));

        let decoded = decode_attributes("Inv", attrs).unwrap().unwrap();
        let map = decoded.as_map().unwrap();
        assert_eq!(map.get(&MapKey::Int(2)), Some(&Value::from("shield")));
    }

    #[test]
    fn test_key_with_separator_rejected() {
        let value = Value::map().insert("bad_key", 1);
        assert_eq!(
            encode_attributes("P", &value),
            Err(AttributeError::InvalidSegment("bad_key".to_string()))
        );
    }

    #[test]
    fn test_primitive_under_prefix() {
        let attrs = encode_attributes("Score", &Value::from(10)).unwrap();
        assert_eq!(attrs, vec![("Score".to_string(), Value::from(10))]);
        assert_eq!(
            decode_attributes("Score", attrs).unwrap(),
            Some(Value::from(10))
        );
    }

    #[test]
    fn test_conflicting_attributes() {
        let attrs = vec![
            ("P_a".to_string(), Value::from(1)),
            ("P_a_b".to_string(), Value::from(2)),
        ];
        assert!(matches!(
            decode_attributes("P", attrs),
            Err(AttributeError::Conflict { .. })
        ));
    }

    #[test]
    fn test_unrelated_attributes_ignored() {
        let attrs = vec![("Other_a".to_string(), Value::from(1))];
        assert_eq!(decode_attributes("P", attrs).unwrap(), None);
    }
}
