//! Match/mismatch predicates between an actual and an expected answer.
//!
//! Every predicate takes text on both sides. Structured modes parse that
//! text and fall back to [`compare_text`] when either side is not a JSON
//! object, so a bad answer is a mismatch and never an error.

use std::collections::BTreeSet;
use std::str::FromStr;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Error;

type Object = Map<String, Value>;

const REGION_FIELDS: [&str; 3] = ["province", "city", "district"];
const DETAIL_FIELDS: [&str; 2] = ["street", "address"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum CompareMode
{   /// Trimmed, case-insensitive string equality
    #[default]
    Text
  , /// Flat key/value equality
    Json
  , /// province / city / district plus street
    Region
  , /// Flat equality with covering match for lists
    ComplexJson
}

impl CompareMode
{   pub const ALL: [CompareMode; 4] = [
      CompareMode::Text
    , CompareMode::Json
    , CompareMode::Region
    , CompareMode::ComplexJson
    ];

    pub fn name(&self) -> &'static str
    {   match self
        {   CompareMode::Text => "compare_text"
          , CompareMode::Json => "compare_json"
          , CompareMode::Region => "compare_region"
          , CompareMode::ComplexJson => "compare_complex_json"
        }
    }

    pub fn label(&self) -> &'static str
    {   match self
        {   CompareMode::Text => "字符串比较"
          , CompareMode::Json => "JSON比较"
          , CompareMode::Region => "地区比较"
          , CompareMode::ComplexJson => "多层级JSON比较"
        }
    }

    pub fn compare(&self, actual: Option<&str>, expected: Option<&str>) -> bool
    {   match self
        {   CompareMode::Text => compare_text(actual, expected)
          , CompareMode::Json => compare_json(actual, expected)
          , CompareMode::Region => compare_region(actual, expected)
          , CompareMode::ComplexJson => compare_complex_json(actual, expected)
        }
    }
}

impl FromStr for CompareMode
{   type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {   CompareMode::ALL.iter()
          .find(|m| m.name() == s.trim())
          .copied()
          .ok_or_else(|| Error::UnknownMode(s.to_string()))
    }
}

pub fn compare_text(actual: Option<&str>, expected: Option<&str>) -> bool
{   match (actual, expected)
    {   (None, None) => true
      , (Some(a), Some(b)) => a.trim().to_lowercase() == b.trim().to_lowercase()
      , _ => false
    }
}

/// Absent or blank text is an empty object; non-objects are `None`
fn parse_object(text: Option<&str>) -> Option<Object>
{   match text.map(str::trim)
    {   None | Some("") => Some(Object::new())
      , Some(t) => match serde_json::from_str(t)
        {   Ok(Value::Object(obj)) => Some(obj)
          , _ => None
        }
    }
}

/// Shared prelude of the structured modes.
/// `Err` carries the verdict when no field comparison is needed.
fn object_pair(
  actual: Option<&str>
, expected: Option<&str>
) -> Result<(Object, Object), bool>
{   let (a, b) = match (parse_object(actual), parse_object(expected))
    {   (Some(a), Some(b)) => (a, b)
      , _ => return Err(compare_text(actual, expected))
    };
    match (a.is_empty(), b.is_empty())
    {   (true, true) => Err(true)
      , (true, false) | (false, true) => Err(false)
      , (false, false) => Ok((a, b))
    }
}

/// String value as is, anything else as JSON text, null as ""
fn scalar_text(v: &Value) -> String
{   match v
    {   Value::String(s) => s.clone()
      , Value::Null => String::new()
      , other => other.to_string()
    }
}

fn union_keys<'a>(a: &'a Object, b: &'a Object) -> BTreeSet<&'a String>
{   a.keys().chain(b.keys()).collect()
}

fn values_equal(a: &Value, b: &Value) -> bool
{   match (a, b)
    {   (Value::String(x), Value::String(y)) => x.trim() == y.trim()
      , _ => a == b
    }
}

pub fn compare_json(actual: Option<&str>, expected: Option<&str>) -> bool
{   let (a, b) = match object_pair(actual, expected)
    {   Ok(pair) => pair
      , Err(verdict) => return verdict
    };
    let keys = union_keys(&a, &b);
    let same = keys.into_iter().all(|key| {
      match (a.get(key), b.get(key))
      {   (Some(x), Some(y)) => values_equal(x, y)
        , _ => false
      }
    });
    same
}

fn field_text(obj: &Object, key: &str) -> String
{   obj.get(key).map(scalar_text).unwrap_or_default()
}

fn detail_text(obj: &Object) -> String
{   DETAIL_FIELDS.iter()
      .find_map(|k| obj.get(*k))
      .map(scalar_text)
      .unwrap_or_default()
}

pub fn compare_region(actual: Option<&str>, expected: Option<&str>) -> bool
{   let (a, b) = match object_pair(actual, expected)
    {   Ok(pair) => pair
      , Err(verdict) => return verdict
    };
    REGION_FIELDS.iter().all(|f| {
      field_text(&a, f).trim() == field_text(&b, f).trim()
    }) && detail_text(&a) == detail_text(&b)
}

/// A list as is; null as empty; a scalar as a one-element list
fn as_list(v: &Value) -> Vec<Value>
{   match v
    {   Value::Array(items) => items.clone()
      , Value::Null => Vec::new()
      , other => vec![other.clone()]
    }
}

/// Every actual element must find a matching expected element
pub fn covers(actual: &[Value], expected: &[Value]) -> bool
{   actual.iter().all(|item| match item
    {   Value::Object(a) => expected.iter().any(|candidate| match candidate
        {   Value::Object(e) => a.iter().all(|(k, v)| {
              scalar_text(v).trim() == field_text(e, k).trim()
            })
          , _ => false
        })
      , other => expected.contains(other)
    })
}

pub fn compare_complex_json(actual: Option<&str>, expected: Option<&str>) -> bool
{   let parse = |t: Option<&str>| t.and_then(|t| serde_json::from_str::<Value>(t).ok());
    if let (Some(a), Some(b)) = (parse(actual), parse(expected))
    {   if a.is_array() || b.is_array()
        {   return covers(&as_list(&a), &as_list(&b));
        }
    }

    let (a, b) = match object_pair(actual, expected)
    {   Ok(pair) => pair
      , Err(verdict) => return verdict
    };
    let keys = union_keys(&a, &b);
    let same = keys.into_iter().all(|key| {
      match (a.get(key), b.get(key))
      {   (Some(x), Some(y)) if x.is_array() || y.is_array() => {
            covers(&as_list(x), &as_list(y))
          }
        , (Some(x), Some(y)) => scalar_text(x).trim() == scalar_text(y).trim()
        , _ => false
      }
    });
    same
}

#[cfg(test)]
mod tests
{   use super::*;

    #[test]
    fn test_text_absent_values()
    {   assert!(compare_text(None, None));
        assert!(!compare_text(None, Some("x")));
        assert!(!compare_text(Some("x"), None));
    }

    #[test]
    fn test_text_trim_and_case()
    {   assert!(compare_text(Some("  Shanghai\n"), Some("shanghai")));
        assert!(!compare_text(Some("Shanghai"), Some("Beijing")));
    }

    #[test]
    fn test_json_empty_rules()
    {   assert!(compare_json(Some("{}"), Some("{}")));
        assert!(compare_json(Some(""), None));
        assert!(!compare_json(Some(r#"{"a":"1"}"#), Some("{}")));
        assert!(!compare_json(Some("{}"), Some(r#"{"a":"1"}"#)));
    }

    #[test]
    fn test_json_values()
    {   assert!(compare_json(
          Some(r#"{"a":" 1 ","b":2}"#),
          Some(r#"{"b":2,"a":"1"}"#)
        ));
        assert!(!compare_json(
          Some(r#"{"a":"1"}"#),
          Some(r#"{"a":"1","b":null}"#)
        ));
        assert!(!compare_json(Some(r#"{"a":1}"#), Some(r#"{"a":"1"}"#)));
    }

    #[test]
    fn test_unparseable_falls_back_to_text()
    {   assert!(compare_json(Some("Hangzhou"), Some(" hangzhou ")));
        assert!(compare_region(Some("[1]"), Some("[1]")));
        assert!(!compare_complex_json(Some("{oops"), Some("{}")));
    }

    #[test]
    fn test_region_fields()
    {   let expected = Some(r#"{"province":"浙江省","city":"杭州市","district":"西湖区","street":"文三路"}"#);
        assert!(compare_region(
          Some(r#"{"province":" 浙江省","city":"杭州市 ","district":"西湖区","address":"文三路","extra":1}"#),
          expected
        ));
        assert!(!compare_region(
          Some(r#"{"province":"浙江省","city":"杭州市","district":"西湖区","street":"文二路"}"#),
          expected
        ));
        assert!(!compare_region(
          Some(r#"{"province":"浙江省","city":"宁波市","district":"西湖区","street":"文三路"}"#),
          expected
        ));
    }

    #[test]
    fn test_complex_covering_match()
    {   let actual = Some(r#"[{"k":"v"}]"#);
        assert!(compare_complex_json(actual, Some(r#"[{"k":"v"},{"k":"w"}]"#)));
        assert!(!compare_complex_json(actual, Some(r#"[{"k":"w"}]"#)));
    }

    #[test]
    fn test_complex_nested_field()
    {   let expected = Some(r#"{"name":"张三","行政地址":[{"省":"江苏省","市":"苏州市"},{"省":"广东省","市":"深圳市"}]}"#);
        assert!(compare_complex_json(
          Some(r#"{"name":" 张三 ","行政地址":[{"省":"广东省","市":"深圳市 "}]}"#),
          expected
        ));
        assert!(!compare_complex_json(
          Some(r#"{"name":"张三","行政地址":[{"省":"浙江省"}]}"#),
          expected
        ));
        assert!(!compare_complex_json(
          Some(r#"{"行政地址":[{"省":"广东省","市":"深圳市"}]}"#),
          expected
        ));
    }

    #[test]
    fn test_complex_scalar_wrapped_into_list()
    {   assert!(compare_complex_json(
          Some(r#"{"tags":"a"}"#),
          Some(r#"{"tags":["a","b"]}"#)
        ));
        assert!(!compare_complex_json(
          Some(r#"{"tags":["c"]}"#),
          Some(r#"{"tags":["a","b"]}"#)
        ));
    }

    #[test]
    fn test_mode_parse()
    {   for mode in CompareMode::ALL
        {   assert_eq!(mode.name().parse::<CompareMode>(), Ok(mode));
        }
        assert!("compare_vibes".parse::<CompareMode>().is_err());
        assert!(CompareMode::Json.compare(Some("{}"), Some("{}")));
    }
}
