//! JSON recovery for model output.
//!
//! Models asked for JSON routinely wrap it in markdown fences, use single
//! or typographic quotes, leave keys bare, end with trailing commas or stop
//! mid-object. [`fix_json`] walks a fixed fallback chain and reports which
//! stage produced the value, so callers can count how often each one fires:
//!
//! 1. strict parse of the raw text
//! 2. parse after stripping code fences
//! 3. parse after [`repair_json`]
//! 4. empty object

use serde::Serialize;
use serde_json::{Map, Value};
use log::debug;

/// Which stage of the fallback chain produced a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RepairStage
{   Strict
  , FenceStripped
  , Repaired
  , Empty
}

pub fn empty_value() -> Value
{   Value::Object(Map::new())
}

/// Remove every "```json" and "```" marker
pub fn strip_fences(text: &str) -> String
{   text.replace("```json", "")
      .replace("```", "")
      .trim()
      .to_string()
}

fn parse(text: &str) -> Option<Value>
{   serde_json::from_str(text.trim()).ok()
}

/// Strict chain: parse, fence-strip, repair, then `{}`
pub fn fix_json(text: &str) -> (Value, RepairStage)
{   let (value, stage) = match parse(text)
    {   Some(v) => (v, RepairStage::Strict)
      , None => {
          let stripped = strip_fences(text);
          match parse(&stripped)
          {   Some(v) => (v, RepairStage::FenceStripped)
            , None => repair_json(&stripped)
                .and_then(|fixed| parse(&fixed))
                .filter(|v| v.is_object() || v.is_array())
                .map(|v| (v, RepairStage::Repaired))
                .unwrap_or_else(|| (empty_value(), RepairStage::Empty))
          }
        }
    };
    debug!("fix_json resolved at {:?}", stage);
    (value, stage)
}

/// Lenient chain: parse, fence-strip, then `{}`
pub fn simple_fix_json(text: &str) -> (Value, RepairStage)
{   let (value, stage) = match parse(text)
    {   Some(v) => (v, RepairStage::Strict)
      , None => match parse(&strip_fences(text))
        {   Some(v) => (v, RepairStage::FenceStripped)
          , None => (empty_value(), RepairStage::Empty)
        }
    };
    debug!("simple_fix_json resolved at {:?}", stage);
    (value, stage)
}

/// Closing quotes accepted for an opening quote
fn closers_for(c: char) -> Option<&'static [char]>
{   match c
    {   '"' => Some(&['"'])
      , '\'' => Some(&['\''])
      , '\u{201c}' | '\u{201d}' => Some(&['\u{201d}', '\u{201c}', '"'])
      , '\u{2018}' | '\u{2019}' => Some(&['\u{2019}', '\u{2018}', '\''])
      , _ => None
    }
}

fn last_significant(out: &str) -> Option<char>
{   out.trim_end().chars().last()
}

/// A value just ended, so the next value needs a separator
fn needs_comma(out: &str) -> bool
{   matches!(
      last_significant(out),
      Some(c) if c == '"' || c == '}' || c == ']' || c.is_alphanumeric()
    )
}

/// A quote closes the string only when followed by structure
fn closes_here(chars: &[char], from: usize) -> bool
{   match chars[from..].iter().find(|c| !c.is_whitespace())
    {   None => true
      , Some(c) => matches!(c, ':' | ',' | '}' | ']')
    }
}

fn close_container(out: &mut String, closer: char)
{   let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    if out.ends_with(',')
    {   out.pop();
        let trimmed = out.trim_end().len();
        out.truncate(trimmed);
    }
    if out.ends_with(':')
    {   out.push_str("null");
    }
    out.push(closer);
}

fn push_escaped(out: &mut String, c: char)
{   match c
    {   '"' => out.push_str("\\\"")
      , '\n' => out.push_str("\\n")
      , '\r' => out.push_str("\\r")
      , '\t' => out.push_str("\\t")
      , c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32))
      , c => out.push(c)
    }
}

fn read_string(chars: &[char], start: usize, out: &mut String) -> usize
{   let closers = closers_for(chars[start]).unwrap_or(&['"']);
    out.push('"');
    let mut escaped = false;
    let mut i = start + 1;
    while i < chars.len()
    {   let c = chars[i];
        i += 1;
        if escaped
        {   out.push(c);
            escaped = false;
        } else if c == '\\'
        {   out.push('\\');
            escaped = true;
        } else if closers.contains(&c) && closes_here(chars, i)
        {   out.push('"');
            return i;
        } else
        {   push_escaped(out, c);
        }
    }
    if escaped
    {   out.push('\\');
    }
    out.push('"');
    i
}

fn read_number(chars: &[char], start: usize, out: &mut String) -> usize
{   let end = chars[start..].iter()
      .position(|c| !(c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E')))
      .map(|p| start + p)
      .unwrap_or(chars.len());
    let run: String = chars[start..end].iter().collect();
    if serde_json::from_str::<serde_json::Number>(&run).is_ok()
    {   out.push_str(&run);
    } else
    {   out.push_str(&Value::String(run).to_string());
    }
    end
}

fn read_bare(chars: &[char], start: usize, out: &mut String) -> usize
{   let end = chars[start..].iter()
      .position(|c| matches!(c, ':' | ',' | '{' | '}' | '[' | ']' | '"' | '\n'))
      .map(|p| start + p)
      .unwrap_or(chars.len());
    let run: String = chars[start..end].iter().collect();
    match run.trim()
    {   "" => {}
      , "true" | "True" | "TRUE" => out.push_str("true")
      , "false" | "False" | "FALSE" => out.push_str("false")
      , "null" | "None" | "NULL" | "none" => out.push_str("null")
      , word => out.push_str(&Value::String(word.to_string()).to_string())
    }
    end
}

/// Best-effort rewrite of almost-JSON into JSON.
///
/// Returns `None` when the text holds no object or array at all. The
/// output is not guaranteed to parse; the caller decides.
pub fn repair_json(text: &str) -> Option<String>
{   let start = text.find(|c| c == '{' || c == '[')?;
    let chars: Vec<char> = text[start..].chars().collect();
    let mut out = String::with_capacity(chars.len() + 8);
    let mut stack: Vec<char> = Vec::new();
    let mut i = 0;

    while i < chars.len()
    {   let c = chars[i];
        match c
        {   '{' | '[' => {
              if needs_comma(&out)
              {   out.push(',');
              }
              stack.push(if c == '{' { '}' } else { ']' });
              out.push(c);
              i += 1;
            }
          , '}' | ']' => {
              i += 1;
              // unmatched closers are dropped
              if let Some(pos) = stack.iter().rposition(|&s| s == c)
              {   while stack.len() > pos
                  {   if let Some(closer) = stack.pop()
                      {   close_container(&mut out, closer);
                      }
                  }
                  if stack.is_empty()
                  {   break;
                  }
              }
            }
          , ',' => {
              if !matches!(
                last_significant(&out),
                None | Some(',') | Some('{') | Some('[') | Some(':')
              )
              {   out.push(',');
              }
              i += 1;
            }
          , ':' => {
              out.push(':');
              i += 1;
            }
          , c if c.is_whitespace() => {
              out.push(c);
              i += 1;
            }
          , c if closers_for(c).is_some() => {
              if needs_comma(&out)
              {   out.push(',');
              }
              i = read_string(&chars, i, &mut out);
            }
          , c if c == '-' || c.is_ascii_digit() => {
              if needs_comma(&out)
              {   out.push(',');
              }
              i = read_number(&chars, i, &mut out);
            }
          , c if c.is_alphanumeric() || c == '_' || c == '$' => {
              if needs_comma(&out)
              {   out.push(',');
              }
              i = read_bare(&chars, i, &mut out);
            }
          , _ => {
              i += 1;
            }
        }
    }

    while let Some(closer) = stack.pop()
    {   close_container(&mut out, closer);
    }
    Some(out)
}

#[cfg(test)]
mod tests
{   use super::*;
    use serde_json::json;

    fn repaired(text: &str) -> Value
    {   let (value, stage) = fix_json(text);
        assert_eq!(stage, RepairStage::Repaired, "input: {}", text);
        value
    }

    #[test]
    fn test_valid_json_is_strict()
    {   let (v, stage) = fix_json(r#"{"province":"上海","city":"上海市"}"#);
        assert_eq!(stage, RepairStage::Strict);
        assert_eq!(v, json!({"province": "上海", "city": "上海市"}));
    }

    #[test]
    fn test_fenced_json()
    {   let text = "```json\n{\"a\": 1}\n```";
        let (v, stage) = fix_json(text);
        assert_eq!(stage, RepairStage::FenceStripped);
        assert_eq!(v, json!({"a": 1}));
    }

    #[test]
    fn test_trailing_commas()
    {   assert_eq!(
          repaired(r#"{"a": [1, 2, ], "b": "x",}"#),
          json!({"a": [1, 2], "b": "x"})
        );
    }

    #[test]
    fn test_single_quotes_and_bare_keys()
    {   assert_eq!(
          repaired("{'province': '浙江', city: '杭州'}"),
          json!({"province": "浙江", "city": "杭州"})
        );
    }

    #[test]
    fn test_typographic_quotes()
    {   assert_eq!(
          repaired("{\u{201c}a\u{201d}: \u{201c}b\u{201d}}"),
          json!({"a": "b"})
        );
    }

    #[test]
    fn test_truncated_output_is_balanced()
    {   assert_eq!(
          repaired(r#"{"list": [{"k": "v"}, {"k": "w"#),
          json!({"list": [{"k": "v"}, {"k": "w"}]})
        );
    }

    #[test]
    fn test_dangling_key_gets_null()
    {   assert_eq!(repaired(r#"{"a": 1, "b": "#), json!({"a": 1, "b": null}));
    }

    #[test]
    fn test_prose_around_json()
    {   assert_eq!(
          repaired("Sure! Here it is: {\"ok\": True, \"n\": None} hope it helps"),
          json!({"ok": true, "n": null})
        );
    }

    #[test]
    fn test_inner_quote_kept_in_string()
    {   assert_eq!(
          repaired(r#"{"say": "he said "hi" twice"}"#),
          json!({"say": "he said \"hi\" twice"})
        );
    }

    #[test]
    fn test_missing_comma_inserted()
    {   assert_eq!(
          repaired("{\"a\": 1\n\"b\": 2}"),
          json!({"a": 1, "b": 2})
        );
    }

    #[test]
    fn test_unrecoverable_is_empty()
    {   let (v, stage) = fix_json("I could not find an address.");
        assert_eq!(stage, RepairStage::Empty);
        assert_eq!(v, json!({}));
    }

    #[test]
    fn test_simple_fix_does_not_repair()
    {   let (v, stage) = simple_fix_json("{'a': 1}");
        assert_eq!(stage, RepairStage::Empty);
        assert_eq!(v, json!({}));

        let (v, stage) = simple_fix_json("```json\n[1, 2]\n```");
        assert_eq!(stage, RepairStage::FenceStripped);
        assert_eq!(v, json!([1, 2]));
    }
}
