//! `$name` placeholders in prompts, filled from table rows

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;
use regex::{Captures, Regex};

fn placeholder() -> &'static Regex
{   static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
      Regex::new(r"\$([a-zA-Z_][a-zA-Z0-9_]*)")
        .expect("placeholder pattern is valid")
    })
}

/// Placeholder names used in `prompt`, without the `$`
pub fn extract_vars(prompt: &str) -> BTreeSet<String>
{   placeholder()
      .captures_iter(prompt)
      .map(|c| c[1].to_string())
      .collect()
}

/// Column name holding the values of `var`
pub fn column_for(var: &str) -> String
{   format!("${}", var)
}

/// Vars with no `$var` column, as column names
pub fn missing_columns<'a, I>(vars: &BTreeSet<String>, columns: I) -> Vec<String>
where I: IntoIterator<Item = &'a String>
{   let columns: BTreeSet<&String> = columns.into_iter().collect();
    vars.iter()
      .map(|v| column_for(v))
      .filter(|c| !columns.contains(c))
      .collect()
}

/// Replace every placeholder with its row value; unknown ones become ""
pub fn render(prompt: &str, row: &BTreeMap<String, String>) -> String
{   placeholder()
      .replace_all(prompt, |c: &Captures| {
        row.get(&column_for(&c[1])).cloned().unwrap_or_default()
      })
      .into_owned()
}

#[cfg(test)]
mod tests
{   use super::*;

    fn row(pairs: &[(&str, &str)]) -> BTreeMap<String, String>
    {   pairs.iter()
          .map(|(k, v)| (k.to_string(), v.to_string()))
          .collect()
    }

    #[test]
    fn test_extract_vars()
    {   let vars = extract_vars("客户发送的消息是：$input, 城市 $city_1 $input");
        assert_eq!(
          vars.into_iter().collect::<Vec<_>>(),
          vec!["city_1".to_string(), "input".to_string()]
        );
        assert!(extract_vars("no vars, $1 is not one").is_empty());
    }

    #[test]
    fn test_render_prefix_names()
    {   let r = row(&[("$in", "A"), ("$input", "B")]);
        assert_eq!(render("$input/$in", &r), "B/A");
    }

    #[test]
    fn test_missing_columns()
    {   let vars = extract_vars("$input $city");
        let columns = vec!["$input".to_string(), "期望答案".to_string()];
        assert_eq!(missing_columns(&vars, &columns), vec!["$city".to_string()]);
    }
}
