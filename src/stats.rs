//! Per-model summary statistics

use serde::{Deserialize, Serialize};

use crate::request::RequestResult;

/// Verdict of one comparison, keyed by model and task position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonOutcome
{   pub model_key: String
  , pub sequence: usize
  , pub matched: bool
}

/// Aggregate metrics of one model; `None` means no data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary
{   pub model_key: String
  , pub name: String
  , pub min_ms: Option<u64>
  , pub max_ms: Option<u64>
  , pub mean_ms: Option<f64>
  , pub mean_input_tokens: Option<f64>
  , pub mean_output_tokens: Option<f64>
  , pub total: usize
  , pub completed: usize
  , /// completed / total
    pub completion_rate: f64
  , pub correct: Option<usize>
  , /// correct / compared rows
    pub accuracy: Option<f64>
}

fn mean<I: Iterator<Item = u64>>(values: I) -> Option<f64>
{   let (sum, count) = values.fold((0u64, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0
    {   None
    } else
    {   Some(sum as f64 / count as f64)
    }
}

fn percent(rate: f64) -> String
{   format!("{:.1}%", rate * 100.0)
}

fn or_dash<T, F: Fn(T) -> String>(value: Option<T>, f: F) -> String
{   value.map(f).unwrap_or_else(|| "-".to_string())
}

impl ModelSummary
{   /// Summarize one model's results and, if given, its outcomes
    pub fn from_results(
      model_key: &str
    , results: &[&RequestResult]
    , outcomes: Option<&[&ComparisonOutcome]>
    ) -> Self
    {   let completed: Vec<&RequestResult> = results.iter()
          .copied()
          .filter(|r| r.is_completed())
          .collect();
        let latencies = || completed.iter().filter_map(|r| r.elapsed_ms);
        let total = results.len();

        let (correct, accuracy) = match outcomes
        {   Some(outcomes) => {
              let correct = outcomes.iter().filter(|o| o.matched).count();
              let accuracy = if outcomes.is_empty()
              {   None
              } else
              {   Some(correct as f64 / outcomes.len() as f64)
              };
              (Some(correct), accuracy)
            }
          , None => (None, None)
        };

        ModelSummary
        {   model_key: model_key.to_string()
          , name: model_key.to_string()
          , min_ms: latencies().min()
          , max_ms: latencies().max()
          , mean_ms: mean(latencies())
          , mean_input_tokens: mean(completed.iter().filter_map(|r| r.input_tokens))
          , mean_output_tokens: mean(completed.iter().filter_map(|r| r.output_tokens))
          , total
          , completed: completed.len()
          , completion_rate: if total == 0
            {   0.0
            } else
            {   completed.len() as f64 / total as f64
            }
          , correct
          , accuracy
        }
    }

    pub fn with_name(mut self, name: &str) -> Self
    {   self.name = name.to_string();
        self
    }

    /// Table row: name, min, max, mean, in, out, done, done %, correct, correct %
    pub fn row(&self) -> Vec<String>
    {   vec![
          self.name.clone()
        , or_dash(self.min_ms, |v| format!("{}ms", v))
        , or_dash(self.max_ms, |v| format!("{}ms", v))
        , or_dash(self.mean_ms, |v| format!("{:.0}ms", v))
        , or_dash(self.mean_input_tokens, |v| format!("{:.0}", v))
        , or_dash(self.mean_output_tokens, |v| format!("{:.0}", v))
        , self.completed.to_string()
        , percent(self.completion_rate)
        , or_dash(self.correct, |v| v.to_string())
        , or_dash(self.accuracy, percent)
        ]
    }
}

/// Column headers matching [`ModelSummary::row`]
pub const SUMMARY_HEADERS: [&str; 10] = [
  "模型", "最小响应时间", "最大响应时间", "平均响应时间", "平均输入Token"
, "平均输出Token", "完成数", "完成率", "正确数", "正确率"
];

/// One summary per model, in order of first appearance
pub fn aggregate(
  results: &[RequestResult]
, outcomes: Option<&[ComparisonOutcome]>
) -> Vec<ModelSummary>
{   let mut keys: Vec<&str> = Vec::new();
    for r in results
    {   if !keys.contains(&r.model_key.as_str())
        {   keys.push(&r.model_key);
        }
    }
    keys.into_iter()
      .map(|key| {
        let own: Vec<&RequestResult> = results.iter()
          .filter(|r| r.model_key == key)
          .collect();
        let own_outcomes: Option<Vec<&ComparisonOutcome>> = outcomes.map(|all| {
          all.iter().filter(|o| o.model_key == key).collect()
        });
        ModelSummary::from_results(key, &own, own_outcomes.as_deref())
      })
      .collect()
}
