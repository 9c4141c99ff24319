//! Table batches: one task per (row, model), answers laid out per model column

use std::collections::{BTreeMap, BTreeSet};
use serde::Serialize;
use log::{debug, info};

use crate::arena::Arena;
use crate::comparator::CompareMode;
use crate::error::{Error, Result};
use crate::normalizer::{NormalizeMode, RepairTally};
use crate::request::{ResponseShape, Task};
use crate::stats::ModelSummary;
use crate::template;

/// Column holding the expected answer of a row
pub const EXPECTED_COLUMN: &str = "期望答案";

/// Prompt templates shared by every row
#[derive(Debug, Clone, Default)]
pub struct TablePrompt
{   pub sys_prompt: String
  , pub user_prompt: String
  , pub response_shape: ResponseShape
  , pub temperature: f32
}

/// A whole table run: rows × models
#[derive(Debug, Clone, Default)]
pub struct TableRun
{   /// Column name -> cell text
    pub rows: Vec<BTreeMap<String, String>>
  , pub models: Vec<String>
  , pub prompt: TablePrompt
  , pub normalize: NormalizeMode
  , pub compare: CompareMode
}

/// Answers of one model, one cell per row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelColumn
{   pub model_key: String
  , pub name: String
  , pub values: Vec<String>
  , /// 1 for a match, 0 otherwise; only with an expected column
    pub judgements: Option<Vec<u8>>
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableReport
{   pub columns: Vec<ModelColumn>
  , /// Per-row mean of the judgements, one decimal
    pub row_average: Option<Vec<f64>>
  , /// Correct count per column
    pub summary_row: Option<Vec<usize>>
  , pub summaries: Vec<ModelSummary>
  , pub repair: RepairTally
}

fn round1(v: f64) -> f64
{   (v * 10.0).round() / 10.0
}

impl TableRun
{   pub fn has_expected(&self) -> bool
    {   self.rows.iter().any(|r| r.contains_key(EXPECTED_COLUMN))
    }

    fn columns(&self) -> BTreeSet<&String>
    {   self.rows.iter().flat_map(|r| r.keys()).collect()
    }

    /// Tasks in row-major order, each paired with its row index
    pub fn plan(&self, arena: &Arena) -> Result<Vec<(Task, usize)>>
    {   if self.models.is_empty()
        {   return Err(Error::InvalidConfiguration(
              "select at least one model".to_string()
            ));
        }
        let mut vars = template::extract_vars(&self.prompt.sys_prompt);
        vars.extend(template::extract_vars(&self.prompt.user_prompt));
        if vars.is_empty()
        {   return Err(Error::InvalidConfiguration(
              "prompts contain no $placeholder".to_string()
            ));
        }
        let missing = template::missing_columns(&vars, self.columns());
        if !missing.is_empty()
        {   return Err(Error::MissingColumns(missing));
        }

        let mut planned = Vec::with_capacity(self.rows.len() * self.models.len());
        for (index, row) in self.rows.iter().enumerate()
        {   let sys = template::render(&self.prompt.sys_prompt, row);
            let user = template::render(&self.prompt.user_prompt, row);
            for model in &self.models
            {   let task = arena.build_task(
                  model
                , Some(sys.as_str())
                , Some(user.as_str())
                , self.prompt.response_shape
                , self.prompt.temperature
                )?;
                planned.push((task, index));
            }
        }
        debug!("Planned {} tasks over {} rows", planned.len(), self.rows.len());
        Ok(planned)
    }

    /// Run every row against every model and lay the answers out
    pub async fn run<F>(&self, arena: &Arena, on_progress: F) -> Result<TableReport>
    where F: FnMut(f64)
    {   let (tasks, row_of): (Vec<Task>, Vec<usize>) = self.plan(arena)?
          .into_iter()
          .unzip();
        info!(
          "Table run: {} rows × {} models",
          self.rows.len(),
          self.models.len()
        );

        let results = arena.submit(tasks, on_progress).await;
        let normalized = arena.post_process(&results, self.normalize).await;

        let mut columns: Vec<ModelColumn> = self.models.iter()
          .map(|key| ModelColumn
          {   model_key: key.clone()
            , name: arena.catalog()
                .model(key)
                .map(|m| m.fullname())
                .unwrap_or_else(|_| key.clone())
            , values: vec![String::new(); self.rows.len()]
            , judgements: None
          })
          .collect();
        let column_of = |key: &str| self.models.iter().position(|m| m == key);

        for ((result, answer), row) in results.iter().zip(&normalized).zip(&row_of)
        {   if let Some(c) = column_of(&result.model_key)
            {   columns[c].values[*row] = answer.value.to_text();
            }
        }

        let outcomes = if self.has_expected()
        {   let expected: Vec<Option<String>> = row_of.iter()
              .map(|row| Some(
                self.rows[*row].get(EXPECTED_COLUMN).cloned().unwrap_or_default()
              ))
              .collect();
            Some(arena.compare(&results, &normalized, &expected, self.compare)?)
        } else
        {   None
        };

        let (row_average, summary_row) = match &outcomes
        {   Some(outcomes) => {
              for column in columns.iter_mut()
              {   column.judgements = Some(vec![0; self.rows.len()]);
              }
              for (outcome, row) in outcomes.iter().zip(&row_of)
              {   if let Some(c) = column_of(&outcome.model_key)
                  {   if let Some(j) = columns[c].judgements.as_mut()
                      {   j[*row] = u8::from(outcome.matched);
                      }
                  }
              }
              let models = self.models.len() as f64;
              let averages = (0..self.rows.len())
                .map(|row| {
                  let hits: u32 = columns.iter()
                    .filter_map(|c| c.judgements.as_ref())
                    .map(|j| u32::from(j[row]))
                    .sum();
                  round1(f64::from(hits) / models)
                })
                .collect();
              let correct = columns.iter()
                .map(|c| c.judgements.as_ref()
                  .map_or(0, |j| j.iter().filter(|v| **v == 1).count()))
                .collect();
              (Some(averages), Some(correct))
            }
          , None => (None, None)
        };

        Ok(TableReport
        {   columns
          , row_average
          , summary_row
          , summaries: arena.aggregate(&results, outcomes.as_deref())
          , repair: RepairTally::from_results(&normalized)
        })
    }
}
