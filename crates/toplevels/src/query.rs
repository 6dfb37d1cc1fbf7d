/*!
Fuzzy window search.

Each window is scored on its title and then its app id with a skim-style
matcher. The better field wins, with ties going to the title. Later fields
and later match starts are penalised:

```text
adjusted = max(raw - min(field_index * 5, 50) - start, 10)
```

Only matches scoring above the configured minimum are kept, best first.
*/

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::Serialize;
use ts_rs::TS;

use crate::types::Window;

/// Matches must score strictly above this unless configured otherwise.
pub(crate) const DEFAULT_MIN_SCORE: i32 = 20;

const FIELD_PENALTY_STEP: i32 = 5;
const MAX_FIELD_PENALTY: i32 = 50;
const SCORE_FLOOR: i32 = 10;

/// Which window field produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum MatchField {
  Title,
  AppId,
}

/// One search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct QueryMatch {
  pub window: Window,
  /// Adjusted score. 0 for an empty query.
  pub score: i32,
  /// `None` for an empty query.
  pub field: Option<MatchField>,
  /// Matched character positions in `field`.
  pub positions: Vec<u32>,
  /// First matched position.
  pub start: u32,
}

impl QueryMatch {
  const fn unscored(window: Window) -> Self {
    Self {
      window,
      score: 0,
      field: None,
      positions: Vec::new(),
      start: 0,
    }
  }
}

/// Rank `windows` against `query`.
///
/// An empty query returns every window in the given order. In `exact` mode a
/// field only matches when the matched characters are contiguous.
pub(crate) fn rank(windows: Vec<Window>, query: &str, exact: bool, min_score: i32) -> Vec<QueryMatch> {
  if query.is_empty() {
    return windows.into_iter().map(QueryMatch::unscored).collect();
  }

  let matcher = SkimMatcherV2::default().ignore_case();
  let mut matches: Vec<QueryMatch> = windows
    .into_iter()
    .filter_map(|window| score_window(&matcher, window, query, exact))
    .filter(|m| m.score > min_score)
    .collect();

  // Stable: equal scores keep registry order.
  matches.sort_by(|a, b| b.score.cmp(&a.score));
  matches
}

fn score_window(
  matcher: &SkimMatcherV2,
  window: Window,
  query: &str,
  exact: bool,
) -> Option<QueryMatch> {
  let fields = [
    (MatchField::Title, window.title.as_deref()),
    (MatchField::AppId, window.app_id.as_deref()),
  ];

  let mut best: Option<(i32, MatchField, i64, Vec<usize>)> = None;
  let mut penalty = 0;
  for (field, text) in fields {
    let hit = text.and_then(|text| match_field(matcher, text, query, exact));
    if let Some((raw, positions)) = hit {
      // Strictly greater: the earlier field wins ties.
      let better = match &best {
        Some((_, _, best_raw, _)) => raw > *best_raw,
        None => true,
      };
      if better {
        best = Some((penalty, field, raw, positions));
      }
    }
    penalty = (penalty + FIELD_PENALTY_STEP).min(MAX_FIELD_PENALTY);
  }

  let (penalty, field, raw, positions) = best?;
  let start = positions.first().copied().unwrap_or(0);
  let start = u32::try_from(start).unwrap_or(u32::MAX);
  let raw = i32::try_from(raw).unwrap_or(i32::MAX);
  let score = raw
    .saturating_sub(penalty)
    .saturating_sub(i32::try_from(start).unwrap_or(i32::MAX))
    .max(SCORE_FLOOR);

  Some(QueryMatch {
    window,
    score,
    field: Some(field),
    positions: positions
      .into_iter()
      .map(|p| u32::try_from(p).unwrap_or(u32::MAX))
      .collect(),
    start,
  })
}

fn match_field(
  matcher: &SkimMatcherV2,
  text: &str,
  query: &str,
  exact: bool,
) -> Option<(i64, Vec<usize>)> {
  let (raw, positions) = matcher.fuzzy_indices(text, query)?;
  if raw <= 0 || (exact && !is_contiguous(&positions)) {
    return None;
  }
  Some((raw, positions))
}

fn is_contiguous(positions: &[usize]) -> bool {
  positions
    .iter()
    .zip(positions.iter().skip(1))
    .all(|(a, b)| *b == a + 1)
}
