//! Combines token, template, and severity signals into a bounded novelty
//! score, per §4.4. Pure with respect to model state: scoring never
//! mutates `InfoModel`.

use crate::model::InfoModel;
use crate::types::{Level, TokenContribution};

/// Per-line weights applied to the three signal components (§3 `Config`).
#[derive(Debug, Clone, Copy)]
pub struct Weights {
    pub w_token: f64,
    pub w_template: f64,
    pub w_level: f64,
}

/// The numeric output of scoring a line, before the caller wraps it in a
/// `ScorePayload` with the token/template text.
#[derive(Debug, Clone)]
pub struct ScoreComponents {
    pub novelty: f64,
    pub raw_score: f64,
    pub token_info_bits: f64,
    pub template_info_bits: f64,
    pub level_bonus: f64,
    pub template_probability: f64,
    pub token_contributors: Vec<TokenContribution>,
}

/// Scores `tokens`/`template`/`level` against the model's current
/// frequency tables. Does not mutate `model`.
pub fn score(
    model: &InfoModel,
    tokens: &[String],
    template: &str,
    level: Level,
    weights: Weights,
) -> ScoreComponents {
    let mut contributors: Vec<TokenContribution> = tokens
        .iter()
        .map(|t| TokenContribution {
            token: t.clone(),
            bits: model.token_bits(t),
            probability: model.token_probability(t),
            effective_count: model.token_effective_count(t),
        })
        .collect();
    contributors.sort_by(|a, b| b.bits.total_cmp(&a.bits));

    let token_info_bits = if tokens.is_empty() {
        0.0
    } else {
        contributors.iter().map(|c| c.bits).sum::<f64>() / tokens.len() as f64
    };

    let template_info_bits = model.template_bits(template);
    let template_probability = model.template_probability(template);
    let level_bonus = level.bonus();

    let raw_score = weights.w_token * token_info_bits
        + weights.w_template * template_info_bits
        + weights.w_level * level_bonus;

    let effective_len = (tokens.len() as f64).max(1.0);
    let novelty = 1.0 - (-raw_score.max(0.0) / effective_len).exp();

    ScoreComponents {
        novelty,
        raw_score,
        token_info_bits,
        template_info_bits,
        level_bonus,
        template_probability,
        token_contributors: contributors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn weights() -> Weights {
        Weights {
            w_token: 1.0,
            w_template: 1.0,
            w_level: 1.0,
        }
    }

    #[test]
    fn novelty_is_bounded() {
        let cfg = Config::default();
        let mut model = InfoModel::new(&cfg);
        for _ in 0..50 {
            model.observe("common template", &["common".into(), "words".into()]);
        }
        let result = score(
            &model,
            &["never".into(), "seen".into(), "tokens".into()],
            "a brand new template",
            Level::Fatal,
            weights(),
        );
        assert!(result.novelty >= 0.0 && result.novelty < 1.0);
    }

    #[test]
    fn rare_line_scores_higher_than_common_line() {
        let cfg = Config::default();
        let mut model = InfoModel::new(&cfg);
        for _ in 0..10_000 {
            model.observe("ok template", &["info".into(), "ok".into(), "ping".into()]);
        }
        let common = score(
            &model,
            &["info".into(), "ok".into(), "ping".into()],
            "ok template",
            Level::Info,
            weights(),
        );
        let rare = score(
            &model,
            &["error".into(), "declined".into()],
            "a very unfamiliar template string",
            Level::Error,
            weights(),
        );
        assert!(rare.novelty > common.novelty);
        assert!(rare.novelty > 0.9);
    }

    #[test]
    fn empty_token_list_yields_zero_token_bits() {
        let cfg = Config::default();
        let model = InfoModel::new(&cfg);
        let result = score(&model, &[], "t", Level::Unknown, weights());
        assert_eq!(result.token_info_bits, 0.0);
    }

    #[test]
    fn scoring_does_not_mutate_model() {
        let cfg = Config::default();
        let mut model = InfoModel::new(&cfg);
        model.observe("t", &["a".into()]);
        let vocab_before = model.token_vocab_size();
        let _ = score(&model, &["a".into(), "b".into()], "t2", Level::Warn, weights());
        assert_eq!(vocab_before, model.token_vocab_size());
    }

    #[test]
    fn contributors_sorted_by_bits_descending() {
        let cfg = Config::default();
        let mut model = InfoModel::new(&cfg);
        for _ in 0..100 {
            model.observe("t", &["common".into()]);
        }
        let result = score(
            &model,
            &["common".into(), "rare".into()],
            "t",
            Level::Info,
            weights(),
        );
        assert!(result.token_contributors[0].bits >= result.token_contributors[1].bits);
        assert_eq!(result.token_contributors[0].token, "rare");
    }
}
