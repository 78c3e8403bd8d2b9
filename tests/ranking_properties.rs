// tests/ranking_properties.rs
use ai_news_radar::analyze::{
    score, score_and_select, RecencyTier, RecencyTiers, ScoringConfig, TopN,
};
use ai_news_radar::{NormalizedRecord, SourceKind};
use chrono::{DateTime, Duration, TimeZone, Utc};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 6, 12, 0, 0).unwrap()
}

fn rec(
    id: &str,
    source: &str,
    kind: SourceKind,
    weight: i64,
    age_min: Option<i64>,
) -> NormalizedRecord {
    NormalizedRecord {
        id: id.into(),
        title: id.into(),
        summary: String::new(),
        link: format!("https://x.test/{id}"),
        source_name: source.into(),
        kind,
        published_at: age_min.map(|m| now() - Duration::minutes(m)),
        collected_at: now(),
        source_weight: weight,
        score: 0,
        popularity: None,
    }
}

fn tier_sets() -> Vec<RecencyTiers> {
    vec![
        RecencyTiers::default(),
        RecencyTiers::new(vec![]),
        RecencyTiers::new(vec![
            RecencyTier { max_hours: 24.0, bonus: 5 },
            RecencyTier { max_hours: 0.5, bonus: 40 },
            RecencyTier { max_hours: 6.0, bonus: 15 },
        ]),
    ]
}

#[test]
fn newer_never_scores_lower() {
    let ages = [0, 10, 59, 60, 61, 179, 180, 181, 600, 1440, 1441, 10_000];
    for recency in tier_sets() {
        let cfg = ScoringConfig {
            recency,
            ..ScoringConfig::default()
        };
        for pair in ages.windows(2) {
            let newer = rec("n", "OpenAI Blog", SourceKind::Blog, 50, Some(pair[0]));
            let older = rec("o", "OpenAI Blog", SourceKind::Blog, 50, Some(pair[1]));
            assert!(
                score(&newer, now(), &cfg) >= score(&older, now(), &cfg),
                "ages {pair:?}"
            );
        }
    }
}

#[test]
fn unknown_publish_time_gets_no_recency_bonus() {
    let cfg = ScoringConfig::default();
    let unknown = rec("u", "OpenAI Blog", SourceKind::Blog, 50, None);
    let fresh = rec("f", "OpenAI Blog", SourceKind::Blog, 50, Some(5));
    assert_eq!(score(&unknown, now(), &cfg), 50);
    assert_eq!(score(&fresh, now(), &cfg), 70);
}

#[test]
fn forum_popularity_adds_capped_bonus() {
    let cfg = ScoringConfig::default();
    let mut hot = rec("h", "Hacker News", SourceKind::Forum, 30, None);
    hot.popularity = Some(450);
    assert_eq!(score(&hot, now(), &cfg), 34);
    hot.popularity = Some(50_000);
    assert_eq!(score(&hot, now(), &cfg), 40);
}

#[test]
fn selection_is_deterministic_and_bounded() {
    let candidates: Vec<_> = (0..12)
        .map(|i| {
            rec(
                &format!("r{i}"),
                "OpenAI Blog",
                SourceKind::Blog,
                40 + (i % 3) * 10,
                Some(i * 30),
            )
        })
        .collect();

    for n in [1usize, 3, 5, 12, 40] {
        let scoring = ScoringConfig::default();
        let a = score_and_select(candidates.clone(), now(), &scoring, TopN::new(n));
        let b = score_and_select(candidates.clone(), now(), &scoring, TopN::new(n));
        assert_eq!(a, b);
        assert_eq!(a.len(), n.min(candidates.len()));
        assert!(a.windows(2).all(|w| w[0].score >= w[1].score));
    }
}
