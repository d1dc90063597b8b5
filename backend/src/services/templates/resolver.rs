//! Loose template identification.
//!
//! Clients refer to templates by full id, an id prefix, the creation time as
//! epoch seconds or milliseconds, part of the stored content path, or the
//! display name. Each of those is a pure strategy over the candidate list,
//! tried in [`STRATEGIES`] order; the first hit wins.

use common::model::template::TemplateRecord;
use std::fmt;

use crate::storage::records::TemplateRepo;
use crate::storage::StorageResult;

/// Epoch values above this are taken as milliseconds.
const MILLIS_THRESHOLD: f64 = 1e11;
/// Tolerances, in seconds, tried from tightest to loosest.
const TIMESTAMP_WINDOWS: [f64; 4] = [5.0, 10.0, 30.0, 60.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    ExactId,
    IdPrefix,
    Timestamp,
    ContentRef,
    Name,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::ExactId => "exact id",
            Strategy::IdPrefix => "id prefix",
            Strategy::Timestamp => "timestamp",
            Strategy::ContentRef => "content reference",
            Strategy::Name => "name",
        };
        f.write_str(name)
    }
}

type StrategyFn = for<'a> fn(&str, &'a [TemplateRecord]) -> Option<&'a TemplateRecord>;

pub const STRATEGIES: [(Strategy, StrategyFn); 5] = [
    (Strategy::ExactId, by_exact_id),
    (Strategy::IdPrefix, by_id_prefix),
    (Strategy::Timestamp, by_timestamp),
    (Strategy::ContentRef, by_content_ref),
    (Strategy::Name, by_name),
];

pub fn by_exact_id<'a>(id: &str, candidates: &'a [TemplateRecord]) -> Option<&'a TemplateRecord> {
    candidates.iter().find(|t| t.id == id)
}

pub fn by_id_prefix<'a>(id: &str, candidates: &'a [TemplateRecord]) -> Option<&'a TemplateRecord> {
    candidates.iter().find(|t| t.id.starts_with(id))
}

pub fn by_timestamp<'a>(id: &str, candidates: &'a [TemplateRecord]) -> Option<&'a TemplateRecord> {
    if !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let raw: f64 = id.parse().ok()?;
    let ts = if raw > MILLIS_THRESHOLD { raw / 1000.0 } else { raw };

    TIMESTAMP_WINDOWS.iter().find_map(|window| {
        candidates.iter().find(|t| {
            let created = common::model::timestamp::to_epoch_seconds(&t.created_at);
            (created - ts).abs() < *window
        })
    })
}

pub fn by_content_ref<'a>(id: &str, candidates: &'a [TemplateRecord]) -> Option<&'a TemplateRecord> {
    candidates.iter().find(|t| t.content_ref.contains(id))
}

pub fn by_name<'a>(id: &str, candidates: &'a [TemplateRecord]) -> Option<&'a TemplateRecord> {
    candidates.iter().find(|t| t.name == id)
}

/// Runs the strategies in order over `candidates`. An empty identifier never
/// matches.
pub fn resolve_in<'a>(
    identifier: &str,
    candidates: &'a [TemplateRecord],
) -> Option<(Strategy, &'a TemplateRecord)> {
    if identifier.is_empty() {
        return None;
    }
    STRATEGIES
        .iter()
        .find_map(|(strategy, f)| f(identifier, candidates).map(|t| (*strategy, t)))
}

/// Resolves against the store: a direct key lookup first, then the full
/// strategy chain over every stored template.
pub async fn resolve(repo: &TemplateRepo, identifier: &str) -> StorageResult<Option<(Strategy, TemplateRecord)>> {
    if identifier.is_empty() {
        log::debug!("empty template identifier");
        return Ok(None);
    }
    if let Some(record) = repo.get(identifier).await? {
        log::info!("template {} resolved by {}", identifier, Strategy::ExactId);
        return Ok(Some((Strategy::ExactId, record)));
    }

    let candidates = repo.all().await?;
    match resolve_in(identifier, &candidates) {
        Some((strategy, record)) => {
            log::info!("template {} resolved by {} to {}", identifier, strategy, record.id);
            Ok(Some((strategy, record.clone())))
        }
        None => {
            log::debug!(
                "template {} not matched by any strategy ({} candidates)",
                identifier,
                candidates.len()
            );
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sqlite_kv::SqliteMetadataStore;
    use chrono::{DateTime, Utc};
    use common::model::template::TemplateType;
    use std::sync::Arc;

    const T: i64 = 1_764_402_970;

    fn record(id: &str, name: &str, content_ref: &str, created: i64) -> TemplateRecord {
        TemplateRecord {
            id: id.to_string(),
            name: name.to_string(),
            template_type: TemplateType::Html,
            content_ref: content_ref.to_string(),
            variables: vec![],
            has_images: false,
            image_count: 0,
            created_at: DateTime::<Utc>::from_timestamp(created, 0).unwrap(),
            updated_at: None,
        }
    }

    fn candidates() -> Vec<TemplateRecord> {
        vec![
            record("0b6f1c3e-aaaa", "Diploma", "./data/templates/0b6f1c3e-aaaa/template.html", T),
            record("7d21e9aa-bbbb", "Thanks", "./data/templates/7d21e9aa-bbbb/template.html", T + 100),
        ]
    }

    #[test]
    fn each_strategy_in_isolation() {
        let c = candidates();
        assert_eq!(by_exact_id("7d21e9aa-bbbb", &c).unwrap().name, "Thanks");
        assert!(by_exact_id("7d21e9aa", &c).is_none());
        assert_eq!(by_id_prefix("7d21", &c).unwrap().name, "Thanks");
        assert_eq!(by_timestamp(&(T + 3).to_string(), &c).unwrap().name, "Diploma");
        assert!(by_timestamp("12ab", &c).is_none());
        assert_eq!(by_content_ref("0b6f1c3e-aaaa/template", &c).unwrap().name, "Diploma");
        assert_eq!(by_name("Thanks", &c).unwrap().id, "7d21e9aa-bbbb");
        assert!(by_name("thanks", &c).is_none());
    }

    #[test]
    fn timestamp_accepts_millis_and_widens_windows() {
        let c = candidates();
        let millis = (T * 1000).to_string();
        let (strategy, found) = resolve_in(&millis, &c).unwrap();
        assert_eq!((strategy, found.name.as_str()), (Strategy::Timestamp, "Diploma"));
        // 40 s past the second template: only the 60 s window reaches it.
        assert_eq!(by_timestamp(&(T + 140).to_string(), &c).unwrap().name, "Thanks");
        assert!(by_timestamp(&(T + 500).to_string(), &c).is_none());
    }

    #[test]
    fn exact_id_wins_before_fallbacks() {
        // "Thanks" is also the name of a different record.
        let mut c = candidates();
        c.push(record("Thanks", "Other", "x", T + 1000));
        let (strategy, found) = resolve_in("Thanks", &c).unwrap();
        assert_eq!(strategy, Strategy::ExactId);
        assert_eq!(found.name, "Other");
    }

    #[test]
    fn ambiguous_matches_return_one_of_the_candidates() {
        // Which of two equally good candidates wins is not guaranteed; only
        // membership is asserted.
        let c = vec![
            record("abc12345-1111", "First", "a", T),
            record("abc12345-2222", "Second", "b", T + 2),
        ];
        let (strategy, found) = resolve_in("abc12345", &c).unwrap();
        assert_eq!(strategy, Strategy::IdPrefix);
        assert!(["abc12345-1111", "abc12345-2222"].contains(&found.id.as_str()));

        let (strategy, found) = resolve_in(&(T + 1).to_string(), &c).unwrap();
        assert_eq!(strategy, Strategy::Timestamp);
        assert!(["First", "Second"].contains(&found.name.as_str()));
    }

    #[test]
    fn empty_identifier_never_matches() {
        assert!(resolve_in("", &candidates()).is_none());
    }

    #[tokio::test]
    async fn resolves_through_the_store() {
        let repo = TemplateRepo::new(Arc::new(SqliteMetadataStore::open(":memory:").unwrap()));
        for t in candidates() {
            repo.save(&t).await.unwrap();
        }
        let (s, t) = resolve(&repo, "0b6f1c3e-aaaa").await.unwrap().unwrap();
        assert_eq!((s, t.name.as_str()), (Strategy::ExactId, "Diploma"));
        let (s, t) = resolve(&repo, "Thanks").await.unwrap().unwrap();
        assert_eq!((s, t.id.as_str()), (Strategy::Name, "7d21e9aa-bbbb"));
        assert!(resolve(&repo, "missing").await.unwrap().is_none());
        assert!(resolve(&repo, "").await.unwrap().is_none());
    }
}
