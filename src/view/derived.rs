use chrono::{NaiveDate, NaiveDateTime};
use std::cmp::{Ordering, Reverse};
use std::collections::HashMap;

use crate::core::persona::{persona_for_category, PersonaInfo, PERSONAS, UNKNOWN_PERSONA};
use crate::core::session::Session;

#[derive(Debug, Clone, PartialEq)]
pub struct RankedCategory {
    pub category: String,
    pub probability: f64,
    pub persona: &'static PersonaInfo,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProbabilitySplit {
    pub primary: Option<RankedCategory>,
    pub others: Vec<RankedCategory>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayGroup<T> {
    pub day: NaiveDate,
    pub records: Vec<T>,
}

/// Rescale fractional probabilities (all values within 0..=1) to percentages.
pub fn normalize_percentages(probabilities: &HashMap<String, f64>) -> HashMap<String, f64> {
    let fractional = !probabilities.is_empty() && probabilities.values().all(|v| *v <= 1.0);
    probabilities
        .iter()
        .map(|(k, v)| (k.clone(), if fractional { v * 100.0 } else { *v }))
        .collect()
}

/// Categories ordered by descending probability, ties by name.
pub fn rank_probabilities(probabilities: &HashMap<String, f64>) -> Vec<RankedCategory> {
    let mut ranked: Vec<RankedCategory> = probabilities
        .iter()
        .filter(|(_, v)| v.is_finite())
        .map(|(category, probability)| RankedCategory {
            category: category.clone(),
            probability: *probability,
            persona: persona_for_category(category),
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.probability
            .partial_cmp(&a.probability)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.category.cmp(&b.category))
    });
    ranked
}

pub fn split_primary(probabilities: &HashMap<String, f64>) -> ProbabilitySplit {
    let mut ranked = rank_probabilities(probabilities).into_iter();
    ProbabilitySplit {
        primary: ranked.next(),
        others: ranked.collect(),
    }
}

/// Percentage of the primary category.
pub fn main_probability(probabilities: &HashMap<String, f64>) -> Option<f64> {
    split_primary(&normalize_percentages(probabilities))
        .primary
        .map(|p| p.probability)
}

pub fn resolve_persona(category: Option<&str>) -> &'static PersonaInfo {
    category.map_or(&UNKNOWN_PERSONA, persona_for_category)
}

/// Catalog personas the owner has no active session with, in catalog order.
pub fn available_personas(sessions: &[Session]) -> Vec<&'static PersonaInfo> {
    PERSONAS
        .iter()
        .filter(|p| !sessions.iter().any(|s| s.is_active && s.persona_id == p.id))
        .collect()
}

/// Section records by calendar day, newest day first.
///
/// Records inside a day are newest first; equal timestamps keep input order.
/// Records without a usable timestamp are left out.
pub fn group_by_day<T, F>(records: impl IntoIterator<Item = T>, timestamp: F) -> Vec<DayGroup<T>>
where
    F: Fn(&T) -> Option<NaiveDateTime>,
{
    let mut dated: Vec<(NaiveDateTime, T)> = records
        .into_iter()
        .filter_map(|r| timestamp(&r).map(|ts| (ts, r)))
        .collect();
    dated.sort_by_key(|(ts, _)| Reverse(*ts));

    let mut groups: Vec<DayGroup<T>> = Vec::new();
    for (ts, record) in dated {
        match groups.last_mut() {
            Some(group) if group.day == ts.date() => group.records.push(record),
            _ => groups.push(DayGroup {
                day: ts.date(),
                records: vec![record],
            }),
        }
    }
    groups
}
