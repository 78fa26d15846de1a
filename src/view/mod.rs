//! Pure projections of store data for display.

mod derived;


pub use derived::{
    available_personas, group_by_day, main_probability, normalize_percentages, rank_probabilities,
    resolve_persona, split_primary, DayGroup, ProbabilitySplit, RankedCategory,
};
