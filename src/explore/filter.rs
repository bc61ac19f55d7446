//! Filter cascade rules.
//!
//! Four user-visible fields (agency, title, part, section) that constrain
//! each other: the agency field and the location chain are mutually
//! exclusive, and each location field is only editable once every coarser
//! field in its chain is set. Instead of fields clearing each other by side
//! effect, the rules live in one pure reducer: [`apply_change`].

use super::types::CfrFilter;

/// One user edit to the filter.
///
/// `None` clears the named field; clearing a coarse field drops everything
/// finer in its chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterChange {
    Agency(Option<String>),
    Title(Option<u32>),
    Part(Option<u32>),
    Section(Option<u32>),
    /// Reset all four fields.
    Clear,
}

/// A filter field, for editability probes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FilterField {
    Agency,
    Title,
    Part,
    Section,
}

/// Whether a field currently accepts a value.
///
/// Agency and title are always editable; part needs title, section needs
/// title and part. An agency filter disables the finer location fields until
/// a title is chosen (which clears the agency).
pub fn can_set(filter: &CfrFilter, field: FilterField) -> bool {
    let (title, part, _) = filter.location();
    match field {
        FilterField::Agency | FilterField::Title => true,
        FilterField::Part => title.is_some(),
        FilterField::Section => title.is_some() && part.is_some(),
    }
}

/// Apply one edit, returning the new filter.
///
/// Cascade rules:
/// - setting the agency clears the whole location chain;
/// - setting any location field clears the agency;
/// - setting a location field clears everything finer than it;
/// - setting a disabled field (see [`can_set`]) is a no-op.
pub fn apply_change(current: &CfrFilter, change: FilterChange) -> CfrFilter {
    match change {
        FilterChange::Clear => CfrFilter::default(),
        FilterChange::Agency(None) => match current {
            CfrFilter::Agency(_) => CfrFilter::default(),
            loc @ CfrFilter::Location { .. } => loc.clone(),
        },
        FilterChange::Agency(Some(name)) => CfrFilter::Agency(name),
        FilterChange::Title(title) => CfrFilter::Location {
            title,
            part: None,
            section: None,
        },
        FilterChange::Part(part) => {
            if !can_set(current, FilterField::Part) {
                return current.clone();
            }
            let (title, _, _) = current.location();
            CfrFilter::Location {
                title,
                part,
                section: None,
            }
        }
        FilterChange::Section(section) => {
            if !can_set(current, FilterField::Section) {
                return current.clone();
            }
            let (title, part, _) = current.location();
            CfrFilter::Location {
                title,
                part,
                section,
            }
        }
    }
}
