//! Listing queries: filtering and pagination over stored episodes.

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::{AttentionError, AttentionResult};
use std::str::FromStr;
use ulr_workflow::ClinicalAttention;

/// Filter over a nullable boolean field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NullableFilter {
    #[default]
    Any,
    /// Field is `null`.
    Pending,
    Is(bool),
}

impl NullableFilter {
    pub fn matches(self, value: Option<bool>) -> bool {
        match self {
            Self::Any => true,
            Self::Pending => value.is_none(),
            Self::Is(expected) => value == Some(expected),
        }
    }
}

impl FromStr for NullableFilter {
    type Err = AttentionError;

    /// Accepts `true`, `false`, `null` or `pending`; an empty string means no filter.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" => Ok(Self::Any),
            "true" => Ok(Self::Is(true)),
            "false" => Ok(Self::Is(false)),
            "null" | "pending" => Ok(Self::Pending),
            other => Err(AttentionError::InvalidInput(format!(
                "expected true, false or null, got '{other}'"
            ))),
        }
    }
}

/// Listing parameters. `None` fields fall back to defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttentionQuery {
    /// 1-based page number.
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    /// Case-insensitive substring of the patient name or identifier.
    pub patient_search: Option<String>,
    /// Case-insensitive substring of the doctor name.
    pub doctor_search: Option<String>,
    pub medic_approved: NullableFilter,
    pub supervisor_approved: NullableFilter,
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl AttentionQuery {
    /// Resolved page number.
    ///
    /// # Errors
    ///
    /// Returns [`AttentionError::InvalidInput`] for page `0`.
    pub fn page(&self) -> AttentionResult<usize> {
        match self.page {
            None => Ok(1),
            Some(0) => Err(AttentionError::InvalidInput("page starts at 1".into())),
            Some(p) => Ok(p),
        }
    }

    /// Resolved page size, capped at [`MAX_PAGE_SIZE`].
    ///
    /// # Errors
    ///
    /// Returns [`AttentionError::InvalidInput`] for page size `0`.
    pub fn page_size(&self) -> AttentionResult<usize> {
        match self.page_size {
            None => Ok(DEFAULT_PAGE_SIZE),
            Some(0) => Err(AttentionError::InvalidInput(
                "page_size must be at least 1".into(),
            )),
            Some(n) => Ok(n.min(MAX_PAGE_SIZE)),
        }
    }

    pub fn matches(&self, a: &ClinicalAttention) -> bool {
        if let Some(needle) = non_blank(&self.patient_search) {
            if !contains_ci(a.patient.name.as_str(), needle)
                && !contains_ci(a.patient.identifier.as_str(), needle)
            {
                return false;
            }
        }
        if let Some(needle) = non_blank(&self.doctor_search) {
            if !contains_ci(a.doctor_name.as_str(), needle) {
                return false;
            }
        }
        self.medic_approved.matches(a.medic_approved())
            && self.supervisor_approved.matches(a.supervisor_approved())
    }

    /// Filters, sorts newest first and cuts out the requested page.
    pub fn apply(&self, attentions: Vec<ClinicalAttention>) -> AttentionResult<AttentionPage> {
        let page = self.page()?;
        let page_size = self.page_size()?;

        let mut matching: Vec<ClinicalAttention> =
            attentions.into_iter().filter(|a| self.matches(a)).collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let total = matching.len();
        let results: Vec<ClinicalAttention> = matching
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect();

        Ok(AttentionPage {
            count: results.len(),
            results,
            total,
            page,
            page_size,
        })
    }
}

/// One page of a listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttentionPage {
    pub results: Vec<ClinicalAttention>,
    /// Episodes matching the filters across all pages.
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    /// Episodes on this page.
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use ulr_workflow::{apply, Actor, ActorId, Command, NewAttention, Role};
    use uuid::Uuid;

    fn episode(patient: &str, identifier: &str, doctor: &str, minutes_ago: i64) -> ClinicalAttention {
        ClinicalAttention::open(
            Uuid::new_v4(),
            NewAttention {
                patient_name: patient.into(),
                patient_identifier: identifier.into(),
                doctor_name: doctor.into(),
                diagnostic: None,
                ai_result: Some(true),
            },
            ActorId::new("res-1").unwrap(),
            Utc::now() - Duration::minutes(minutes_ago),
        )
        .unwrap()
    }

    fn approved(a: ClinicalAttention) -> ClinicalAttention {
        let resident = Actor::new(ActorId::new("res-1").unwrap(), Role::Resident);
        apply(
            &a,
            &resident,
            Command::ResidentApproval {
                approved: true,
                reason: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn sample() -> Vec<ClinicalAttention> {
        vec![
            episode("Ana Rojas", "11.111.111-1", "Dr. Soto", 30),
            approved(episode("Luis Pérez", "22.222.222-2", "Dra. Muñoz", 20)),
            episode("Ana María Díaz", "33.333.333-3", "Dr. Soto", 10),
        ]
    }

    #[test]
    fn defaults_to_first_page_of_ten_newest_first() {
        let page = AttentionQuery::default().apply(sample()).unwrap();
        assert_eq!((page.page, page.page_size, page.total, page.count), (1, 10, 3, 3));
        assert_eq!(page.results[0].patient.name.as_str(), "Ana María Díaz");
        assert_eq!(page.results[2].patient.name.as_str(), "Ana Rojas");
    }

    #[test]
    fn total_counts_matches_and_count_counts_page_items() {
        let query = AttentionQuery {
            page: Some(2),
            page_size: Some(2),
            ..Default::default()
        };
        let page = query.apply(sample()).unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.count, 1);
    }

    #[test]
    fn patient_search_matches_name_or_identifier_case_insensitively() {
        let by_name = AttentionQuery {
            patient_search: Some("ana".into()),
            ..Default::default()
        };
        assert_eq!(by_name.apply(sample()).unwrap().total, 2);

        let by_identifier = AttentionQuery {
            patient_search: Some("22.222".into()),
            ..Default::default()
        };
        assert_eq!(by_identifier.apply(sample()).unwrap().total, 1);
    }

    #[test]
    fn approval_filters_distinguish_pending() {
        let pending = AttentionQuery {
            medic_approved: NullableFilter::Pending,
            doctor_search: Some("soto".into()),
            ..Default::default()
        };
        assert_eq!(pending.apply(sample()).unwrap().total, 2);

        let approved = AttentionQuery {
            medic_approved: "true".parse().unwrap(),
            ..Default::default()
        };
        let page = approved.apply(sample()).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.results[0].doctor_name.as_str(), "Dra. Muñoz");
    }

    #[test]
    fn page_size_is_capped_and_zero_rejected() {
        let big = AttentionQuery {
            page_size: Some(500),
            ..Default::default()
        };
        assert_eq!(big.page_size().unwrap(), MAX_PAGE_SIZE);

        let zero = AttentionQuery {
            page: Some(0),
            ..Default::default()
        };
        assert!(zero.apply(sample()).is_err());
    }

    #[test]
    fn nullable_filter_parses_wire_values() {
        assert_eq!("null".parse::<NullableFilter>().unwrap(), NullableFilter::Pending);
        assert_eq!("False".parse::<NullableFilter>().unwrap(), NullableFilter::Is(false));
        assert_eq!("".parse::<NullableFilter>().unwrap(), NullableFilter::Any);
        assert!("maybe".parse::<NullableFilter>().is_err());
    }
}
