//! Aggregate counts over a set of episodes, used by the performance dashboards.

use crate::model::ClinicalAttention;
use crate::outcome::{derive_urgency_law_outcome, UrgencyLawOutcome};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AttentionSummary {
    pub total: usize,
    pub open: usize,
    pub closed: usize,
    pub resident_pending: usize,
    pub resident_approved: usize,
    pub resident_rejected: usize,
    pub supervisor_no_observation: usize,
    pub supervisor_ratified: usize,
    pub supervisor_objected: usize,
    pub urgency_law_applies: usize,
    pub urgency_law_does_not_apply: usize,
    pub urgency_law_unresolved: usize,
    pub pertinent: usize,
    pub not_pertinent: usize,
    pub pertinence_pending: usize,
    /// Closed episodes keyed by closing reason label.
    pub by_closing_reason: BTreeMap<String, usize>,
}

impl AttentionSummary {
    pub fn tally<'a>(attentions: impl IntoIterator<Item = &'a ClinicalAttention>) -> Self {
        let mut summary = Self::default();
        for a in attentions {
            summary.record(a);
        }
        summary
    }

    pub fn record(&mut self, a: &ClinicalAttention) {
        self.total += 1;

        match &a.closure {
            Some(closure) => {
                self.closed += 1;
                *self
                    .by_closing_reason
                    .entry(closure.reason.as_str().to_string())
                    .or_default() += 1;
            }
            None => self.open += 1,
        }

        match a.medic_approved() {
            None => self.resident_pending += 1,
            Some(true) => self.resident_approved += 1,
            Some(false) => self.resident_rejected += 1,
        }

        match a.supervisor_approved() {
            None => self.supervisor_no_observation += 1,
            Some(true) => self.supervisor_ratified += 1,
            Some(false) => self.supervisor_objected += 1,
        }

        match derive_urgency_law_outcome(a) {
            UrgencyLawOutcome::Applies => self.urgency_law_applies += 1,
            UrgencyLawOutcome::DoesNotApply => self.urgency_law_does_not_apply += 1,
            UrgencyLawOutcome::Unresolved => self.urgency_law_unresolved += 1,
        }

        match a.pertinencia() {
            None => self.pertinence_pending += 1,
            Some(true) => self.pertinent += 1,
            Some(false) => self.not_pertinent += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Actor, ActorId, Role};
    use crate::model::{ClosingReason, NewAttention};
    use crate::transition::{apply, Command};
    use chrono::Utc;
    use uuid::Uuid;

    fn episode(ai_result: Option<bool>) -> ClinicalAttention {
        ClinicalAttention::open(
            Uuid::new_v4(),
            NewAttention {
                patient_name: "Luis Pérez".into(),
                patient_identifier: "9.876.543-2".into(),
                doctor_name: "Dra. Muñoz".into(),
                diagnostic: None,
                ai_result,
            },
            ActorId::new("res-1").unwrap(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn tally_counts_each_axis() {
        let admin = Actor::new(ActorId::new("adm").unwrap(), Role::Admin);
        let approved = apply(
            &episode(Some(true)),
            &admin,
            Command::ResidentApproval {
                approved: true,
                reason: None,
            },
            Utc::now(),
        )
        .unwrap();
        let closed = apply(
            &episode(None),
            &admin,
            Command::Close(Some(ClosingReason::Hospitalizacion)),
            Utc::now(),
        )
        .unwrap();

        let s = AttentionSummary::tally([&approved, &closed]);

        assert_eq!(s.total, 2);
        assert_eq!(s.open, 1);
        assert_eq!(s.closed, 1);
        assert_eq!(s.resident_approved, 1);
        assert_eq!(s.resident_pending, 1);
        assert_eq!(s.urgency_law_applies, 1);
        assert_eq!(s.urgency_law_unresolved, 1);
        assert_eq!(s.pertinence_pending, 2);
        assert_eq!(s.by_closing_reason.get("Hospitalización"), Some(&1));
    }

    #[test]
    fn empty_tally_is_default() {
        assert_eq!(AttentionSummary::tally([]), AttentionSummary::default());
    }
}
