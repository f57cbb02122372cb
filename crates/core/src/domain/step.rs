use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    RateQuote,
    BillOfLading,
    PickupRequest,
    Summary,
}

impl StepId {
    pub const ALL: [StepId; 4] =
        [StepId::RateQuote, StepId::BillOfLading, StepId::PickupRequest, StepId::Summary];

    /// 1-indexed position of the step in the workflow.
    pub fn number(self) -> u8 {
        match self {
            Self::RateQuote => 1,
            Self::BillOfLading => 2,
            Self::PickupRequest => 3,
            Self::Summary => 4,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(Self::RateQuote),
            2 => Some(Self::BillOfLading),
            3 => Some(Self::PickupRequest),
            4 => Some(Self::Summary),
            _ => None,
        }
    }

    pub fn next(self) -> Option<Self> {
        Self::from_number(self.number() + 1)
    }

    pub fn previous(self) -> Option<Self> {
        self.number().checked_sub(1).and_then(Self::from_number)
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RateQuote => "rate_quote",
            Self::BillOfLading => "bill_of_lading",
            Self::PickupRequest => "pickup_request",
            Self::Summary => "summary",
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDescriptor {
    pub id: StepId,
    pub title: String,
}

impl StepDescriptor {
    pub fn standard() -> Vec<StepDescriptor> {
        StepId::ALL
            .into_iter()
            .map(|id| StepDescriptor { id, title: default_title(id).to_owned() })
            .collect()
    }
}

fn default_title(id: StepId) -> &'static str {
    match id {
        StepId::RateQuote => "Rate Quote",
        StepId::BillOfLading => "Bill of Lading",
        StepId::PickupRequest => "Pickup Request",
        StepId::Summary => "Summary",
    }
}

#[cfg(test)]
mod tests {
    use super::{StepDescriptor, StepId};

    #[test]
    fn numbering_is_one_indexed_and_contiguous() {
        let numbers: Vec<u8> = StepId::ALL.iter().map(|step| step.number()).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        assert_eq!(StepId::from_number(0), None);
        assert_eq!(StepId::from_number(5), None);
    }

    #[test]
    fn neighbours_stop_at_the_ends() {
        assert_eq!(StepId::RateQuote.previous(), None);
        assert_eq!(StepId::RateQuote.next(), Some(StepId::BillOfLading));
        assert_eq!(StepId::Summary.next(), None);
        assert!(StepId::Summary.is_terminal());
        assert!(!StepId::PickupRequest.is_terminal());
    }

    #[test]
    fn standard_descriptors_follow_step_order() {
        let descriptors = StepDescriptor::standard();
        assert_eq!(descriptors.len(), 4);
        assert_eq!(descriptors[2].id, StepId::PickupRequest);
        assert_eq!(descriptors[2].title, "Pickup Request");
    }
}
